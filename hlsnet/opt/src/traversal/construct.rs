use hlsnet_ir::NetlistCtx;
use hlsnet_utils::HlsResult;
use itertools::Itertools;
use linked_hash_map::LinkedHashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
/// The value returned from parsing an option.
pub enum ParseVal {
    /// A boolean option.
    Bool(bool),
}

impl ParseVal {
    pub fn bool(&self) -> bool {
        let ParseVal::Bool(b) = self else {
            panic!("Expected bool, got {self}");
        };
        *b
    }
}

impl std::fmt::Display for ParseVal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseVal::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Option that can be passed to a pass.
pub struct PassOpt {
    name: &'static str,
    description: &'static str,
    default: ParseVal,
    parse: fn(&str) -> Option<ParseVal>,
}

impl PassOpt {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        default: ParseVal,
        parse: fn(&str) -> Option<ParseVal>,
    ) -> Self {
        Self {
            name,
            description,
            default,
            parse,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn description(&self) -> &'static str {
        self.description
    }

    pub const fn default(&self) -> &ParseVal {
        &self.default
    }

    fn parse(&self, s: &str) -> Option<ParseVal> {
        (self.parse)(s)
    }

    pub fn parse_bool(s: &str) -> Option<ParseVal> {
        match s {
            "true" => Some(ParseVal::Bool(true)),
            "false" => Some(ParseVal::Bool(false)),
            _ => None,
        }
    }
}

/// Trait that describes named things.
///
/// This has to be a separate trait from [`Pass`](super::Pass) because these
/// methods don't receive `self`.
pub trait Named {
    /// The name of a pass. Is used for identifying passes.
    fn name() -> &'static str;
    /// A short description of the pass.
    fn description() -> &'static str;
    /// Set of options that can be passed to the pass.
    fn opts() -> Vec<PassOpt> {
        vec![]
    }
}

/// Trait defining method that can be used to construct a pass from a
/// [NetlistCtx].
///
/// For passes that don't need to use the context, this trait is
/// automatically derived from [Default].
pub trait ConstructPass {
    /// Collect the values of the options of this pass. The format of an
    /// extra option is either `pass:opt` or `pass:opt=val`.
    fn get_opts(ctx: &NetlistCtx) -> LinkedHashMap<&'static str, ParseVal>
    where
        Self: Named,
    {
        let opts = Self::opts();
        let n = Self::name();
        let mut values: LinkedHashMap<&'static str, ParseVal> = ctx
            .extra_opts
            .iter()
            .filter_map(|opt| {
                let (pass, rest) = opt.split_once(':')?;
                if pass != n {
                    return None;
                }
                let mut splits = rest.split('=');
                let name = splits.next()?;
                let Some(opt) = opts.iter().find(|o| o.name == name) else {
                    log::warn!(
                        "Ignoring unknown option for pass `{n}`: {name}"
                    );
                    return None;
                };
                let val = if let Some(v) = splits.next() {
                    let Some(v) = opt.parse(v) else {
                        log::warn!(
                            "Ignoring invalid value for option `{n}:{}`: {v}",
                            opt.name(),
                        );
                        return None;
                    };
                    v
                } else {
                    ParseVal::Bool(true)
                };
                Some((opt.name(), val))
            })
            .collect();

        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "Extra options for {}: {}",
                Self::name(),
                values.iter().map(|(o, v)| format!("{o}->{v}")).join(", ")
            );
        }

        // For all options that were not provided with values, fill in the
        // defaults.
        for opt in opts {
            if !values.contains_key(opt.name()) {
                values.insert(opt.name(), opt.default.clone());
            }
        }

        values
    }

    /// Construct the pass using information from the context.
    fn from(ctx: &NetlistCtx) -> HlsResult<Self>
    where
        Self: Sized;
}

/// Derive ConstructPass when [Default] is provided for a pass.
impl<T: Default + Sized + super::Pass> ConstructPass for T {
    fn from(_ctx: &NetlistCtx) -> HlsResult<Self> {
        Ok(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Opts;

    impl Named for Opts {
        fn name() -> &'static str {
            "opts"
        }

        fn description() -> &'static str {
            "test pass"
        }

        fn opts() -> Vec<PassOpt> {
            vec![
                PassOpt::new(
                    "flag",
                    "a flag",
                    ParseVal::Bool(false),
                    PassOpt::parse_bool,
                ),
                PassOpt::new(
                    "keep",
                    "another flag",
                    ParseVal::Bool(true),
                    PassOpt::parse_bool,
                ),
            ]
        }
    }

    impl ConstructPass for Opts {
        fn from(_ctx: &NetlistCtx) -> HlsResult<Self> {
            Ok(Opts)
        }
    }

    #[test]
    fn extra_options_override_defaults() {
        let mut ctx = NetlistCtx::new("t", 1000);
        ctx.extra_opts = vec![
            "opts:flag".to_string(),
            "other:keep=false".to_string(),
            "opts:keep=x".to_string(),
        ];
        let values = Opts::get_opts(&ctx);
        assert!(values["flag"].bool());
        assert!(values["keep"].bool());
        ctx.extra_opts = vec!["opts:keep=false".to_string()];
        assert!(!Opts::get_opts(&ctx)["keep"].bool());
    }
}
