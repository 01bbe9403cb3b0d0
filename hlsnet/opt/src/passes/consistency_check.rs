use crate::traversal::{ConstructPass, Named, ParseVal, Pass, PassOpt};
use hlsnet_ir::{CheckOptions, NetlistCtx, check_netlist};
use hlsnet_utils::HlsResult;

/// Checks the structural invariants of the netlist: driver and user lists
/// agree, every scope is acyclic, boundary proxies match their ports and,
/// once scheduled, no value is consumed before it is produced.
pub struct ConsistencyCheck {
    causality: bool,
}

impl Named for ConsistencyCheck {
    fn name() -> &'static str {
        "consistency-check"
    }

    fn description() -> &'static str {
        "check the structural invariants of the netlist"
    }

    fn opts() -> Vec<PassOpt> {
        vec![PassOpt::new(
            "causality",
            "check the schedule of every edge",
            ParseVal::Bool(true),
            PassOpt::parse_bool,
        )]
    }
}

impl ConstructPass for ConsistencyCheck {
    fn from(ctx: &NetlistCtx) -> HlsResult<Self> {
        let opts = Self::get_opts(ctx);
        Ok(ConsistencyCheck {
            causality: opts["causality"].bool(),
        })
    }
}

impl Pass for ConsistencyCheck {
    fn run(&mut self, ctx: &mut NetlistCtx) -> HlsResult<()> {
        check_netlist(
            ctx,
            CheckOptions {
                causality: self.causality,
                scheduled: false,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlsnet_ir::{Builder, HlsType, IoOptions, NodeSchedule};
    use hlsnet_utils::ErrorKind;

    #[test]
    fn reports_value_used_before_produced() {
        let mut ctx = NetlistCtx::new("t", 1000);
        let mut b = Builder::new(&mut ctx);
        let c = b.add_const(1, HlsType::BIT);
        let w = b.add_write("o", Some(c), IoOptions::default());
        ctx.node_mut(c.node).sched = Some(NodeSchedule::flat(50, 0, 1));
        ctx.node_mut(w.node).sched = Some(NodeSchedule::flat(10, 1, 3));

        let err = ConsistencyCheck::do_pass_default(&mut ctx).err();
        assert!(matches!(
            err.as_ref().map(|e| e.kind()),
            Some(ErrorKind::Consistency { .. })
        ));

        ctx.extra_opts = vec!["consistency-check:causality=false".into()];
        assert!(ConsistencyCheck::do_pass_default(&mut ctx).is_ok());
    }
}
