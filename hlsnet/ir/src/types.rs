use std::fmt;

/// Static type of an output port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HlsType {
    /// Carries no data, only orders the connected nodes.
    Void,
    /// Bit vector of the given width.
    Bits(u32),
}

impl HlsType {
    pub const BIT: HlsType = HlsType::Bits(1);

    pub fn is_void(&self) -> bool {
        matches!(self, HlsType::Void)
    }

    /// Width of the type, 0 for [HlsType::Void].
    pub fn width(&self) -> u32 {
        match self {
            HlsType::Void => 0,
            HlsType::Bits(w) => *w,
        }
    }
}

impl fmt::Display for HlsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HlsType::Void => write!(f, "void"),
            HlsType::Bits(w) => write!(f, "b{w}"),
        }
    }
}
