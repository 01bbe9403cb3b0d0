//! Traits implemented by every pass and the parsing of pass options.
mod construct;
mod pass;

pub use construct::{ConstructPass, Named, ParseVal, PassOpt};
pub use pass::Pass;
