//! Shared utilities for the hlsnet compiler.
mod errors;
mod namegenerator;
mod out_file;

pub mod math;
pub mod time;
pub mod trace;

pub use errors::{Error, ErrorKind, HlsResult, NodeDesc};
pub use namegenerator::NameGenerator;
pub use out_file::OutputFile;
pub use time::SchedTime;
pub use trace::Tracer;
