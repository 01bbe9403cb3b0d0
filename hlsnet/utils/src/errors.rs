//! Errors generated by the scheduler, the analyses and the passes.
use itertools::Itertools;
use std::fmt;
use thiserror::Error as ThisError;

/// Convenience wrapper to represent success or a meaningful compiler error.
pub type HlsResult<T> = std::result::Result<T, Error>;

/// Identity of a netlist node as reported in an error.
///
/// Errors are produced below the IR crate so they cannot refer to the node
/// arena directly; they carry the numeric id and a short textual repr which
/// is enough to bisect a failing transformation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeDesc {
    pub id: u32,
    pub repr: String,
}

impl NodeDesc {
    pub fn new<S: ToString>(id: u32, repr: S) -> Self {
        Self {
            id,
            repr: repr.to_string(),
        }
    }
}

impl fmt::Display for NodeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.repr)
    }
}

/// A compiler error. The kind is boxed so that results stay small.
#[derive(Clone, PartialEq, Eq)]
pub struct Error {
    kind: Box<ErrorKind>,
    post_msg: Option<String>,
}

/// Standard error type for the netlist scheduling core.
#[derive(ThisError, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The node cannot be scheduled at the requested clock frequency.
    #[error(
        "Timing constraint violated by {node}: {what} delay {delay} does \
         not fit into clock period {clk_period}"
    )]
    TimingConstraint {
        node: NodeDesc,
        what: String,
        delay: i64,
        clk_period: i64,
    },
    /// An upstream transformation broke a netlist invariant.
    #[error(
        "Netlist consistency violated: {msg} [{}]",
        .nodes.iter().join(", ")
    )]
    Consistency { msg: String, nodes: Vec<NodeDesc> },
    /// An upstream analysis produced malformed data.
    #[error("Structural error: {msg} [{}]", .nodes.iter().join(", "))]
    Structural { msg: String, nodes: Vec<NodeDesc> },
    /// Dependency cycle found while walking the graph.
    #[error("Dependency cycle: {}", .path.iter().join(" -> "))]
    Cycle { path: Vec<NodeDesc> },
    /// Failed to read or write a file.
    #[error("{0}")]
    Io(String),
    /// Malformed input description.
    #[error("Parse error: {0}")]
    Parse(String),
    /// Miscellaneous error message.
    #[error("{0}")]
    Misc(String),
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn is_timing_constraint(&self) -> bool {
        matches!(*self.kind, ErrorKind::TimingConstraint { .. })
    }

    /// Attach an additional message printed after the error.
    pub fn with_post_msg(mut self, msg: Option<String>) -> Self {
        self.post_msg = msg;
        self
    }

    pub fn timing<S: ToString>(
        node: NodeDesc,
        what: S,
        delay: i64,
        clk_period: i64,
    ) -> Self {
        ErrorKind::TimingConstraint {
            node,
            what: what.to_string(),
            delay,
            clk_period,
        }
        .into()
    }

    pub fn consistency<S: ToString>(msg: S, nodes: Vec<NodeDesc>) -> Self {
        ErrorKind::Consistency {
            msg: msg.to_string(),
            nodes,
        }
        .into()
    }

    pub fn structural<S: ToString>(msg: S, nodes: Vec<NodeDesc>) -> Self {
        ErrorKind::Structural {
            msg: msg.to_string(),
            nodes,
        }
        .into()
    }

    pub fn cycle(path: Vec<NodeDesc>) -> Self {
        ErrorKind::Cycle { path }.into()
    }

    pub fn parse<S: ToString>(msg: S) -> Self {
        ErrorKind::Parse(msg.to_string()).into()
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        ErrorKind::Misc(msg.to_string()).into()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            post_msg: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(post) = &self.post_msg {
            write!(f, "\n{post}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        ErrorKind::Io(e.to_string()).into()
    }
}

impl From<std::fmt::Error> for Error {
    fn from(e: std::fmt::Error) -> Self {
        ErrorKind::Io(e.to_string()).into()
    }
}
