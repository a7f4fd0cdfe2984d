use crate::shape::Shape4;

/// All errors that can occur within Wren.
///
/// Every failure a net can report funnels through this enum: malformed
/// graphs, unknown operators, shape-contract violations, unknown node names,
/// role mismatches and persistence I/O. The net records the `Display` text
/// of the error as its last error before handing it back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The node collection failed topology validation.
    #[error("Error createNet: {0}")]
    Graph(String),

    /// A node names an operator type that no registered constructor handles.
    #[error("Error createNet: not found operator '{operator}' for node '{node}'")]
    UnknownOperator { node: String, operator: String },

    /// A caller-supplied shape does not match a node's actual tensor shape.
    #[error("{context} error: node '{node}' shape mismatch, got {got}. Must be: {expected}")]
    ShapeMismatch {
        context: &'static str,
        node: String,
        expected: Shape4,
        got: Shape4,
    },

    /// A flat buffer does not hold the number of elements its shape requires.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape4,
        expected: usize,
        got: usize,
    },

    /// An accessor named a node that is not part of the graph.
    #[error("node '{0}' not found")]
    NodeNotFound(String),

    /// The node exists but its operator type does not allow the access.
    #[error("node '{node}' layer must be '{required}'")]
    RoleMismatch { node: String, required: &'static str },

    /// Training needs a designated end node and the graph has none.
    #[error("training error: 'EndNet' not found")]
    EndNetNotFound,

    /// A user layer dispatched to a callback name nobody registered.
    #[error("userCBack error: not found cbname '{name}' (node '{node}')")]
    CallbackNotFound { name: String, node: String },

    /// Reading or writing a weight file failed at the OS level.
    #[error("weight file error, check file path '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The weight stream is malformed.
    #[error("weight format error: {0}")]
    Format(String),

    /// The net description could not be decoded or encoded.
    #[error("net description error: {0}")]
    Description(String),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    /// Create a graph-validation error.
    pub fn graph(s: impl Into<String>) -> Self {
        Error::Graph(s.into())
    }

    /// Create a persistence format error.
    pub fn format(s: impl Into<String>) -> Self {
        Error::Format(s.into())
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience Result type used throughout Wren.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
