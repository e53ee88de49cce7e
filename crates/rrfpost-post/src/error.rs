//! Error types for the emission engine.
//!
//! Generation is fail-fast: the first error aborts the run and no text is
//! returned. Errors carry the operation label and command index needed to
//! locate the offending source command.

use rrfpost_core::{FormatError, ToolError};
use thiserror::Error;

/// Errors that can abort a generation run.
#[derive(Error, Debug)]
pub enum PostError {
    /// A cutting operation started without a running spindle while the
    /// zero-RPM exception was not enabled.
    #[error("spindle not running at start of operation '{operation}'")]
    SpindleNotRunning {
        /// The operation that began without a spindle.
        operation: String,
    },

    /// A value could not be rendered.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Tool table validation failed.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// A failure located at a specific command of an operation.
    #[error("operation '{operation}', command {index}: {source}")]
    Command {
        /// The operation the command belongs to.
        operation: String,
        /// Zero-based index of the command within the operation.
        index: usize,
        /// The underlying failure.
        #[source]
        source: Box<PostError>,
    },
}

impl PostError {
    /// Attach operation and command-index context.
    pub fn at(self, operation: &str, index: usize) -> Self {
        PostError::Command {
            operation: operation.to_string(),
            index,
            source: Box::new(self),
        }
    }
}

/// Result type alias for engine operations.
pub type PostResult<T> = Result<T, PostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostError::SpindleNotRunning {
            operation: "Profile".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "spindle not running at start of operation 'Profile'"
        );
    }

    #[test]
    fn test_context_wrapping() {
        let err = PostError::from(FormatError::UnrenderableValue {
            prefix: "S".to_string(),
            value: "x".to_string(),
        })
        .at("Adaptive", 3);
        assert_eq!(
            err.to_string(),
            "operation 'Adaptive', command 3: no format for field 'S' accepts value x"
        );
    }
}
