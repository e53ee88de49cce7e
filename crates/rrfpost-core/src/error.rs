//! Error types for the core crate.
//!
//! All error types use `thiserror`. Generation is fail-fast: any of these
//! aborts the run, the engine never returns partial output.

use thiserror::Error;

/// Errors raised while rendering commands and fields.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    /// No format registered for the field's key accepts the value's type.
    #[error("no format for field '{prefix}' accepts value {value}")]
    UnrenderableValue {
        /// The field key the value was supplied under.
        prefix: String,
        /// The offending value, in display form.
        value: String,
    },

    /// The command code itself could not be rendered.
    #[error("command code {code} cannot be rendered as '{prefix}'")]
    UnrenderableCode {
        /// The command word prefix (e.g. `G`).
        prefix: String,
        /// The rejected code.
        code: f64,
    },
}

/// Errors raised by the tool registry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    /// A tool index was redefined under a different name.
    #[error("duplicate tool index {index}: registered as '{existing}', redefined as '{name}'")]
    ConflictingName {
        /// The contested tool slot.
        index: u16,
        /// The name already registered for the slot.
        existing: String,
        /// The conflicting new name.
        name: String,
    },

    /// A tool was registered with an empty name.
    #[error("tool name for index {index} must not be empty")]
    EmptyName {
        /// The tool slot missing a name.
        index: u16,
    },
}

/// A command letter the engine does not understand.
///
/// Raised at the Normalizer boundary by [`Word::from_letter`], never by the
/// engine itself: once a command carries a [`Word`] tag its category is
/// closed.
///
/// [`Word`]: crate::command::Word
/// [`Word::from_letter`]: crate::command::Word::from_letter
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unrecognized command word '{0}'")]
pub struct WordError(pub char);

/// Result type alias for formatting operations.
pub type FormatResult<T> = Result<T, FormatError>;
