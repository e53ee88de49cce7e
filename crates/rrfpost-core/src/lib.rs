//! # rrfpost Core
//!
//! Command model, output formatting and section buffering for the rrfpost
//! G-code emission engine.
//!
//! The engine turns a normalized stream of machining commands into minimal,
//! firmware-safe text. This crate holds the stateless-looking but heavily
//! memoized building blocks:
//!
//! - **Command model**: decimal command codes with typed, insertion-ordered
//!   parameters, plus the source operation envelope the Normalizer delivers.
//! - **Formatters**: per-field token rendering with numeric cleanup and
//!   zero-suppression, and command composition with full-duplicate and
//!   modal-group deduplication.
//! - **Section buffer**: the PRE/RUN/POST line streams with scoped
//!   append/prepend composition.
//! - **Tool registry**: validated tool index to geometry mapping.

pub mod command;
pub mod error;
pub mod format;
pub mod program;
pub mod section;
pub mod tools;

pub use command::{Command, Params, Value, Word};
pub use error::{FormatError, FormatResult, ToolError, WordError};
pub use format::{
    sanitize_quoted, Accepts, CommandFormat, Ctrl, Emitted, FieldFormat, FieldOutcome, Style,
};
pub use program::{Operation, OperationKind};
pub use section::{Placement, Section, SectionBuffer};
pub use tools::{ToolDescriptor, ToolRegistry, ToolShape};
