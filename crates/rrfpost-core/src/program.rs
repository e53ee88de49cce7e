//! Source operations as delivered by the Normalizer.
//!
//! Each operation carries a closed category tag and its canonical commands
//! in source order. The engine switches on the tag, never on source object
//! identity.

use crate::command::Command;
use crate::tools::ToolDescriptor;

/// What a source operation represents.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    /// A free-text note shown to the operator as a confirmable dialog.
    Dialog {
        /// The note text; sanitized before it reaches a quoted field.
        text: String,
    },
    /// A fixture / frame marker. Machine modal state is unknown afterwards.
    Fixture,
    /// A tool controller marker carrying the tool geometry.
    ToolController(ToolDescriptor),
    /// A cutting operation.
    Milling,
}

/// One source operation with its canonical commands.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Label used in comments and error context.
    pub label: String,
    /// The operation's category.
    pub kind: OperationKind,
    /// Canonical commands in source order.
    pub commands: Vec<Command>,
}

impl Operation {
    /// An operation with no commands yet.
    pub fn new(label: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            label: label.into(),
            kind,
            commands: Vec::new(),
        }
    }

    /// A cutting operation with no commands yet.
    pub fn milling(label: impl Into<String>) -> Self {
        Self::new(label, OperationKind::Milling)
    }

    /// Builder form: append one command.
    pub fn with_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }
}
