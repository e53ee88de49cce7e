//! Tool registry and geometry descriptors.
//!
//! The firmware handles tool changes itself, so the generated program only
//! passes a tool table ahead of the run. The registry validates that every
//! tool index resolves to exactly one name; the full table is only known
//! once the whole command stream has been traversed.

use crate::error::ToolError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cutter shape, used to derive the corner radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolShape {
    /// Flat endmill or any cutter without a rounded tip.
    Flat,
    /// Rounded all the way to the centre of the bit.
    Ballnose,
    /// Rounded between a flat tip and the flank.
    Bullnose {
        /// Radius of the flat part of the tip.
        flat_radius: f64,
    },
}

impl ToolShape {
    /// Corner radius for a cutter of the given radius.
    pub fn corner_radius(&self, radius: f64) -> f64 {
        match self {
            ToolShape::Flat => 0.0,
            ToolShape::Ballnose => radius,
            ToolShape::Bullnose { flat_radius } => radius - flat_radius,
        }
    }
}

/// Geometry passed to the firmware for one tool slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool slot index.
    pub index: u16,
    /// Human-readable tool name, never empty.
    pub name: String,
    /// Number of cutting flutes.
    pub flutes: u32,
    /// Cutter radius.
    pub radius: f64,
    /// Overall tool length.
    pub tool_length: f64,
    /// Length of the cutting edge.
    pub flute_length: f64,
    /// Corner radius derived from the cutter shape.
    pub corner_radius: f64,
}

impl ToolDescriptor {
    /// Build a descriptor, deriving the corner radius from `shape`.
    pub fn new(
        index: u16,
        name: impl Into<String>,
        shape: ToolShape,
        flutes: u32,
        radius: f64,
        tool_length: f64,
        flute_length: f64,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            flutes,
            radius,
            tool_length,
            flute_length,
            corner_radius: shape.corner_radius(radius),
        }
    }
}

/// Registration-ordered tool table.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool slot.
    ///
    /// Re-registration under the same name is a no-op success; a different
    /// name for a known index is an error, as is an empty name.
    pub fn register(&mut self, tool: ToolDescriptor) -> Result<(), ToolError> {
        if tool.name.is_empty() {
            return Err(ToolError::EmptyName { index: tool.index });
        }
        if let Some(existing) = self.tools.iter().find(|t| t.index == tool.index) {
            if existing.name != tool.name {
                return Err(ToolError::ConflictingName {
                    index: tool.index,
                    existing: existing.name.clone(),
                    name: tool.name,
                });
            }
            return Ok(());
        }
        debug!(index = tool.index, name = %tool.name, "registered tool");
        self.tools.push(tool);
        Ok(())
    }

    /// Whether any tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// All descriptors in registration order, for header emission.
    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }
}
