//! # rrfpost Settings
//!
//! Read-only configuration surface consumed by the emission engine.
//! Settings control which supplemental output the engine produces (tool
//! table, job setup, probing, spindle speed modulation); they never change
//! the semantics of the command stream itself.
//!
//! Files in TOML or JSON are supported, keyed on extension. Every field
//! has a default matching normal milling on a probed machine.

pub mod config;
pub mod error;

pub use config::{PostSettings, ProbeMode, VsscSettings};
pub use error::{SettingsError, SettingsResult};
