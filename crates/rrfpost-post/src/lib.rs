//! # rrfpost Post
//!
//! The stateful emission engine: a single deterministic pass over a
//! normalized stream of machining commands, producing minimal,
//! firmware-safe G-code text.
//!
//! The engine tracks machine modal state, suppresses redundant output and
//! enforces a fixed set of safety orderings:
//!
//! - park before a work coordinate frame switch,
//! - spindle running before any cutting operation starts,
//! - the first vertical (Z) move of each operation held until horizontal
//!   (XY) motion is known,
//! - complete tool table ahead of any tool reference.
//!
//! One [`Post`] instance owns everything for one generation run; nothing
//! survives across runs.

pub mod codes;
pub mod emitter;
pub mod error;

pub use emitter::{Post, GENERATOR, VERSION};
pub use error::{PostError, PostResult};
