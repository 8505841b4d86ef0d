//! Domain models for the homologation engine.

mod medication;
mod recommendation;

pub use medication::*;
pub use recommendation::*;
