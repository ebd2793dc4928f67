//! Core election types: nullifiers, election bindings, vote counts.

pub mod encode;
pub mod types;

// Re-export all public items from modules for convenience
pub use encode::*;
pub use types::*;
