//! Seen-set commitment for vote aggregation.
//!
//! This crate provides the sparse merkle map over counted nullifiers, its
//! root type, and leaf witnesses usable as membership and non-membership
//! evidence by the aggregation state machine.

pub mod hash;
pub mod map;

pub use map::{leaf_bytes, LeafWitness, NullifierMap, Root, MAP_HEIGHT};
