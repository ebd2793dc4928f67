//! Aggregation state machine: combines individually proved votes into one
//! cumulative, verifiable tally per election.
//!
//! Two interchangeable designs share the same error taxonomy:
//! [`membership`] carries a merkle-map seen set and accepts votes in any
//! order; [`range`] tracks contiguous bounds over presorted votes and needs
//! no per-step witness. Every operation is a pure transition: it returns a
//! fresh state plus proof, or an error and nothing else.

pub mod error;
pub mod membership;
pub mod range;

pub use error::AggregationError;

use pcd::VoteProof;

/// Boundary shape checks shared by both variants, applied before any
/// cryptographic verification.
pub(crate) fn check_vote_shape(vote: &VoteProof) -> Result<(), AggregationError> {
    if !vote.public_input.vote.is_valid() || !vote.public_output.vote.is_valid() {
        return Err(AggregationError::BadRequest(
            "vote option out of range".into(),
        ));
    }
    if vote.public_input.vote != vote.public_output.vote {
        return Err(AggregationError::BadRequest(
            "vote option differs between public input and output".into(),
        ));
    }
    Ok(())
}
