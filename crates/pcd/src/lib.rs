//! Proving-subsystem contract for vote aggregation.
//!
//! The aggregation engine never inspects constraint-system internals; it
//! consumes this crate's interface: opaque proof bytes, canonical public-io
//! encodings, and a backend that can compose and verify transition proofs.
//! `TranscriptBackend` is the bundled deterministic backend; a recursive
//! SNARK prover slots in behind the same trait.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use primitives::{encode_u8, ElectionBinding, Nullifier, OptionIndex, ENC_V1};

pub mod mock;
pub mod transcript;

pub use transcript::TranscriptBackend;

/// Opaque proof bytes, hex on the wire.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug, Default)]
#[serde(transparent)]
pub struct ProofBytes(#[serde(with = "hex::serde")] pub Vec<u8>);

/// Statement a vote proof is checked against: the election binding plus the
/// claimed option.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct VotePublicInput {
    pub binding: ElectionBinding,
    pub vote: OptionIndex,
}

/// What a verified vote proof exposes to the aggregator.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct VotePublicOutput {
    pub vote: OptionIndex,
    pub nullifier: Nullifier,
}

/// Externally produced per-voter proof. Immutable once produced; consumed
/// exactly once by the aggregation engine.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct VoteProof {
    pub public_input: VotePublicInput,
    pub public_output: VotePublicOutput,
    pub proof: ProofBytes,
}

impl VoteProof {
    /// Canonical encoding of the public io, the byte statement the proof
    /// attests to.
    pub fn encode_public(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 32 + 32 + 1 + 1 + 32);
        encode_u8(ENC_V1, &mut out);
        out.extend_from_slice(self.public_input.binding.election_id.as_bytes());
        out.extend_from_slice(self.public_input.binding.voters_root.as_bytes());
        encode_u8(self.public_input.vote.0, &mut out);
        encode_u8(self.public_output.vote.0, &mut out);
        out.extend_from_slice(self.public_output.nullifier.as_bytes());
        out
    }
}

/// Failures surfaced by a proving backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The circuit program has not been compiled yet; retry after
    /// `ensure_ready` completes.
    #[error("proving subsystem not initialized")]
    NotReady,
    #[error("proof composition failed: {0}")]
    Compose(String),
}

/// Contract between the aggregation engine and whatever proves transitions.
///
/// Readiness is an explicit lifecycle concern: `ensure_ready` is idempotent
/// and must be driven by the owner of the backend, never hidden behind
/// module-level globals.
pub trait ProvingBackend: Send + Sync {
    /// Compile the underlying programs. Safe to call repeatedly; later calls
    /// return immediately.
    fn ensure_ready(&self) -> Result<(), BackendError>;

    fn is_ready(&self) -> bool;

    /// Produce a transition proof for the canonical public encoding of a new
    /// tally state.
    fn compose_step(&self, public: &[u8]) -> Result<ProofBytes, BackendError>;

    /// Verify a tally transition proof against its public encoding.
    fn verify_transition(&self, public: &[u8], proof: &ProofBytes) -> Result<bool, BackendError>;

    /// Verify an individual vote proof against its public encoding.
    fn verify_vote(&self, public: &[u8], proof: &ProofBytes) -> Result<bool, BackendError>;
}
