//! Transcript-only proving backend. Not a SNARK; binds proofs to public io
//! with domain-separated BLAKE2b so the aggregation protocol can be driven
//! and tested end to end against the `ProvingBackend` contract.

use std::sync::OnceLock;

use blake2b_simd::Params as Blake2bParams;

use crate::{BackendError, ProofBytes, ProvingBackend};

const DOM_VOTE: &[u8] = b"vtally:vote"; // 11
const DOM_STEP: &[u8] = b"vtally:step"; // 11

fn transcript_digest(personal: &[u8], public: &[u8]) -> Vec<u8> {
    Blake2bParams::new()
        .hash_length(32)
        .personal(personal)
        .hash(public)
        .as_bytes()
        .to_vec()
}

/// Deterministic backend with an explicit readiness latch. "Compilation" is
/// instantaneous here, but callers must still drive the lifecycle the way a
/// real circuit compilation requires.
#[derive(Default)]
pub struct TranscriptBackend {
    ready: OnceLock<()>,
}

impl TranscriptBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce a vote proof for a public encoding. Stands in for the
    /// external vote circuit when building fixtures and demos.
    pub fn prove_vote(&self, public: &[u8]) -> Result<ProofBytes, BackendError> {
        if !self.is_ready() {
            return Err(BackendError::NotReady);
        }
        Ok(ProofBytes(transcript_digest(DOM_VOTE, public)))
    }
}

impl ProvingBackend for TranscriptBackend {
    fn ensure_ready(&self) -> Result<(), BackendError> {
        self.ready.get_or_init(|| ());
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.get().is_some()
    }

    fn compose_step(&self, public: &[u8]) -> Result<ProofBytes, BackendError> {
        if !self.is_ready() {
            return Err(BackendError::NotReady);
        }
        Ok(ProofBytes(transcript_digest(DOM_STEP, public)))
    }

    fn verify_transition(&self, public: &[u8], proof: &ProofBytes) -> Result<bool, BackendError> {
        if !self.is_ready() {
            return Err(BackendError::NotReady);
        }
        Ok(proof.0 == transcript_digest(DOM_STEP, public))
    }

    fn verify_vote(&self, public: &[u8], proof: &ProofBytes) -> Result<bool, BackendError> {
        if !self.is_ready() {
            return Err(BackendError::NotReady);
        }
        Ok(proof.0 == transcript_digest(DOM_VOTE, public))
    }
}
