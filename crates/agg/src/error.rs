//! Error taxonomy for the aggregation engine.
//!
//! Every variant is a per-request failure; none is fatal to the process.
//! Validation errors are raised before any state transition, so a caller's
//! retained tally stays valid and retries are safe.

use thiserror::Error;

use pcd::BackendError;
use primitives::FieldParseError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("proof does not deserialize: {0}")]
    ProofParse(String),
    #[error("election binding mismatch between tally and vote")]
    ElectionMismatch,
    #[error("nullifier already counted")]
    NullifierAlreadyCounted,
    #[error("nullifier witness inconsistent with seen-set commitment")]
    NullifierWitnessInvalid,
    #[error("proof verification failed")]
    ProofVerificationFailed,
    #[error("proof composition failed: {0}")]
    ProofGeneration(String),
    #[error("proving subsystem not initialized")]
    NotReady,
}

impl AggregationError {
    /// Stable snake_case code carried in wire responses.
    pub fn wire_code(&self) -> &'static str {
        match self {
            AggregationError::BadRequest(_) => "bad_request",
            AggregationError::ProofParse(_) => "proof_parse_error",
            AggregationError::ElectionMismatch => "proof_election_mismatch",
            AggregationError::NullifierAlreadyCounted => "nullifier_already_counted",
            AggregationError::NullifierWitnessInvalid => "nullifier_witness_invalid",
            AggregationError::ProofVerificationFailed => "proof_verification_failed",
            AggregationError::ProofGeneration(_) => "proof_generation_error",
            AggregationError::NotReady => "not_ready",
        }
    }
}

impl From<BackendError> for AggregationError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::NotReady => AggregationError::NotReady,
            BackendError::Compose(msg) => AggregationError::ProofGeneration(msg),
        }
    }
}

impl From<FieldParseError> for AggregationError {
    fn from(e: FieldParseError) -> Self {
        AggregationError::BadRequest(e.to_string())
    }
}
