//! Wire shapes for the aggregation boundary. Loosely typed JSON stops here;
//! everything past this module is strongly typed.

use serde::{Deserialize, Serialize};

use agg::{membership::TallyProof, AggregationError};
use primitives::ElectionBinding;

/// One aggregation request. `proof_json` carries the new vote proof;
/// `previous_proof_json` the prior tally proof; `previous_voters` the full
/// counted list needed to rebuild the membership witness. `binding` seeds an
/// empty tally when no vote accompanies the request.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct SubmitRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_json: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_proof_json: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_voters: Option<Vec<PreviousVoter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<ElectionBinding>,
}

/// Wire form of one previously counted voter: option index plus the
/// nullifier as a base-10 string.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct PreviousVoter {
    pub vote: u32,
    pub nullifier: String,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitResponse {
    pub fn from_tally(tally: &TallyProof) -> Self {
        match serde_json::to_value(tally) {
            Ok(proof) => SubmitResponse {
                success: true,
                proof: Some(proof),
                error: None,
            },
            Err(e) => {
                log::error!("tally proof failed to serialize: {e}");
                Self::from_code("proof_generation_error")
            }
        }
    }

    pub fn from_error(err: &AggregationError) -> Self {
        Self::from_code(err.wire_code())
    }

    pub fn from_code(code: &str) -> Self {
        SubmitResponse {
            success: false,
            proof: None,
            error: Some(code.to_string()),
        }
    }
}
