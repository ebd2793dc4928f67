//! Ordering-variant aggregation: the seen set is a contiguous nullifier
//! range over a presorted vote sequence. No per-step witness is needed, but
//! votes must be driven in ascending nullifier order (or merged from
//! disjoint sorted runs).

use serde::{Deserialize, Serialize};

use pcd::{BackendError, ProofBytes, ProvingBackend, VoteProof};
use primitives::{
    encode_u32, encode_u64, encode_u8, ElectionBinding, Nullifier, VoteCounts, ENC_V1, MAX_OPTIONS,
};
use segtree::VoteTree;

use crate::check_vote_shape;
use crate::error::AggregationError;

const STEP_RANGE: u8 = 2;

/// Inclusive bounds over the nullifiers counted so far.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct RangeBounds {
    pub lower: Nullifier,
    pub upper: Nullifier,
}

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct RangePublicOutput {
    pub total_aggregated: u64,
    pub bounds: Option<RangeBounds>,
    pub counts: VoteCounts,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct TallyProof {
    pub public_input: ElectionBinding,
    pub public_output: RangePublicOutput,
    pub proof: ProofBytes,
}

impl TallyProof {
    pub fn encode_public(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3 + 32 * 4 + 8 + MAX_OPTIONS * 4);
        encode_u8(ENC_V1, &mut out);
        encode_u8(STEP_RANGE, &mut out);
        out.extend_from_slice(self.public_input.election_id.as_bytes());
        out.extend_from_slice(self.public_input.voters_root.as_bytes());
        encode_u64(self.public_output.total_aggregated, &mut out);
        match &self.public_output.bounds {
            None => encode_u8(0, &mut out),
            Some(b) => {
                encode_u8(1, &mut out);
                out.extend_from_slice(b.lower.as_bytes());
                out.extend_from_slice(b.upper.as_bytes());
            }
        }
        for c in self.public_output.counts.0 {
            encode_u32(c, &mut out);
        }
        out
    }

    pub fn verify(&self, backend: &dyn ProvingBackend) -> Result<bool, BackendError> {
        backend.verify_transition(&self.encode_public(), &self.proof)
    }
}

fn compose(
    backend: &dyn ProvingBackend,
    binding: ElectionBinding,
    public_output: RangePublicOutput,
) -> Result<TallyProof, AggregationError> {
    let mut tally = TallyProof {
        public_input: binding,
        public_output,
        proof: Default::default(),
    };
    tally.proof = backend.compose_step(&tally.encode_public())?;
    Ok(tally)
}

fn check_vote(backend: &dyn ProvingBackend, vote: &VoteProof) -> Result<(), AggregationError> {
    check_vote_shape(vote)?;
    if !backend.verify_vote(&vote.encode_public(), &vote.proof)? {
        return Err(AggregationError::ProofVerificationFailed);
    }
    Ok(())
}

pub fn seed_empty(
    backend: &dyn ProvingBackend,
    binding: ElectionBinding,
) -> Result<TallyProof, AggregationError> {
    compose(
        backend,
        binding,
        RangePublicOutput {
            total_aggregated: 0,
            bounds: None,
            counts: VoteCounts::empty(),
        },
    )
}

pub fn seed_one(
    backend: &dyn ProvingBackend,
    binding: ElectionBinding,
    vote: &VoteProof,
) -> Result<TallyProof, AggregationError> {
    check_vote(backend, vote)?;
    if vote.public_input.binding != binding {
        return Err(AggregationError::ElectionMismatch);
    }
    let nullifier = vote.public_output.nullifier;
    let option = vote.public_output.vote;
    compose(
        backend,
        binding,
        RangePublicOutput {
            total_aggregated: 1,
            bounds: Some(RangeBounds {
                lower: nullifier,
                upper: nullifier,
            }),
            counts: VoteCounts::empty().bumped(option),
        },
    )
}

/// Append a vote whose nullifier exceeds every counted one.
pub fn append_one(
    backend: &dyn ProvingBackend,
    prev: &TallyProof,
    vote: &VoteProof,
) -> Result<TallyProof, AggregationError> {
    if !prev.verify(backend)? {
        return Err(AggregationError::ProofVerificationFailed);
    }
    check_vote(backend, vote)?;
    if prev.public_input != vote.public_input.binding {
        return Err(AggregationError::ElectionMismatch);
    }
    let nullifier = vote.public_output.nullifier;
    let bounds = match prev.public_output.bounds {
        None => RangeBounds {
            lower: nullifier,
            upper: nullifier,
        },
        Some(b) => {
            if nullifier >= b.lower && nullifier <= b.upper {
                return Err(AggregationError::NullifierAlreadyCounted);
            }
            if nullifier < b.lower {
                return Err(AggregationError::BadRequest(
                    "nullifier below counted range; prepend instead".into(),
                ));
            }
            RangeBounds {
                lower: b.lower,
                upper: nullifier,
            }
        }
    };
    let option = vote.public_output.vote;
    compose(
        backend,
        prev.public_input,
        RangePublicOutput {
            total_aggregated: prev.public_output.total_aggregated + 1,
            bounds: Some(bounds),
            counts: prev.public_output.counts.bumped(option),
        },
    )
}

/// Mirror of `append_one` for a vote below every counted nullifier.
pub fn prepend_one(
    backend: &dyn ProvingBackend,
    prev: &TallyProof,
    vote: &VoteProof,
) -> Result<TallyProof, AggregationError> {
    if !prev.verify(backend)? {
        return Err(AggregationError::ProofVerificationFailed);
    }
    check_vote(backend, vote)?;
    if prev.public_input != vote.public_input.binding {
        return Err(AggregationError::ElectionMismatch);
    }
    let nullifier = vote.public_output.nullifier;
    let bounds = match prev.public_output.bounds {
        None => RangeBounds {
            lower: nullifier,
            upper: nullifier,
        },
        Some(b) => {
            if nullifier >= b.lower && nullifier <= b.upper {
                return Err(AggregationError::NullifierAlreadyCounted);
            }
            if nullifier > b.upper {
                return Err(AggregationError::BadRequest(
                    "nullifier above counted range; append instead".into(),
                ));
            }
            RangeBounds {
                lower: nullifier,
                upper: b.upper,
            }
        }
    };
    let option = vote.public_output.vote;
    compose(
        backend,
        prev.public_input,
        RangePublicOutput {
            total_aggregated: prev.public_output.total_aggregated + 1,
            bounds: Some(bounds),
            counts: prev.public_output.counts.bumped(option),
        },
    )
}

/// Combine two tallies over disjoint nullifier ranges, left strictly below
/// right.
pub fn merge(
    backend: &dyn ProvingBackend,
    left: &TallyProof,
    right: &TallyProof,
) -> Result<TallyProof, AggregationError> {
    if !left.verify(backend)? || !right.verify(backend)? {
        return Err(AggregationError::ProofVerificationFailed);
    }
    if left.public_input != right.public_input {
        return Err(AggregationError::ElectionMismatch);
    }
    let bounds = match (left.public_output.bounds, right.public_output.bounds) {
        (None, b) | (b, None) => b,
        (Some(l), Some(r)) => {
            if l.upper >= r.lower {
                return Err(AggregationError::NullifierAlreadyCounted);
            }
            Some(RangeBounds {
                lower: l.lower,
                upper: r.upper,
            })
        }
    };
    compose(
        backend,
        left.public_input,
        RangePublicOutput {
            total_aggregated: left.public_output.total_aggregated
                + right.public_output.total_aggregated,
            bounds,
            counts: left
                .public_output
                .counts
                .merged(&right.public_output.counts),
        },
    )
}

/// Drain a presorted tree through the chain: seed on the first vote, append
/// the rest in ascending nullifier order.
pub fn aggregate_sorted(
    backend: &dyn ProvingBackend,
    binding: ElectionBinding,
    tree: VoteTree<VoteProof>,
) -> Result<TallyProof, AggregationError> {
    let mut votes = tree.into_sorted_vec().into_iter();
    let mut tally = match votes.next() {
        None => return seed_empty(backend, binding),
        Some((_, vote)) => seed_one(backend, binding, &vote)?,
    };
    for (_, vote) in votes {
        tally = append_one(backend, &tally, &vote)?;
    }
    Ok(tally)
}
