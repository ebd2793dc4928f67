//! Membership-proof aggregation: the seen set is a sparse merkle map root,
//! and every append carries a leaf witness showing the nullifier absent from
//! the previous state. Votes may arrive in any order.

use serde::{Deserialize, Serialize};

use accum::{LeafWitness, NullifierMap, Root};
use pcd::{BackendError, ProofBytes, ProvingBackend, VoteProof};
use primitives::{
    encode_u32, encode_u64, encode_u8, ElectionBinding, VoteCounts, ENC_V1, MAX_OPTIONS,
};

use crate::error::AggregationError;
use crate::check_vote_shape;

/// Variant tag folded into the public encoding so membership and range
/// transition proofs can never be replayed across protocols.
const STEP_MEMBERSHIP: u8 = 1;

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct TallyPublicOutput {
    pub total_aggregated: u64,
    pub seen_root: Root,
    pub counts: VoteCounts,
}

/// One immutable tally state plus the proof of its derivation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct TallyProof {
    pub public_input: ElectionBinding,
    pub public_output: TallyPublicOutput,
    pub proof: ProofBytes,
}

impl TallyProof {
    pub fn encode_public(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + 32 * 3 + 8 + MAX_OPTIONS * 4);
        encode_u8(ENC_V1, &mut out);
        encode_u8(STEP_MEMBERSHIP, &mut out);
        out.extend_from_slice(self.public_input.election_id.as_bytes());
        out.extend_from_slice(self.public_input.voters_root.as_bytes());
        encode_u64(self.public_output.total_aggregated, &mut out);
        out.extend_from_slice(&self.public_output.seen_root.0);
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
    public_output: TallyPublicOutput,
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

/// The zero tally for an election: all counters zero, empty seen set.
pub fn seed_empty(
    backend: &dyn ProvingBackend,
    binding: ElectionBinding,
) -> Result<TallyProof, AggregationError> {
    compose(
        backend,
        binding,
        TallyPublicOutput {
            total_aggregated: 0,
            seen_root: NullifierMap::empty_root(),
            counts: VoteCounts::empty(),
        },
    )
}

/// A one-vote tally seeded directly from a vote proof. The witness must show
/// the nullifier's leaf empty in the empty map.
pub fn seed_one(
    backend: &dyn ProvingBackend,
    binding: ElectionBinding,
    vote: &VoteProof,
    witness: &LeafWitness,
) -> Result<TallyProof, AggregationError> {
    check_vote(backend, vote)?;
    if vote.public_input.binding != binding {
        return Err(AggregationError::ElectionMismatch);
    }
    if witness.key != vote.public_output.nullifier
        || witness.siblings.len() != accum::MAP_HEIGHT
        || witness.root_with_value(None) != NullifierMap::empty_root()
    {
        return Err(AggregationError::NullifierWitnessInvalid);
    }
    let option = vote.public_output.vote;
    compose(
        backend,
        binding,
        TallyPublicOutput {
            total_aggregated: 1,
            seen_root: witness.root_with_value(Some(option)),
            counts: VoteCounts::empty().bumped(option),
        },
    )
}

/// Extend a tally by one vote. Validation order is fixed; any failure leaves
/// the previous state as current and emits nothing.
pub fn append_one(
    backend: &dyn ProvingBackend,
    prev: &TallyProof,
    vote: &VoteProof,
    witness: &LeafWitness,
) -> Result<TallyProof, AggregationError> {
    // 1. A forged prior state must not be extendable.
    if !prev.verify(backend)? {
        return Err(AggregationError::ProofVerificationFailed);
    }
    // 2. The new evidence must itself verify.
    check_vote(backend, vote)?;
    // 3. Same election, exact equality on both binding fields.
    if prev.public_input != vote.public_input.binding {
        return Err(AggregationError::ElectionMismatch);
    }
    // 4. The nullifier must be absent from the previous seen set.
    if witness.key != vote.public_output.nullifier {
        return Err(AggregationError::NullifierWitnessInvalid);
    }
    if !witness.matches(&prev.public_output.seen_root) {
        return Err(AggregationError::NullifierWitnessInvalid);
    }
    if witness.value.is_some() {
        return Err(AggregationError::NullifierAlreadyCounted);
    }
    // 5. Count the vote and fold the nullifier into the seen set.
    let option = vote.public_output.vote;
    compose(
        backend,
        prev.public_input,
        TallyPublicOutput {
            total_aggregated: prev.public_output.total_aggregated + 1,
            seen_root: witness.root_with_value(Some(option)),
            counts: prev.public_output.counts.bumped(option),
        },
    )
}
