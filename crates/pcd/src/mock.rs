//! Mock vote fixtures for driving the aggregator without a wallet.

use primitives::{ElectionBinding, Nullifier, OptionIndex};

use crate::{BackendError, TranscriptBackend, VoteProof, VotePublicInput, VotePublicOutput};

/// Produce a well-formed vote proof for the given election, option, and
/// nullifier using the transcript backend.
pub fn mock_vote(
    backend: &TranscriptBackend,
    binding: ElectionBinding,
    vote: OptionIndex,
    nullifier: Nullifier,
) -> Result<VoteProof, BackendError> {
    let mut proof = VoteProof {
        public_input: VotePublicInput { binding, vote },
        public_output: VotePublicOutput { vote, nullifier },
        proof: Default::default(),
    };
    proof.proof = backend.prove_vote(&proof.encode_public())?;
    Ok(proof)
}
