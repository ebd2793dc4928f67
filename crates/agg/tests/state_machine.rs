use accum::NullifierMap;
use agg::{membership, range, AggregationError};
use pcd::{mock::mock_vote, ProvingBackend, TranscriptBackend, VoteProof};
use primitives::{ElectionBinding, ElectionId, Nullifier, OptionIndex, VotersRoot};
use segtree::VoteTree;

fn backend() -> TranscriptBackend {
    let backend = TranscriptBackend::new();
    backend.ensure_ready().unwrap();
    backend
}

fn binding() -> ElectionBinding {
    ElectionBinding {
        election_id: ElectionId([7u8; 32]),
        voters_root: VotersRoot(Nullifier::from_u64(99).0),
    }
}

fn vote(backend: &TranscriptBackend, b: ElectionBinding, option: u8, nullifier: u64) -> VoteProof {
    mock_vote(backend, b, OptionIndex(option), Nullifier::from_u64(nullifier)).unwrap()
}

/// Drive one membership append, maintaining the caller-side map the way the
/// aggregation service reconstructs it from persisted voters.
fn append(
    backend: &TranscriptBackend,
    map: &mut NullifierMap,
    prev: &membership::TallyProof,
    vote: &VoteProof,
) -> Result<membership::TallyProof, AggregationError> {
    let witness = map.witness(vote.public_output.nullifier);
    let next = membership::append_one(backend, prev, vote, &witness)?;
    map.insert(vote.public_output.nullifier, vote.public_output.vote);
    Ok(next)
}

#[test]
fn membership_scenario_two_options() {
    // Election with 2 options in use; five votes [0,1,0,0,1] expect [3,2].
    let backend = backend();
    let b = binding();
    let votes: Vec<VoteProof> = [0u8, 1, 0, 0, 1]
        .iter()
        .enumerate()
        .map(|(i, &opt)| vote(&backend, b, opt, 1000 + i as u64))
        .collect();

    let mut map = NullifierMap::new();
    let mut tally = membership::seed_empty(&backend, b).unwrap();
    for v in &votes {
        tally = append(&backend, &mut map, &tally, v).unwrap();
    }
    assert_eq!(tally.public_output.total_aggregated, 5);
    assert_eq!(tally.public_output.counts.get(OptionIndex(0)), 3);
    assert_eq!(tally.public_output.counts.get(OptionIndex(1)), 2);

    // A sixth proof reusing the nullifier of vote #3 must be rejected and
    // leave the tally untouched.
    let dup = vote(&backend, b, 1, 1002);
    let err = append(&backend, &mut map, &tally, &dup).unwrap_err();
    assert_eq!(err, AggregationError::NullifierAlreadyCounted);
    assert_eq!(tally.public_output.counts.get(OptionIndex(0)), 3);
    assert_eq!(tally.public_output.counts.get(OptionIndex(1)), 2);
    assert!(tally.verify(&backend).unwrap());
}

#[test]
fn membership_is_order_independent() {
    let backend = backend();
    let b = binding();
    let votes: Vec<VoteProof> = [(0u8, 5u64), (1, 3), (2, 9), (1, 7)]
        .iter()
        .map(|&(opt, nf)| vote(&backend, b, opt, nf))
        .collect();

    let run = |order: &[usize]| {
        let mut map = NullifierMap::new();
        let mut tally = membership::seed_empty(&backend, b).unwrap();
        for &i in order {
            tally = append(&backend, &mut map, &tally, &votes[i]).unwrap();
        }
        tally
    };

    let forward = run(&[0, 1, 2, 3]);
    let shuffled = run(&[3, 0, 2, 1]);
    assert_eq!(forward.public_output, shuffled.public_output);
    assert_eq!(forward.proof, shuffled.proof);
}

#[test]
fn membership_seed_one_from_vote() {
    let backend = backend();
    let b = binding();
    let v = vote(&backend, b, 4, 42);
    let map = NullifierMap::new();
    let witness = map.witness(v.public_output.nullifier);
    let tally = membership::seed_one(&backend, b, &v, &witness).unwrap();
    assert_eq!(tally.public_output.total_aggregated, 1);
    assert_eq!(tally.public_output.counts.get(OptionIndex(4)), 1);

    // The seeded root must equal the root of a map holding exactly that vote.
    let mut expect = NullifierMap::new();
    expect.insert(v.public_output.nullifier, v.public_output.vote);
    assert_eq!(tally.public_output.seen_root, expect.root());
}

#[test]
fn membership_rejects_election_mismatch() {
    let backend = backend();
    let b = binding();
    let other = ElectionBinding {
        election_id: ElectionId([8u8; 32]),
        ..b
    };
    let mut map = NullifierMap::new();
    let tally = membership::seed_empty(&backend, b).unwrap();

    let foreign = vote(&backend, other, 0, 1);
    let err = append(&backend, &mut map, &tally, &foreign).unwrap_err();
    assert_eq!(err, AggregationError::ElectionMismatch);
    assert!(map.is_empty());

    // seed_one receives the supplied binding; a vote bound elsewhere fails.
    let witness = NullifierMap::new().witness(Nullifier::from_u64(1));
    assert_eq!(
        membership::seed_one(&backend, b, &foreign, &witness).unwrap_err(),
        AggregationError::ElectionMismatch
    );
}

#[test]
fn membership_rejects_forged_previous_state() {
    let backend = backend();
    let b = binding();
    let mut tally = membership::seed_empty(&backend, b).unwrap();
    // Tamper with the counts without re-proving.
    tally.public_output.counts = tally.public_output.counts.bumped(OptionIndex(0));

    let v = vote(&backend, b, 0, 5);
    let witness = NullifierMap::new().witness(v.public_output.nullifier);
    assert_eq!(
        membership::append_one(&backend, &tally, &v, &witness).unwrap_err(),
        AggregationError::ProofVerificationFailed
    );
}

#[test]
fn membership_rejects_invalid_vote_proof() {
    let backend = backend();
    let b = binding();
    let tally = membership::seed_empty(&backend, b).unwrap();
    let mut v = vote(&backend, b, 0, 5);
    v.proof.0[0] ^= 0xff;
    let witness = NullifierMap::new().witness(v.public_output.nullifier);
    assert_eq!(
        membership::append_one(&backend, &tally, &v, &witness).unwrap_err(),
        AggregationError::ProofVerificationFailed
    );
}

#[test]
fn membership_rejects_stale_or_mismatched_witness() {
    let backend = backend();
    let b = binding();
    let mut map = NullifierMap::new();
    let mut tally = membership::seed_empty(&backend, b).unwrap();
    tally = append(&backend, &mut map, &tally, &vote(&backend, b, 0, 10)).unwrap();

    // Witness for a different key than the vote's nullifier.
    let v = vote(&backend, b, 1, 11);
    let wrong_key = map.witness(Nullifier::from_u64(12));
    assert_eq!(
        membership::append_one(&backend, &tally, &v, &wrong_key).unwrap_err(),
        AggregationError::NullifierWitnessInvalid
    );

    // Witness computed against a stale map (before vote #10 was folded in).
    let stale = NullifierMap::new().witness(v.public_output.nullifier);
    assert_eq!(
        membership::append_one(&backend, &tally, &v, &stale).unwrap_err(),
        AggregationError::NullifierWitnessInvalid
    );
}

#[test]
fn membership_tally_json_roundtrip() {
    let backend = backend();
    let b = binding();
    let mut map = NullifierMap::new();
    let mut tally = membership::seed_empty(&backend, b).unwrap();
    tally = append(&backend, &mut map, &tally, &vote(&backend, b, 3, 77)).unwrap();

    let json = serde_json::to_string(&tally).unwrap();
    let back: membership::TallyProof = serde_json::from_str(&json).unwrap();
    assert_eq!(back.public_input, tally.public_input);
    assert_eq!(back.public_output, tally.public_output);
    assert_eq!(back.proof, tally.proof);
    assert!(back.verify(&backend).unwrap());
}

#[test]
fn range_chain_in_sorted_order() {
    let backend = backend();
    let b = binding();
    let mut tally = range::seed_one(&backend, b, &vote(&backend, b, 0, 10)).unwrap();
    for (opt, nf) in [(1u8, 20u64), (0, 30), (1, 40)] {
        tally = range::append_one(&backend, &tally, &vote(&backend, b, opt, nf)).unwrap();
    }
    assert_eq!(tally.public_output.total_aggregated, 4);
    let bounds = tally.public_output.bounds.unwrap();
    assert_eq!(bounds.lower, Nullifier::from_u64(10));
    assert_eq!(bounds.upper, Nullifier::from_u64(40));
    assert_eq!(tally.public_output.counts.get(OptionIndex(0)), 2);
    assert_eq!(tally.public_output.counts.get(OptionIndex(1)), 2);

    // Duplicate of the current upper bound.
    assert_eq!(
        range::append_one(&backend, &tally, &vote(&backend, b, 0, 40)).unwrap_err(),
        AggregationError::NullifierAlreadyCounted
    );
    // Below the counted range: not appendable.
    assert!(matches!(
        range::append_one(&backend, &tally, &vote(&backend, b, 0, 5)).unwrap_err(),
        AggregationError::BadRequest(_)
    ));
    // But prependable.
    let tally = range::prepend_one(&backend, &tally, &vote(&backend, b, 1, 5)).unwrap();
    assert_eq!(tally.public_output.bounds.unwrap().lower, Nullifier::from_u64(5));
    assert_eq!(tally.public_output.total_aggregated, 5);
}

#[test]
fn range_merge_requires_disjoint_ranges() {
    let backend = backend();
    let b = binding();
    let low = {
        let mut t = range::seed_one(&backend, b, &vote(&backend, b, 0, 1)).unwrap();
        t = range::append_one(&backend, &t, &vote(&backend, b, 1, 2)).unwrap();
        t
    };
    let high = {
        let mut t = range::seed_one(&backend, b, &vote(&backend, b, 0, 8)).unwrap();
        t = range::append_one(&backend, &t, &vote(&backend, b, 0, 9)).unwrap();
        t
    };
    let merged = range::merge(&backend, &low, &high).unwrap();
    assert_eq!(merged.public_output.total_aggregated, 4);
    assert_eq!(merged.public_output.counts.get(OptionIndex(0)), 3);
    let bounds = merged.public_output.bounds.unwrap();
    assert_eq!(bounds.lower, Nullifier::from_u64(1));
    assert_eq!(bounds.upper, Nullifier::from_u64(9));

    // Overlapping ranges must not merge.
    let overlap = range::seed_one(&backend, b, &vote(&backend, b, 0, 2)).unwrap();
    assert_eq!(
        range::merge(&backend, &low, &overlap).unwrap_err(),
        AggregationError::NullifierAlreadyCounted
    );
}

#[test]
fn range_aggregates_presorted_tree() {
    let backend = backend();
    let b = binding();
    // Insert out of order; the tree presorts before the chain runs.
    let mut tree = VoteTree::new();
    for (opt, nf) in [(1u8, 50u64), (0, 10), (1, 30), (0, 20), (0, 40)] {
        let v = vote(&backend, b, opt, nf);
        tree.insert(v.public_output.nullifier, v).unwrap();
    }
    let tally = range::aggregate_sorted(&backend, b, tree).unwrap();
    assert_eq!(tally.public_output.total_aggregated, 5);
    assert_eq!(tally.public_output.counts.get(OptionIndex(0)), 3);
    assert_eq!(tally.public_output.counts.get(OptionIndex(1)), 2);
    let bounds = tally.public_output.bounds.unwrap();
    assert_eq!(bounds.lower, Nullifier::from_u64(10));
    assert_eq!(bounds.upper, Nullifier::from_u64(50));
    assert!(tally.verify(&backend).unwrap());
}

#[test]
fn range_empty_tree_yields_zero_tally() {
    let backend = backend();
    let b = binding();
    let tally = range::aggregate_sorted(&backend, b, VoteTree::new()).unwrap();
    assert_eq!(tally.public_output.total_aggregated, 0);
    assert_eq!(tally.public_output.bounds, None);
}

#[test]
fn variant_proofs_do_not_cross_verify() {
    let backend = backend();
    let b = binding();
    let mem = membership::seed_empty(&backend, b).unwrap();
    let rng = range::seed_empty(&backend, b).unwrap();
    // Same binding, zero counts in both, but the encodings are domain-tagged.
    assert!(backend
        .verify_transition(&rng.encode_public(), &mem.proof)
        .map(|ok| !ok)
        .unwrap());
}
