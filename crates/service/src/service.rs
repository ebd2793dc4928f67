//! Single-writer orchestrator per election.
//!
//! Proof composition is CPU-bound and unbounded in wall-clock time, so every
//! state-machine call runs on the blocking pool. Requests for different
//! elections proceed in parallel; requests for the same election serialize
//! in submission order behind a per-election mutex, because each append's
//! validity depends on its caller holding the most recently emitted state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use accum::NullifierMap;
use agg::{membership, AggregationError};
use pcd::{ProvingBackend, VoteProof};
use primitives::{ElectionBinding, ElectionId, Nullifier, OptionIndex};

use crate::request::{PreviousVoter, SubmitRequest, SubmitResponse};
use crate::store::{CountedVote, StoredTally, TallyStore};

pub struct AggregationService<B, S> {
    backend: Arc<B>,
    store: Arc<S>,
    ready: OnceCell<()>,
    locks: Mutex<HashMap<ElectionId, Arc<Mutex<()>>>>,
}

impl<B, S> AggregationService<B, S>
where
    B: ProvingBackend + 'static,
    S: TallyStore + 'static,
{
    pub fn new(backend: B, store: S) -> Self {
        AggregationService {
            backend: Arc::new(backend),
            store: Arc::new(store),
            ready: OnceCell::new(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Compile the proving subsystem once per process. Concurrent callers
    /// collapse into a single initialization; later calls return immediately.
    pub async fn ensure_ready(&self) -> Result<(), AggregationError> {
        let backend = Arc::clone(&self.backend);
        self.ready
            .get_or_try_init(|| async move {
                run_blocking(move || backend.ensure_ready().map_err(AggregationError::from))
                    .await
            })
            .await?;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    /// Handle one request end to end, mapping the outcome to the wire shape.
    pub async fn submit(&self, request: SubmitRequest) -> SubmitResponse {
        match self.handle(request).await {
            Ok(tally) => SubmitResponse::from_tally(&tally),
            Err(err) => {
                log::warn!("aggregation step rejected: {err}");
                SubmitResponse::from_error(&err)
            }
        }
    }

    /// Latest persisted tally for an election, if any.
    pub async fn latest(
        &self,
        election: &ElectionId,
    ) -> Result<Option<StoredTally>, AggregationError> {
        self.store
            .load_latest(election)
            .map_err(|e| AggregationError::ProofGeneration(e.to_string()))
    }

    async fn handle(
        &self,
        request: SubmitRequest,
    ) -> Result<membership::TallyProof, AggregationError> {
        self.ensure_ready().await?;

        let vote = request
            .proof_json
            .map(|value| {
                serde_json::from_value::<VoteProof>(value)
                    .map_err(|e| AggregationError::ProofParse(e.to_string()))
            })
            .transpose()?;
        let prev = request
            .previous_proof_json
            .map(|value| {
                serde_json::from_value::<membership::TallyProof>(value)
                    .map_err(|e| AggregationError::ProofParse(e.to_string()))
            })
            .transpose()?;

        let binding = resolve_binding(&prev, &vote, request.binding)?;
        let lock = self.election_lock(&binding.election_id).await;
        let _guard = lock.lock().await;

        let backend = Arc::clone(&self.backend);
        let latest = match (prev, vote) {
            (None, None) => {
                let tally =
                    run_blocking(move || membership::seed_empty(backend.as_ref(), binding))
                        .await?;
                StoredTally {
                    tally,
                    voters: Vec::new(),
                }
            }
            (None, Some(vote)) => {
                run_blocking(move || {
                    let witness = NullifierMap::new().witness(vote.public_output.nullifier);
                    let counted = CountedVote {
                        vote: vote.public_output.vote,
                        nullifier: vote.public_output.nullifier,
                    };
                    let tally = membership::seed_one(backend.as_ref(), binding, &vote, &witness)?;
                    Ok(StoredTally {
                        tally,
                        voters: vec![counted],
                    })
                })
                .await?
            }
            (Some(prev), Some(vote)) => {
                let voters = parse_previous_voters(request.previous_voters.unwrap_or_default())?;
                run_blocking(move || append_step(backend.as_ref(), prev, vote, voters)).await?
            }
            (Some(_), None) => {
                return Err(AggregationError::BadRequest(
                    "previous_proof_json without proof_json".into(),
                ))
            }
        };

        self.store
            .save_latest(&binding.election_id, latest.clone())
            .map_err(|e| AggregationError::ProofGeneration(format!("persist failed: {e}")))?;
        log::info!(
            "election {:?}: tally extended to {} votes",
            binding.election_id,
            latest.tally.public_output.total_aggregated
        );
        Ok(latest.tally)
    }

    async fn election_lock(&self, election: &ElectionId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(*election).or_default().clone()
    }
}

/// Rebuild the seen-set map from the persisted voter list, check it against
/// the previous tally, and run one append.
fn append_step<B: ProvingBackend>(
    backend: &B,
    prev: membership::TallyProof,
    vote: VoteProof,
    mut voters: Vec<CountedVote>,
) -> Result<StoredTally, AggregationError> {
    let map = NullifierMap::from_pairs(voters.iter().map(|cv| (cv.nullifier, cv.vote)));
    if map.len() != voters.len() {
        return Err(AggregationError::BadRequest(
            "duplicate nullifier in previous_voters".into(),
        ));
    }
    if map.root() != prev.public_output.seen_root {
        return Err(AggregationError::NullifierWitnessInvalid);
    }
    let witness = map.witness(vote.public_output.nullifier);
    let tally = membership::append_one(backend, &prev, &vote, &witness)?;
    voters.push(CountedVote {
        vote: vote.public_output.vote,
        nullifier: vote.public_output.nullifier,
    });
    Ok(StoredTally { tally, voters })
}

fn resolve_binding(
    prev: &Option<membership::TallyProof>,
    vote: &Option<VoteProof>,
    binding: Option<ElectionBinding>,
) -> Result<ElectionBinding, AggregationError> {
    if let Some(prev) = prev {
        return Ok(prev.public_input);
    }
    if let Some(vote) = vote {
        return Ok(vote.public_input.binding);
    }
    binding.ok_or_else(|| {
        AggregationError::BadRequest("request carries neither proofs nor a binding".into())
    })
}

fn parse_previous_voters(
    voters: Vec<PreviousVoter>,
) -> Result<Vec<CountedVote>, AggregationError> {
    voters
        .into_iter()
        .map(|pv| {
            let vote = u8::try_from(pv.vote)
                .ok()
                .and_then(OptionIndex::new)
                .ok_or_else(|| {
                    AggregationError::BadRequest(format!("vote option out of range: {}", pv.vote))
                })?;
            let nullifier = Nullifier::from_decimal(&pv.nullifier)?;
            Ok(CountedVote { vote, nullifier })
        })
        .collect()
}

async fn run_blocking<T, F>(f: F) -> Result<T, AggregationError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AggregationError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AggregationError::ProofGeneration(format!("worker task failed: {e}")))?
}
