//! Persistence contract for the latest tally per election.
//!
//! The full counted-voter list is stored alongside the tally so a later
//! append can reconstruct the membership witness. Durable backends live
//! outside this workspace; `MemStore` covers tests and single-process runs.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use agg::membership::TallyProof;
use primitives::{ElectionId, Nullifier, OptionIndex};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Backend(String),
}

/// One counted (vote, nullifier) pair, the unit of the persisted voter list.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct CountedVote {
    pub vote: OptionIndex,
    pub nullifier: Nullifier,
}

/// Latest tally for an election plus every voter folded into it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct StoredTally {
    pub tally: TallyProof,
    pub voters: Vec<CountedVote>,
}

pub trait TallyStore: Send + Sync {
    fn load_latest(&self, election: &ElectionId) -> Result<Option<StoredTally>, StoreError>;
    fn save_latest(&self, election: &ElectionId, latest: StoredTally) -> Result<(), StoreError>;
}

/// In-memory store keyed by election.
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<HashMap<ElectionId, StoredTally>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TallyStore for MemStore {
    fn load_latest(&self, election: &ElectionId) -> Result<Option<StoredTally>, StoreError> {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(inner.get(election).cloned())
    }

    fn save_latest(&self, election: &ElectionId, latest: StoredTally) -> Result<(), StoreError> {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        inner.insert(*election, latest);
        Ok(())
    }
}
