//! Batch Assembly
//!
//! Folds an ordered list of transfer requests into one state transition.
//!
//! ```text
//!   state (R_own, R_nonce)
//!      │  req 0: validate ─▶ ownership.update(asset, target)
//!      │                 ─▶ nonces.update(asset, nonce + 1)
//!      ▼
//!   intermediate roots
//!      │  req 1: validate against the intermediate state ...
//!      ▼
//!   post-state (R_own', R_nonce') + public inputs + witness
//! ```
//!
//! Requests are applied strictly in list order: every request's Merkle paths
//! are taken against the roots left by the one before it. Assembly runs on a
//! scratch copy of the state, so a failing batch leaves the caller's state
//! untouched.

use std::collections::HashSet;

use rollup_primitives::BATCH_SIZE;
use rollup_transaction::TransferRequest;
use tracing::debug;

use crate::error::BatchConsistencyError;
use crate::sequencer::execution::authorizer::TransferAuthorizer;
use crate::sequencer::settlement::prover::{BatchWitness, StepWitness};
use crate::sequencer::settlement::public_inputs::PublicInputs;
use crate::sequencer::storage::{AssetState, RollupRoots, TransferStep};

// ============================================================================
// Batch
// ============================================================================

/// An assembled transition
#[derive(Debug, Clone)]
pub struct Batch {
    pub requests: Vec<TransferRequest>,
    pub old_roots: RollupRoots,
    pub new_roots: RollupRoots,
    /// Per-request trie updates, in request order
    pub steps: Vec<TransferStep>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Canonical public-input vector
    pub fn public_inputs(&self) -> Result<PublicInputs, BatchConsistencyError> {
        PublicInputs::encode(self.old_roots, self.new_roots, &self.requests)
    }

    /// Public inputs plus the per-request paths
    pub fn witness(&self) -> Result<BatchWitness, BatchConsistencyError> {
        Ok(BatchWitness {
            public_inputs: self.public_inputs()?,
            steps: self
                .steps
                .iter()
                .map(|s| StepWitness {
                    ownership_siblings: s.ownership.siblings,
                    nonce_siblings: s.nonce.siblings,
                })
                .collect(),
        })
    }
}

/// Output of a successful assembly
#[derive(Debug, Clone)]
pub struct AssembledBatch {
    pub batch: Batch,
    pub witness: BatchWitness,
    /// State after every request is applied. Adopt only once the ledger
    /// accepts the batch.
    pub post_state: AssetState,
}

// ============================================================================
// Assembler
// ============================================================================

#[derive(Debug, Clone)]
pub struct BatchAssembler {
    max_requests: usize,
}

impl BatchAssembler {
    pub fn new() -> Self {
        Self {
            max_requests: BATCH_SIZE,
        }
    }

    /// Lower the per-batch limit. Clamped to `1..=BATCH_SIZE`.
    pub fn with_max_requests(max_requests: usize) -> Self {
        Self {
            max_requests: max_requests.clamp(1, BATCH_SIZE),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Apply `requests` in order to a copy of `state`
    pub fn assemble(
        &self,
        state: &AssetState,
        requests: Vec<TransferRequest>,
    ) -> Result<AssembledBatch, BatchConsistencyError> {
        if requests.is_empty() {
            return Err(BatchConsistencyError::Empty);
        }
        if requests.len() > self.max_requests {
            return Err(BatchConsistencyError::TooLarge {
                len: requests.len(),
                limit: self.max_requests,
            });
        }

        let mut seen = HashSet::with_capacity(requests.len());
        for req in &requests {
            if !seen.insert(req.asset_id()) {
                return Err(BatchConsistencyError::DuplicateAsset(req.asset_id()));
            }
        }

        let old_roots = state.roots();
        let mut scratch = state.clone();
        let mut steps = Vec::with_capacity(requests.len());

        for (index, req) in requests.iter().enumerate() {
            TransferAuthorizer::validate_state(req, &scratch)
                .map_err(|source| BatchConsistencyError::Rejected { index, source })?;
            let step = scratch.apply_transfer(req.asset_id(), req.target(), req.nonce())?;
            debug!(
                index,
                asset_id = req.asset_id().0,
                "Applied transfer to scratch state"
            );
            steps.push(step);
        }

        let batch = Batch {
            requests,
            old_roots,
            new_roots: scratch.roots(),
            steps,
        };
        let witness = batch.witness()?;

        Ok(AssembledBatch {
            batch,
            witness,
            post_state: scratch,
        })
    }
}

impl Default for BatchAssembler {
    fn default() -> Self {
        Self::new()
    }
}
