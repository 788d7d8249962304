//! Error families for the rollup pipeline.
//!
//! Each family maps to one stage: a request that fails authorization never
//! reaches a batch, a batch that fails assembly never reaches the prover, a
//! proof that fails never reaches the ledger, and a ledger rejection leaves
//! the ledger untouched.

use std::time::Duration;

use rollup_transaction::AssetId;
use rollup_trie::TrieError;
use thiserror::Error;

use crate::sequencer::settlement::prover::RelationViolation;
use crate::sequencer::settlement::public_inputs::SlotDecodeError;

/// A single request failed local validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Asset {0} is outside the trie range")]
    AssetOutOfRange(AssetId),

    #[error("Transfer target is the null address")]
    NullTarget,

    #[error("Signature does not verify against the owner key")]
    BadSignature,

    #[error("Signer does not own asset {asset_id}")]
    NotOwner { asset_id: AssetId },

    #[error("Stale nonce for asset {asset_id}: expected {expected}, got {got}")]
    StaleNonce {
        asset_id: AssetId,
        expected: u64,
        got: u64,
    },

    #[error("Asset {asset_id} already has a queued transfer")]
    AssetPending { asset_id: AssetId },

    #[error(transparent)]
    Trie(#[from] TrieError),
}

/// A batch could not be assembled; nothing was applied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchConsistencyError {
    #[error("Batch is empty")]
    Empty,

    #[error("Batch too large: {len} requests, limit {limit}")]
    TooLarge { len: usize, limit: usize },

    #[error("Asset {0} appears more than once in the batch")]
    DuplicateAsset(AssetId),

    #[error("Request {index} rejected: {source}")]
    Rejected {
        index: usize,
        #[source]
        source: AuthorizationError,
    },

    #[error(transparent)]
    Trie(#[from] TrieError),
}

/// The proof oracle did not return a proof
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofGenerationError {
    #[error("Witness does not satisfy the batch relation: {0}")]
    UnsatisfiedWitness(#[from] RelationViolation),

    #[error("Proof generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Prover backend failure: {0}")]
    Backend(String),
}

/// The ledger refused a transition; its state is unchanged
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OnChainRejection {
    #[error("Malformed public inputs: expected {expected} fields, got {got}")]
    MalformedInputs { expected: usize, got: usize },

    #[error("Claimed old ownership root does not match the ledger")]
    StaleOwnershipRoot,

    #[error("Claimed old nonce root does not match the ledger")]
    StaleNonceRoot,

    #[error("Proof verification failed")]
    InvalidProof,
}

impl OnChainRejection {
    /// A compare-and-swap miss: another batch committed first
    pub fn is_stale_root(&self) -> bool {
        matches!(self, Self::StaleOwnershipRoot | Self::StaleNonceRoot)
    }
}

/// Replay diverged from the logged transitions. Fatal for the reconstructor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconstructionMismatch {
    #[error("Reconstructor halted after an earlier mismatch")]
    Halted,

    #[error("Log genesis roots do not match the local genesis state")]
    GenesisRoots,

    #[error("Event {index} out of order: expected {expected}")]
    OutOfOrder { index: u64, expected: u64 },

    #[error("Event {index}: claimed old ownership root differs from local state")]
    OldOwnershipRoot { index: u64 },

    #[error("Event {index}: claimed old nonce root differs from local state")]
    OldNonceRoot { index: u64 },

    #[error("Event {index}: replayed ownership root differs from the claimed new root")]
    NewOwnershipRoot { index: u64 },

    #[error("Event {index}: replayed nonce root differs from the claimed new root")]
    NewNonceRoot { index: u64 },

    #[error("Event {index} slot {slot}: {source}")]
    MalformedSlot {
        index: u64,
        slot: usize,
        #[source]
        source: SlotDecodeError,
    },

    #[error("Event {index} slot {slot}: signer does not own asset {asset_id} locally")]
    OwnerDivergence {
        index: u64,
        slot: usize,
        asset_id: AssetId,
    },

    #[error("Event {index} slot {slot}: nonce {got} for asset {asset_id}, local nonce {expected}")]
    NonceDivergence {
        index: u64,
        slot: usize,
        asset_id: AssetId,
        expected: u64,
        got: u64,
    },

    #[error("Event {index}: {source}")]
    Trie {
        index: u64,
        #[source]
        source: TrieError,
    },
}

/// Anything the sequencer pipeline can fail with
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Batch(#[from] BatchConsistencyError),

    #[error(transparent)]
    Proof(#[from] ProofGenerationError),

    #[error(transparent)]
    Rejected(#[from] OnChainRejection),

    #[error(transparent)]
    Reconstruction(#[from] ReconstructionMismatch),
}
