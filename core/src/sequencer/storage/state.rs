//! Rollup State
//!
//! The off-chain state is two tries sharing the asset-id key space:
//!
//! ```text
//!   ownership:  asset_id -> owner address
//!   nonces:     asset_id -> transfer counter (0 at mint, +1 per transfer)
//! ```
//!
//! Only the two roots are anchored on the ledger. `AssetState` is a plain
//! value: callers that need to try a sequence of transfers clone it, apply,
//! and keep the clone only if the whole sequence succeeds.

use ark_ff::One;
use rollup_keypair::Address;
use rollup_primitives::{Fr, fr_to_u64, serde_fr};
use rollup_transaction::AssetId;
use rollup_trie::{SparseMerkleTrie, TrieError, UpdateResult};
use serde::{Deserialize, Serialize};

/// The two roots the ledger stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupRoots {
    #[serde(with = "serde_fr")]
    pub ownership_root: Fr,
    #[serde(with = "serde_fr")]
    pub nonce_root: Fr,
}

/// Both trie updates performed by one transfer
#[derive(Debug, Clone)]
pub struct TransferStep {
    pub asset_id: AssetId,
    pub ownership: UpdateResult,
    pub nonce: UpdateResult,
}

#[derive(Debug, Clone, Default)]
pub struct AssetState {
    ownership: SparseMerkleTrie,
    nonces: SparseMerkleTrie,
}

impl AssetState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ownership(&self) -> &SparseMerkleTrie {
        &self.ownership
    }

    pub fn nonces(&self) -> &SparseMerkleTrie {
        &self.nonces
    }

    pub fn roots(&self) -> RollupRoots {
        RollupRoots {
            ownership_root: self.ownership.root(),
            nonce_root: self.nonces.root(),
        }
    }

    /// Number of minted assets
    pub fn asset_count(&self) -> usize {
        self.ownership.len()
    }

    /// Create an asset with nonce 0
    pub fn mint(&mut self, asset_id: AssetId, owner: Address) -> Result<(), TrieError> {
        // check both before touching either so a failed mint leaves no half-state
        if self.ownership.contains(asset_id.0) || self.nonces.contains(asset_id.0) {
            return Err(TrieError::KeyOccupied(asset_id.0));
        }
        self.ownership.insert(asset_id.0, owner.to_field())?;
        self.nonces.insert(asset_id.0, Fr::from(0u64))?;
        Ok(())
    }

    /// Current owner; the null address if the asset was never minted
    pub fn owner(&self, asset_id: AssetId) -> Result<Address, TrieError> {
        let found = self.ownership.find(asset_id.0)?;
        Ok(Address::from_field(found.value))
    }

    /// Current nonce; 0 if the asset was never minted
    pub fn nonce(&self, asset_id: AssetId) -> Result<u64, TrieError> {
        let found = self.nonces.find(asset_id.0)?;
        // nonces are only ever written from u64 counters
        Ok(fr_to_u64(&found.value).unwrap_or(u64::MAX))
    }

    /// Move `asset_id` to `target` and advance its nonce from `nonce`.
    ///
    /// Does not authorize: callers check ownership and nonce first.
    pub fn apply_transfer(
        &mut self,
        asset_id: AssetId,
        target: Address,
        nonce: u64,
    ) -> Result<TransferStep, TrieError> {
        if !self.nonces.contains(asset_id.0) {
            return Err(TrieError::KeyNotFound(asset_id.0));
        }
        let ownership = self.ownership.update(asset_id.0, target.to_field())?;
        let nonce = self
            .nonces
            .update(asset_id.0, Fr::from(nonce) + Fr::one())?;
        Ok(TransferStep {
            asset_id,
            ownership,
            nonce,
        })
    }
}

// ============================================================================
// Genesis
// ============================================================================

/// Initial asset allocation
#[derive(Debug, Clone, Default)]
pub struct Genesis {
    assets: Vec<(AssetId, Address)>,
}

impl Genesis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, asset_id: AssetId, owner: Address) -> Self {
        self.assets.push((asset_id, owner));
        self
    }

    /// Mint assets `1..=count` to `owner`
    pub fn with_assets(mut self, count: u64, owner: Address) -> Self {
        self.assets
            .extend((1..=count).map(|id| (AssetId(id), owner)));
        self
    }

    pub fn assets(&self) -> &[(AssetId, Address)] {
        &self.assets
    }

    pub fn build(&self) -> Result<AssetState, TrieError> {
        let mut state = AssetState::new();
        for (asset_id, owner) in &self.assets {
            state.mint(*asset_id, *owner)?;
        }
        Ok(state)
    }
}
