//! Transfer Authorization
//!
//! Checks, in order:
//! 1. asset id addresses a trie slot
//! 2. target is not the null address (null marks an unused batch slot)
//! 3. signature over Poseidon(target, asset, nonce) verifies
//! 4. request nonce equals the stored nonce
//! 5. Poseidon(owner key) is the address stored for the asset
//!
//! The nonce is checked before ownership so a replayed request is always
//! reported as stale, whoever owns the asset now.

use rollup_keypair::{Account, Address};
use rollup_primitives::{TRIE_CAPACITY, fr_to_u64};
use rollup_transaction::{AssetId, TransferRequest};
use rollup_trie::SparseMerkleTrie;

use crate::error::AuthorizationError;
use crate::sequencer::storage::AssetState;

pub struct TransferAuthorizer;

impl TransferAuthorizer {
    /// Sign a transfer request. Deterministic for fixed inputs.
    pub fn build(
        owner: &Account,
        target: Address,
        asset_id: AssetId,
        nonce: u64,
    ) -> TransferRequest {
        TransferRequest::sign(owner, target, asset_id, nonce)
    }

    /// Validate a request against explicit ownership and nonce tries
    pub fn validate(
        request: &TransferRequest,
        ownership: &SparseMerkleTrie,
        nonces: &SparseMerkleTrie,
    ) -> Result<(), AuthorizationError> {
        let asset_id = request.asset_id();
        if asset_id.0 >= TRIE_CAPACITY {
            return Err(AuthorizationError::AssetOutOfRange(asset_id));
        }
        if request.target().is_null() {
            return Err(AuthorizationError::NullTarget);
        }
        if !request.verify_signature() {
            return Err(AuthorizationError::BadSignature);
        }

        let stored = nonces.find(asset_id.0)?;
        let expected = fr_to_u64(&stored.value).unwrap_or(u64::MAX);
        if request.nonce() != expected {
            return Err(AuthorizationError::StaleNonce {
                asset_id,
                expected,
                got: request.nonce(),
            });
        }

        let owner = ownership.find(asset_id.0)?;
        if !owner.found || owner.value != request.owner_address().to_field() {
            return Err(AuthorizationError::NotOwner { asset_id });
        }

        Ok(())
    }

    /// Validate a request against a full state handle
    pub fn validate_state(
        request: &TransferRequest,
        state: &AssetState,
    ) -> Result<(), AuthorizationError> {
        Self::validate(request, state.ownership(), state.nonces())
    }
}
