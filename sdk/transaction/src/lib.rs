use std::fmt;

use rollup_keypair::{Account, Address, PublicKey, Signature};
use rollup_primitives::{Fr, poseidon_hash};
use serde::{Deserialize, Serialize};

/// Identifier of a unique asset; doubles as its trie key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u64);

impl AssetId {
    pub fn to_field(&self) -> Fr {
        Fr::from(self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for AssetId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// The message an owner signs to move `asset` to `target`.
pub fn transfer_message(target: Address, asset: AssetId, nonce: u64) -> Fr {
    poseidon_hash(&[target.to_field(), asset.to_field(), Fr::from(nonce)])
}

/// A signed request to move one asset.
///
/// Immutable once signed. It stays valid until the asset's nonce moves past
/// `nonce`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    owner: PublicKey,
    target: Address,
    asset_id: AssetId,
    nonce: u64,
    signature: Signature,
}

impl TransferRequest {
    /// Sign a transfer with the owner's account
    pub fn sign(owner: &Account, target: Address, asset_id: AssetId, nonce: u64) -> Self {
        let signature = owner.sign(transfer_message(target, asset_id, nonce));
        Self {
            owner: owner.public_key(),
            target,
            asset_id,
            nonce,
            signature,
        }
    }

    /// Assemble a request from already-decoded parts. The signature is not checked.
    pub fn from_parts(
        owner: PublicKey,
        target: Address,
        asset_id: AssetId,
        nonce: u64,
        signature: Signature,
    ) -> Self {
        Self {
            owner,
            target,
            asset_id,
            nonce,
            signature,
        }
    }

    pub fn owner(&self) -> &PublicKey {
        &self.owner
    }

    pub fn owner_address(&self) -> Address {
        self.owner.address()
    }

    pub fn target(&self) -> Address {
        self.target
    }

    pub fn asset_id(&self) -> AssetId {
        self.asset_id
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn message(&self) -> Fr {
        transfer_message(self.target, self.asset_id, self.nonce)
    }

    /// Check the signature against the embedded owner key, with no state.
    pub fn verify_signature(&self) -> bool {
        self.owner.verify(self.message(), &self.signature)
    }
}
