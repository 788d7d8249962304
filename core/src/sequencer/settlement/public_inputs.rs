//! Public Input Layout
//!
//! The flat vector shared by the batch circuit, the ledger and the
//! reconstructor. Offsets are part of the ledger ABI; B = BATCH_SIZE.
//!
//! ```text
//! ┌────────────────┬──────────────────────┐
//! │ 0              │ old ownership root   │
//! │ 1              │ new ownership root   │
//! │ 2              │ old nonce root       │
//! │ 3              │ new nonce root       │
//! │ 4     .. 4+B   │ target address  x B  │
//! │ 4+B   .. 4+2B  │ asset id        x B  │
//! │ 4+2B  .. 4+3B  │ nonce           x B  │
//! │ 4+3B  .. 4+4B  │ owner key x     x B  │
//! │ 4+4B  .. 4+5B  │ owner key y     x B  │
//! │ 4+5B  .. 4+6B  │ signature R.x   x B  │
//! │ 4+6B  .. 4+7B  │ signature R.y   x B  │
//! │ 4+7B  .. 4+8B  │ signature s     x B  │
//! └────────────────┴──────────────────────┘
//! ```
//!
//! Unused slots are all zero and come after every used slot. A slot is used
//! iff its target address is non-zero.

use ark_ff::Zero;
use rollup_keypair::{Address, KeyError, PublicKey, Signature};
use rollup_primitives::{BATCH_SIZE, Fr, TRIE_CAPACITY, fr_to_u64, serde_fr_vec};
use rollup_transaction::{AssetId, TransferRequest};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use thiserror::Error;

use crate::error::{BatchConsistencyError, OnChainRejection};
use crate::sequencer::storage::RollupRoots;

pub mod offsets {
    use rollup_primitives::BATCH_SIZE;

    pub const OLD_OWNERSHIP_ROOT: usize = 0;
    pub const NEW_OWNERSHIP_ROOT: usize = 1;
    pub const OLD_NONCE_ROOT: usize = 2;
    pub const NEW_NONCE_ROOT: usize = 3;

    pub const TARGET: usize = 4;
    pub const ASSET_ID: usize = TARGET + BATCH_SIZE;
    pub const NONCE: usize = ASSET_ID + BATCH_SIZE;
    pub const OWNER_X: usize = NONCE + BATCH_SIZE;
    pub const OWNER_Y: usize = OWNER_X + BATCH_SIZE;
    pub const SIG_R8X: usize = OWNER_Y + BATCH_SIZE;
    pub const SIG_R8Y: usize = SIG_R8X + BATCH_SIZE;
    pub const SIG_S: usize = SIG_R8Y + BATCH_SIZE;

    /// Total vector length
    pub const LEN: usize = SIG_S + BATCH_SIZE;
}

/// Why a used slot could not be turned back into a request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotDecodeError {
    #[error("asset id is not a trie key")]
    AssetId,

    #[error("nonce does not fit in 64 bits")]
    Nonce,

    #[error("invalid owner key: {0}")]
    OwnerKey(KeyError),

    #[error("invalid signature: {0}")]
    Signature(KeyError),
}

/// The eight per-slot fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotFields {
    pub target: Fr,
    pub asset_id: Fr,
    pub nonce: Fr,
    pub owner_x: Fr,
    pub owner_y: Fr,
    pub sig_r8x: Fr,
    pub sig_r8y: Fr,
    pub sig_s: Fr,
}

impl SlotFields {
    fn from_request(req: &TransferRequest) -> Self {
        let [sig_r8x, sig_r8y, sig_s] = req.signature().to_fields();
        Self {
            target: req.target().to_field(),
            asset_id: req.asset_id().to_field(),
            nonce: Fr::from(req.nonce()),
            owner_x: req.owner().x(),
            owner_y: req.owner().y(),
            sig_r8x,
            sig_r8y,
            sig_s,
        }
    }

    fn as_array(&self) -> [Fr; 8] {
        [
            self.target,
            self.asset_id,
            self.nonce,
            self.owner_x,
            self.owner_y,
            self.sig_r8x,
            self.sig_r8y,
            self.sig_s,
        ]
    }

    pub fn is_padding(&self) -> bool {
        self.target.is_zero()
    }

    pub fn is_all_zero(&self) -> bool {
        self.as_array().iter().all(Zero::is_zero)
    }

    pub fn asset(&self) -> Result<AssetId, SlotDecodeError> {
        match fr_to_u64(&self.asset_id) {
            Some(id) if id < TRIE_CAPACITY => Ok(AssetId(id)),
            _ => Err(SlotDecodeError::AssetId),
        }
    }

    pub fn nonce_u64(&self) -> Result<u64, SlotDecodeError> {
        fr_to_u64(&self.nonce).ok_or(SlotDecodeError::Nonce)
    }

    /// Rebuild the signed request carried in this slot
    pub fn decode(&self) -> Result<TransferRequest, SlotDecodeError> {
        let owner = PublicKey::from_coordinates(self.owner_x, self.owner_y)
            .map_err(SlotDecodeError::OwnerKey)?;
        let signature = Signature::from_fields(self.sig_r8x, self.sig_r8y, self.sig_s)
            .map_err(SlotDecodeError::Signature)?;
        Ok(TransferRequest::from_parts(
            owner,
            Address::from_field(self.target),
            self.asset()?,
            self.nonce_u64()?,
            signature,
        ))
    }
}

/// A public-input vector of exactly `offsets::LEN` fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicInputs(Vec<Fr>);

impl PublicInputs {
    /// Lay out a batch. Slots past `requests.len()` are zero.
    pub fn encode(
        old: RollupRoots,
        new: RollupRoots,
        requests: &[TransferRequest],
    ) -> Result<Self, BatchConsistencyError> {
        if requests.len() > BATCH_SIZE {
            return Err(BatchConsistencyError::TooLarge {
                len: requests.len(),
                limit: BATCH_SIZE,
            });
        }

        let mut fields = vec![Fr::zero(); offsets::LEN];
        fields[offsets::OLD_OWNERSHIP_ROOT] = old.ownership_root;
        fields[offsets::NEW_OWNERSHIP_ROOT] = new.ownership_root;
        fields[offsets::OLD_NONCE_ROOT] = old.nonce_root;
        fields[offsets::NEW_NONCE_ROOT] = new.nonce_root;

        for (i, req) in requests.iter().enumerate() {
            let slot = SlotFields::from_request(req);
            fields[offsets::TARGET + i] = slot.target;
            fields[offsets::ASSET_ID + i] = slot.asset_id;
            fields[offsets::NONCE + i] = slot.nonce;
            fields[offsets::OWNER_X + i] = slot.owner_x;
            fields[offsets::OWNER_Y + i] = slot.owner_y;
            fields[offsets::SIG_R8X + i] = slot.sig_r8x;
            fields[offsets::SIG_R8Y + i] = slot.sig_r8y;
            fields[offsets::SIG_S + i] = slot.sig_s;
        }

        Ok(Self(fields))
    }

    /// Wrap a raw vector, checking only its length
    pub fn from_fields(fields: Vec<Fr>) -> Result<Self, OnChainRejection> {
        if fields.len() != offsets::LEN {
            return Err(OnChainRejection::MalformedInputs {
                expected: offsets::LEN,
                got: fields.len(),
            });
        }
        Ok(Self(fields))
    }

    pub fn as_fields(&self) -> &[Fr] {
        &self.0
    }

    pub fn into_fields(self) -> Vec<Fr> {
        self.0
    }

    pub fn old_roots(&self) -> RollupRoots {
        RollupRoots {
            ownership_root: self.0[offsets::OLD_OWNERSHIP_ROOT],
            nonce_root: self.0[offsets::OLD_NONCE_ROOT],
        }
    }

    pub fn new_roots(&self) -> RollupRoots {
        RollupRoots {
            ownership_root: self.0[offsets::NEW_OWNERSHIP_ROOT],
            nonce_root: self.0[offsets::NEW_NONCE_ROOT],
        }
    }

    /// Fields of slot `i`
    ///
    /// # Panics
    /// If `i >= BATCH_SIZE`.
    pub fn slot(&self, i: usize) -> SlotFields {
        assert!(i < BATCH_SIZE, "slot {i} out of range");
        SlotFields {
            target: self.0[offsets::TARGET + i],
            asset_id: self.0[offsets::ASSET_ID + i],
            nonce: self.0[offsets::NONCE + i],
            owner_x: self.0[offsets::OWNER_X + i],
            owner_y: self.0[offsets::OWNER_Y + i],
            sig_r8x: self.0[offsets::SIG_R8X + i],
            sig_r8y: self.0[offsets::SIG_R8Y + i],
            sig_s: self.0[offsets::SIG_S + i],
        }
    }

    pub fn slots(&self) -> impl Iterator<Item = SlotFields> + '_ {
        (0..BATCH_SIZE).map(|i| self.slot(i))
    }

    /// Leading run of used slots
    pub fn used_slots(&self) -> impl Iterator<Item = SlotFields> + '_ {
        self.slots().take_while(|s| !s.is_padding())
    }

    pub fn used_count(&self) -> usize {
        self.used_slots().count()
    }
}

impl Serialize for PublicInputs {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        serde_fr_vec::serialize(&self.0, s)
    }
}

impl<'de> Deserialize<'de> for PublicInputs {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let fields = serde_fr_vec::deserialize(d)?;
        Self::from_fields(fields).map_err(D::Error::custom)
    }
}
