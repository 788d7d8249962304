//! Proof Oracle
//!
//! Boundary to the succinct-proof system for batch transitions.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Batch Proof                               │
//! │                                                                  │
//! │  Public Inputs (68 fields, see public_inputs.rs):                │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ • old/new ownership root, old/new nonce root               │ │
//! │  │ • per slot: target, asset, nonce, owner key, signature     │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! │                                                                  │
//! │  Private Witness:                                                │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ • per used slot: ownership path + nonce path (D siblings)  │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Proving is slow and may fail; verification is fast, pure and
//! deterministic. The mock oracle evaluates the batch relation natively and
//! refuses to prove an unsatisfied witness, then emits a keyed commitment to
//! the public inputs shaped like a Groth16 (a, b, c) triple. Its verifier
//! accepts exactly those commitments.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use ark_ff::One;
use rollup_primitives::{BATCH_SIZE, Fr, TRIE_DEPTH, fr_to_bytes};
use rollup_trie::{compute_root, leaf_hash};
use thiserror::Error;
use tracing::debug;

use crate::error::ProofGenerationError;
use crate::sequencer::settlement::public_inputs::{PublicInputs, SlotDecodeError, offsets};

const MOCK_SETUP_CONTEXT: &str = "nft-rollup 2026-01 mock groth16 setup";

// ============================================================================
// Proof Types
// ============================================================================

/// Groth16-shaped proof: G1 (64 bytes), G2 (128 bytes), G1 (64 bytes)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Proof {
    pub a: [u8; 64],
    pub b: [u8; 128],
    pub c: [u8; 64],
}

impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proof")
            .field("a", &hex_prefix(&self.a))
            .field("b", &hex_prefix(&self.b))
            .field("c", &hex_prefix(&self.c))
            .finish()
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes[..4].iter().map(|b| format!("{b:02x}")).collect::<String>() + ".."
}

/// Private paths for one used slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepWitness {
    pub ownership_siblings: [Fr; TRIE_DEPTH],
    pub nonce_siblings: [Fr; TRIE_DEPTH],
}

/// Everything the prover needs for one batch
#[derive(Debug, Clone)]
pub struct BatchWitness {
    pub public_inputs: PublicInputs,
    /// One entry per used slot, in slot order
    pub steps: Vec<StepWitness>,
}

// ============================================================================
// Batch Relation
// ============================================================================

/// A way in which a witness fails the batch relation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelationViolation {
    #[error("batch has no used slots")]
    Empty,

    #[error("slot {slot} is used after a padding slot")]
    PaddingOrder { slot: usize },

    #[error("padding slot {slot} has non-zero fields")]
    DirtyPadding { slot: usize },

    #[error("witness has {got} steps for {expected} used slots")]
    StepCount { expected: usize, got: usize },

    #[error("slot {slot}: {source}")]
    MalformedSlot {
        slot: usize,
        #[source]
        source: SlotDecodeError,
    },

    #[error("slot {slot}: asset already moved earlier in the batch")]
    DuplicateAsset { slot: usize },

    #[error("slot {slot}: signature does not verify")]
    BadSignature { slot: usize },

    #[error("slot {slot}: ownership path does not open the running root")]
    OwnershipPath { slot: usize },

    #[error("slot {slot}: nonce path does not open the running root")]
    NoncePath { slot: usize },

    #[error("final ownership root differs from the claimed new root")]
    NewOwnershipRoot,

    #[error("final nonce root differs from the claimed new root")]
    NewNonceRoot,
}

/// Evaluate the batch relation the circuit enforces.
///
/// No asset may appear in more than one used slot.
/// For each used slot, in order: the signature verifies; the ownership path
/// opens `leaf(asset, owner address)` under the running ownership root and
/// `leaf(asset, target)` gives the next one; the nonce path opens
/// `leaf(asset, nonce)` and `leaf(asset, nonce + 1)` the same way. The final
/// running roots must equal the claimed new roots.
pub fn check_batch_relation(witness: &BatchWitness) -> Result<(), RelationViolation> {
    let inputs = &witness.public_inputs;

    let used = inputs.used_count();
    if used == 0 {
        return Err(RelationViolation::Empty);
    }
    for slot in used..BATCH_SIZE {
        let fields = inputs.slot(slot);
        if !fields.is_padding() {
            return Err(RelationViolation::PaddingOrder { slot });
        }
        if !fields.is_all_zero() {
            return Err(RelationViolation::DirtyPadding { slot });
        }
    }
    if witness.steps.len() != used {
        return Err(RelationViolation::StepCount {
            expected: used,
            got: witness.steps.len(),
        });
    }

    let mut ownership_root = inputs.old_roots().ownership_root;
    let mut nonce_root = inputs.old_roots().nonce_root;

    let requests = inputs
        .used_slots()
        .enumerate()
        .map(|(slot, fields)| {
            fields
                .decode()
                .map_err(|source| RelationViolation::MalformedSlot { slot, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = HashSet::with_capacity(requests.len());
    for (slot, request) in requests.iter().enumerate() {
        if !seen.insert(request.asset_id()) {
            return Err(RelationViolation::DuplicateAsset { slot });
        }
    }

    for (slot, (request, step)) in requests.iter().zip(&witness.steps).enumerate() {
        if !request.verify_signature() {
            return Err(RelationViolation::BadSignature { slot });
        }

        let key = request.asset_id().0;

        let owner_leaf = leaf_hash(key, request.owner_address().to_field());
        if compute_root(key, owner_leaf, &step.ownership_siblings) != ownership_root {
            return Err(RelationViolation::OwnershipPath { slot });
        }
        let target_leaf = leaf_hash(key, request.target().to_field());
        ownership_root = compute_root(key, target_leaf, &step.ownership_siblings);

        let nonce = Fr::from(request.nonce());
        if compute_root(key, leaf_hash(key, nonce), &step.nonce_siblings) != nonce_root {
            return Err(RelationViolation::NoncePath { slot });
        }
        nonce_root = compute_root(key, leaf_hash(key, nonce + Fr::one()), &step.nonce_siblings);
    }

    let claimed = inputs.new_roots();
    if ownership_root != claimed.ownership_root {
        return Err(RelationViolation::NewOwnershipRoot);
    }
    if nonce_root != claimed.nonce_root {
        return Err(RelationViolation::NewNonceRoot);
    }
    Ok(())
}

// ============================================================================
// Oracle Traits
// ============================================================================

/// Proof generation for batch transitions
pub trait ProofOracle: Send + Sync {
    /// Prove a batch. May block for a long time.
    fn prove(&self, witness: &BatchWitness) -> Result<Proof, ProofGenerationError>;
}

/// Proof verification, as run by the ledger
pub trait Verifier: Send + Sync {
    /// Pure and deterministic
    fn verify_proof(&self, proof: &Proof, public_inputs: &[Fr]) -> bool;
}

// ============================================================================
// Mock Oracle
// ============================================================================

fn setup_key(seed: &str) -> [u8; 32] {
    blake3::derive_key(MOCK_SETUP_CONTEXT, seed.as_bytes())
}

fn commit(key: &[u8; 32], public_inputs: &[Fr]) -> Proof {
    let mut hasher = blake3::Hasher::new_keyed(key);
    hasher.update(&(public_inputs.len() as u64).to_le_bytes());
    for f in public_inputs {
        hasher.update(&fr_to_bytes(f));
    }
    let mut out = [0u8; 256];
    hasher.finalize_xof().fill(&mut out);

    let mut proof = Proof {
        a: [0u8; 64],
        b: [0u8; 128],
        c: [0u8; 64],
    };
    proof.a.copy_from_slice(&out[..64]);
    proof.b.copy_from_slice(&out[64..192]);
    proof.c.copy_from_slice(&out[192..]);
    proof
}

/// Mock prover: checks the relation, then commits to the public inputs
pub struct MockProver {
    key: [u8; 32],
    latency: Duration,
}

impl MockProver {
    /// Prover for the setup derived from `seed`
    pub fn new(seed: &str) -> Self {
        Self {
            key: setup_key(seed),
            latency: Duration::ZERO,
        }
    }

    /// Add simulated proving time
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The verifier paired with this prover's setup
    pub fn verifier(&self) -> MockVerifier {
        MockVerifier { key: self.key }
    }
}

impl ProofOracle for MockProver {
    fn prove(&self, witness: &BatchWitness) -> Result<Proof, ProofGenerationError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        check_batch_relation(witness)?;
        debug!(
            used_slots = witness.steps.len(),
            "Batch relation satisfied, emitting proof"
        );
        Ok(commit(&self.key, witness.public_inputs.as_fields()))
    }
}

/// Verifier for `MockProver` proofs
#[derive(Clone)]
pub struct MockVerifier {
    key: [u8; 32],
}

impl MockVerifier {
    pub fn new(seed: &str) -> Self {
        Self {
            key: setup_key(seed),
        }
    }
}

impl Verifier for MockVerifier {
    fn verify_proof(&self, proof: &Proof, public_inputs: &[Fr]) -> bool {
        public_inputs.len() == offsets::LEN && commit(&self.key, public_inputs) == *proof
    }
}
