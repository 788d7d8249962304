//! Rollup Primitives
//!
//! Protocol-wide constants and the field/hash layer shared by every component
//! that must agree bit-for-bit with the batch circuit.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  constants   TRIE_DEPTH, BATCH_SIZE (fixed at circuit build)  │
//! │  field       BLS12-381 Fr <-> bytes / hex / u64               │
//! │  poseidon    sponge hash used in and out of the circuit       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod constants;
pub mod field;
pub mod poseidon;

pub use constants::{BATCH_SIZE, TRIE_CAPACITY, TRIE_DEPTH};
pub use field::{
    FieldError, Fr, fr_from_bytes, fr_from_hex, fr_to_bytes, fr_to_hex, fr_to_u64, serde_fr,
    serde_fr_vec,
};
pub use poseidon::{poseidon_config, poseidon_hash};
