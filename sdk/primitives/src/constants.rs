//! Protocol parameters.
//!
//! Both values are baked into the batch circuit. Changing either one changes the
//! public-input layout and the Merkle path length, and requires a coordinated
//! protocol version bump on the ledger side.

/// Depth of the ownership and nonce tries.
pub const TRIE_DEPTH: usize = 10;

/// Number of addressable asset slots (2^TRIE_DEPTH).
pub const TRIE_CAPACITY: u64 = 1 << TRIE_DEPTH;

/// Transfer slots per batch proof.
pub const BATCH_SIZE: usize = 8;
