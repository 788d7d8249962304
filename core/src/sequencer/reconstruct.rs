//! State Reconstruction
//!
//! Rebuilds the ownership and nonce tries from genesis plus the public
//! `RootChanged` log, without trusting anything but the log itself.
//!
//! For each event, in append order:
//!
//! ```text
//!   local roots == claimed old roots        else OldOwnershipRoot / OldNonceRoot
//!   for each used slot:
//!       decode (target, asset, nonce, owner key)
//!       local owner == Poseidon(owner key)  else OwnerDivergence
//!       local nonce == slot nonce           else NonceDivergence
//!       apply transfer
//!   local roots == claimed new roots        else NewOwnershipRoot / NewNonceRoot
//! ```
//!
//! Any mismatch halts the reconstructor for good.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::error::ReconstructionMismatch;
use crate::sequencer::settlement::ledger::{EventLog, RootChanged};
use crate::sequencer::storage::{AssetState, Genesis, RollupRoots};

pub struct StateReconstructor {
    state: AssetState,
    next_index: u64,
    halted: bool,
}

impl StateReconstructor {
    /// Start from a genesis state, expecting event 0 next
    pub fn new(genesis: AssetState) -> Self {
        Self::resume(genesis, 0)
    }

    pub fn from_genesis(genesis: &Genesis) -> Result<Self, rollup_trie::TrieError> {
        Ok(Self::new(genesis.build()?))
    }

    /// Continue from a state that already reflects events `0..next_index`
    pub fn resume(state: AssetState, next_index: u64) -> Self {
        Self {
            state,
            next_index,
            halted: false,
        }
    }

    /// Replay a log file written by `RollupLedger::export_log`
    pub fn from_log_file(genesis: AssetState, path: &Path) -> Result<Self> {
        let log = EventLog::read_from(path)?;
        let mut reconstructor = Self::new(genesis);
        reconstructor
            .replay_log(&log)
            .with_context(|| format!("Failed to reconstruct from {}", path.display()))?;
        Ok(reconstructor)
    }

    /// Apply one event
    pub fn apply(&mut self, event: &RootChanged) -> Result<(), ReconstructionMismatch> {
        if self.halted {
            return Err(ReconstructionMismatch::Halted);
        }
        match self.try_apply(event) {
            Ok(next) => {
                self.state = next;
                self.next_index += 1;
                Ok(())
            }
            Err(e) => {
                error!(index = event.index, error = %e, "Reconstruction halted");
                self.halted = true;
                Err(e)
            }
        }
    }

    /// Apply events in order, stopping at the first mismatch
    pub fn replay(&mut self, events: &[RootChanged]) -> Result<RollupRoots, ReconstructionMismatch> {
        for event in events {
            self.apply(event)?;
        }
        info!(
            events = events.len(),
            next_index = self.next_index,
            "Replay complete"
        );
        Ok(self.roots())
    }

    /// Replay a full log, checking its genesis roots first
    pub fn replay_log(&mut self, log: &EventLog) -> Result<RollupRoots, ReconstructionMismatch> {
        if self.next_index == 0 && log.genesis != self.state.roots() {
            self.halted = true;
            return Err(ReconstructionMismatch::GenesisRoots);
        }
        let start = usize::try_from(self.next_index)
            .unwrap_or(usize::MAX)
            .min(log.events.len());
        self.replay(&log.events[start..])
    }

    fn try_apply(&self, event: &RootChanged) -> Result<AssetState, ReconstructionMismatch> {
        let index = event.index;
        if index != self.next_index {
            return Err(ReconstructionMismatch::OutOfOrder {
                index,
                expected: self.next_index,
            });
        }

        let inputs = &event.public_inputs;
        let claimed_old = inputs.old_roots();
        let local = self.state.roots();
        if claimed_old.ownership_root != local.ownership_root {
            return Err(ReconstructionMismatch::OldOwnershipRoot { index });
        }
        if claimed_old.nonce_root != local.nonce_root {
            return Err(ReconstructionMismatch::OldNonceRoot { index });
        }

        let mut scratch = self.state.clone();
        for (slot, fields) in inputs.used_slots().enumerate() {
            let request = fields
                .decode()
                .map_err(|source| ReconstructionMismatch::MalformedSlot {
                    index,
                    slot,
                    source,
                })?;
            let asset_id = request.asset_id();
            let trie_err = |source| ReconstructionMismatch::Trie { index, source };

            if scratch.owner(asset_id).map_err(trie_err)? != request.owner_address() {
                return Err(ReconstructionMismatch::OwnerDivergence {
                    index,
                    slot,
                    asset_id,
                });
            }
            let expected = scratch.nonce(asset_id).map_err(trie_err)?;
            if expected != request.nonce() {
                return Err(ReconstructionMismatch::NonceDivergence {
                    index,
                    slot,
                    asset_id,
                    expected,
                    got: request.nonce(),
                });
            }

            scratch
                .apply_transfer(asset_id, request.target(), request.nonce())
                .map_err(trie_err)?;
        }

        let claimed_new = inputs.new_roots();
        let replayed = scratch.roots();
        if claimed_new.ownership_root != replayed.ownership_root {
            return Err(ReconstructionMismatch::NewOwnershipRoot { index });
        }
        if claimed_new.nonce_root != replayed.nonce_root {
            return Err(ReconstructionMismatch::NewNonceRoot { index });
        }

        Ok(scratch)
    }

    pub fn roots(&self) -> RollupRoots {
        self.state.roots()
    }

    pub fn state(&self) -> &AssetState {
        &self.state
    }

    pub fn into_state(self) -> AssetState {
        self.state
    }

    /// Index of the next event to apply
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }
}
