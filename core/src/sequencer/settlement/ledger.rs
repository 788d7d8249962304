//! Rollup Ledger
//!
//! The authoritative root store. A transition is accepted only when
//!
//! 1. the vector has the canonical length,
//! 2. its claimed old roots equal the stored roots (compare-and-swap), and
//! 3. the proof verifies against the full vector,
//!
//! and then both roots are overwritten and the vector is appended to the
//! `RootChanged` log in one step. A rejected call changes nothing.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rollup_primitives::Fr;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::OnChainRejection;
use crate::sequencer::settlement::prover::{Proof, Verifier};
use crate::sequencer::settlement::public_inputs::{PublicInputs, offsets};
use crate::sequencer::storage::RollupRoots;

/// One accepted transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootChanged {
    /// Position in the log, starting at 0
    pub index: u64,
    pub public_inputs: PublicInputs,
}

/// Serialized ledger history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    pub genesis: RollupRoots,
    pub events: Vec<RootChanged>,
}

impl EventLog {
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event log: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse event log: {}", path.display()))
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to encode event log")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write event log: {}", path.display()))
    }
}

pub struct RollupLedger {
    genesis: RollupRoots,
    roots: RollupRoots,
    verifier: Arc<dyn Verifier>,
    events: Vec<RootChanged>,
}

impl RollupLedger {
    pub fn new(ownership_root: Fr, nonce_root: Fr, verifier: Arc<dyn Verifier>) -> Self {
        let genesis = RollupRoots {
            ownership_root,
            nonce_root,
        };
        Self {
            genesis,
            roots: genesis,
            verifier,
            events: Vec::new(),
        }
    }

    /// Verify and apply a transition
    pub fn update_state(
        &mut self,
        proof: &Proof,
        public_inputs: &[Fr],
    ) -> Result<&RootChanged, OnChainRejection> {
        if public_inputs.len() != offsets::LEN {
            return Err(OnChainRejection::MalformedInputs {
                expected: offsets::LEN,
                got: public_inputs.len(),
            });
        }
        if public_inputs[offsets::OLD_OWNERSHIP_ROOT] != self.roots.ownership_root {
            warn!("Rejecting transition: stale ownership root");
            return Err(OnChainRejection::StaleOwnershipRoot);
        }
        if public_inputs[offsets::OLD_NONCE_ROOT] != self.roots.nonce_root {
            warn!("Rejecting transition: stale nonce root");
            return Err(OnChainRejection::StaleNonceRoot);
        }
        if !self.verifier.verify_proof(proof, public_inputs) {
            warn!("Rejecting transition: invalid proof");
            return Err(OnChainRejection::InvalidProof);
        }

        let inputs = PublicInputs::from_fields(public_inputs.to_vec())?;
        let index = self.events.len() as u64;
        self.roots = inputs.new_roots();
        self.events.push(RootChanged {
            index,
            public_inputs: inputs,
        });
        info!(index, "Root changed");

        // just pushed
        Ok(&self.events[self.events.len() - 1])
    }

    pub fn get_root(&self) -> Fr {
        self.roots.ownership_root
    }

    pub fn get_nonce_root(&self) -> Fr {
        self.roots.nonce_root
    }

    pub fn roots(&self) -> RollupRoots {
        self.roots
    }

    pub fn genesis_roots(&self) -> RollupRoots {
        self.genesis
    }

    pub fn events(&self) -> &[RootChanged] {
        &self.events
    }

    /// Events with `index >= from`
    pub fn events_since(&self, from: u64) -> &[RootChanged] {
        let start = usize::try_from(from)
            .unwrap_or(usize::MAX)
            .min(self.events.len());
        &self.events[start..]
    }

    pub fn event_log(&self) -> EventLog {
        EventLog {
            genesis: self.genesis,
            events: self.events.clone(),
        }
    }

    /// Write the full history as JSON
    pub fn export_log(&self, path: &Path) -> Result<()> {
        self.event_log().write_to(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::execution::{BatchAssembler, TransferAuthorizer};
    use crate::sequencer::settlement::prover::{MockProver, ProofOracle};
    use crate::sequencer::storage::{AssetState, Genesis};
    use ark_ff::Zero;
    use rollup_keypair::Account;
    use rollup_transaction::{AssetId, TransferRequest};

    struct Fixture {
        alice: Account,
        bob: Account,
        state: AssetState,
        prover: MockProver,
        ledger: RollupLedger,
    }

    fn fixture() -> Fixture {
        let alice = Account::from_seed(&[1u8; 32]);
        let bob = Account::from_seed(&[2u8; 32]);
        let state = Genesis::new()
            .with_assets(5, alice.address())
            .build()
            .unwrap();
        let prover = MockProver::new("ledger-tests");
        let roots = state.roots();
        let ledger = RollupLedger::new(
            roots.ownership_root,
            roots.nonce_root,
            Arc::new(prover.verifier()),
        );
        Fixture {
            alice,
            bob,
            state,
            prover,
            ledger,
        }
    }

    fn prove_transfer(f: &Fixture, state: &AssetState, asset: u64, nonce: u64) -> (Proof, PublicInputs) {
        let req = TransferAuthorizer::build(&f.alice, f.bob.address(), AssetId(asset), nonce);
        let out = BatchAssembler::new().assemble(state, vec![req]).unwrap();
        let proof = f.prover.prove(&out.witness).unwrap();
        (proof, out.witness.public_inputs)
    }

    #[test]
    fn test_accepts_valid_transition() {
        let mut f = fixture();
        let (proof, inputs) = prove_transfer(&f, &f.state, 1, 0);

        let event = f.ledger.update_state(&proof, inputs.as_fields()).unwrap();
        assert_eq!(event.index, 0);
        assert_eq!(event.public_inputs, inputs);
        assert_eq!(f.ledger.get_root(), inputs.new_roots().ownership_root);
        assert_eq!(f.ledger.get_nonce_root(), inputs.new_roots().nonce_root);
        assert_eq!(f.ledger.events().len(), 1);
        assert_eq!(f.ledger.genesis_roots(), f.state.roots());
    }

    #[test]
    fn test_stale_root_reverts() {
        let mut f = fixture();
        let (p1, i1) = prove_transfer(&f, &f.state, 1, 0);
        let (p2, i2) = prove_transfer(&f, &f.state, 2, 0);

        f.ledger.update_state(&p1, i1.as_fields()).unwrap();
        let roots = f.ledger.roots();

        // second batch was built against genesis
        assert_eq!(
            f.ledger.update_state(&p2, i2.as_fields()).unwrap_err(),
            OnChainRejection::StaleOwnershipRoot
        );
        assert_eq!(f.ledger.roots(), roots);
        assert_eq!(f.ledger.events().len(), 1);
    }

    /// Assemble and prove a batch of `requests` against `state`, returning the post-state
    fn prove_batch(
        f: &Fixture,
        state: &AssetState,
        requests: Vec<TransferRequest>,
    ) -> (Proof, PublicInputs, AssetState) {
        let out = BatchAssembler::new().assemble(state, requests).unwrap();
        let proof = f.prover.prove(&out.witness).unwrap();
        (proof, out.witness.public_inputs, out.post_state)
    }

    #[test]
    fn test_stale_nonce_root_reverts_when_ownership_returns() {
        let mut f = fixture();
        // built at genesis, submitted after asset 1 has gone out and come back
        let (stale_proof, stale_inputs) = prove_transfer(&f, &f.state, 2, 0);

        let there = TransferAuthorizer::build(&f.alice, f.bob.address(), AssetId(1), 0);
        let (p1, i1, after_first) = prove_batch(&f, &f.state, vec![there]);
        f.ledger.update_state(&p1, i1.as_fields()).unwrap();

        let back = TransferAuthorizer::build(&f.bob, f.alice.address(), AssetId(1), 1);
        let (p2, i2, _) = prove_batch(&f, &after_first, vec![back]);
        f.ledger.update_state(&p2, i2.as_fields()).unwrap();

        // ownership matches genesis again, nonces do not
        assert_eq!(f.ledger.get_root(), f.state.roots().ownership_root);
        assert_ne!(f.ledger.get_nonce_root(), f.state.roots().nonce_root);
        let roots = f.ledger.roots();

        assert_eq!(
            f.ledger
                .update_state(&stale_proof, stale_inputs.as_fields())
                .unwrap_err(),
            OnChainRejection::StaleNonceRoot
        );
        assert_eq!(f.ledger.roots(), roots);
        assert_eq!(f.ledger.events().len(), 2);
    }

    #[test]
    fn test_invalid_proof_reverts() {
        let mut f = fixture();
        let (mut proof, inputs) = prove_transfer(&f, &f.state, 1, 0);
        proof.c[0] ^= 1;

        assert_eq!(
            f.ledger.update_state(&proof, inputs.as_fields()).unwrap_err(),
            OnChainRejection::InvalidProof
        );
        assert_eq!(f.ledger.roots(), f.state.roots());
        assert!(f.ledger.events().is_empty());
    }

    #[test]
    fn test_proof_for_other_inputs_rejected() {
        let mut f = fixture();
        let (proof, inputs) = prove_transfer(&f, &f.state, 1, 0);
        let mut fields = inputs.into_fields();
        fields[offsets::NEW_OWNERSHIP_ROOT] = Fr::zero();

        assert_eq!(
            f.ledger.update_state(&proof, &fields).unwrap_err(),
            OnChainRejection::InvalidProof
        );
    }

    #[test]
    fn test_malformed_inputs() {
        let mut f = fixture();
        let (proof, inputs) = prove_transfer(&f, &f.state, 1, 0);
        assert_eq!(
            f.ledger
                .update_state(&proof, &inputs.as_fields()[..10])
                .unwrap_err(),
            OnChainRejection::MalformedInputs {
                expected: offsets::LEN,
                got: 10
            }
        );
    }

    #[test]
    fn test_replayed_transition_rejected() {
        let mut f = fixture();
        let (proof, inputs) = prove_transfer(&f, &f.state, 1, 0);
        f.ledger.update_state(&proof, inputs.as_fields()).unwrap();
        assert!(f.ledger.update_state(&proof, inputs.as_fields()).is_err());
        assert_eq!(f.ledger.events().len(), 1);
    }

    #[test]
    fn test_events_since() {
        let mut f = fixture();
        let (p1, i1) = prove_transfer(&f, &f.state, 1, 0);
        f.ledger.update_state(&p1, i1.as_fields()).unwrap();

        let mut next = f.state.clone();
        next.apply_transfer(AssetId(1), f.bob.address(), 0).unwrap();
        let (p2, i2) = prove_transfer(&f, &next, 2, 0);
        f.ledger.update_state(&p2, i2.as_fields()).unwrap();

        assert_eq!(f.ledger.events_since(0).len(), 2);
        assert_eq!(f.ledger.events_since(1)[0].index, 1);
        assert!(f.ledger.events_since(5).is_empty());
    }

    #[test]
    fn test_export_log_round_trip() {
        let mut f = fixture();
        let (proof, inputs) = prove_transfer(&f, &f.state, 1, 0);
        f.ledger.update_state(&proof, inputs.as_fields()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        f.ledger.export_log(&path).unwrap();

        let log = EventLog::read_from(&path).unwrap();
        assert_eq!(log, f.ledger.event_log());
        assert_eq!(log.genesis, f.state.roots());
    }
}
