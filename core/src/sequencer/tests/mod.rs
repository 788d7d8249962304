//! End-to-end tests across the sequencer, ledger and reconstructor.

mod scenario;

use std::sync::Arc;
use std::time::Duration;

use rollup_keypair::Account;
use tokio::sync::Mutex;

use crate::sequencer::pipeline::{PipelineConfig, Sequencer};
use crate::sequencer::settlement::{MockProver, ProofOracle, RollupLedger};
use crate::sequencer::storage::Genesis;

pub(crate) const SETUP_SEED: &str = "sequencer-tests";

pub(crate) fn account(n: u8) -> Account {
    let mut seed = [0u8; 32];
    seed[0] = n;
    Account::from_seed(&seed)
}

pub(crate) fn test_config() -> PipelineConfig {
    PipelineConfig {
        max_batch_age: Duration::from_secs(60),
        prover_timeout: Duration::from_secs(10),
        ..PipelineConfig::default()
    }
}

/// Fresh ledger anchored at `genesis`, verifying `SETUP_SEED` proofs
pub(crate) fn ledger_for(genesis: &Genesis) -> Arc<Mutex<RollupLedger>> {
    let roots = genesis.build().unwrap().roots();
    let verifier = Arc::new(MockProver::new(SETUP_SEED).verifier());
    Arc::new(Mutex::new(RollupLedger::new(
        roots.ownership_root,
        roots.nonce_root,
        verifier,
    )))
}

pub(crate) fn sequencer_with(
    genesis: &Genesis,
    ledger: Arc<Mutex<RollupLedger>>,
    prover: Arc<dyn ProofOracle>,
    config: PipelineConfig,
) -> Sequencer {
    Sequencer::new(genesis.build().unwrap(), prover, ledger, config)
}

pub(crate) fn sequencer(genesis: &Genesis, ledger: Arc<Mutex<RollupLedger>>) -> Sequencer {
    sequencer_with(
        genesis,
        ledger,
        Arc::new(MockProver::new(SETUP_SEED)),
        test_config(),
    )
}
