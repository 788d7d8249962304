//! Local devnet: one sequencer, an in-process ledger and an observer that
//! rebuilds state from the exported event log.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, ensure};
use log::{info, warn};
use rollup_config::{RollupConfig, global_config};
use rollup_core::sequencer::{
    Genesis, MockProver, PipelineConfig, RollupLedger, Sequencer, SequencerService,
    StateReconstructor, TransferAuthorizer,
};
use rollup_keypair::Account;
use rollup_primitives::fr_to_hex;
use rollup_transaction::AssetId;
use tokio::sync::Mutex;

fn devnet_account(index: usize) -> Account {
    let mut seed = [0u8; 32];
    seed[..8].copy_from_slice(&(index as u64).to_le_bytes());
    Account::from_seed(&seed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    info!("Devnet starting...");

    if RollupConfig::set_global(RollupConfig::load()?).is_err() {
        warn!("Config already initialized, keeping the existing one");
    }
    let config = global_config();
    ensure!(config.genesis.assets >= 1, "devnet needs at least one asset");

    let accounts: Vec<Account> = (0..config.genesis.accounts).map(devnet_account).collect();
    let pick = |i: usize| &accounts[i % accounts.len()];
    for (i, account) in accounts.iter().enumerate() {
        info!("Account {}: {}", i, account.address());
    }

    // Genesis: every asset starts with account 0
    let genesis = Genesis::new().with_assets(config.genesis.assets, pick(0).address());
    let state = genesis.build().context("building genesis state")?;
    let genesis_roots = state.roots();
    info!(
        "Genesis: {} assets, ownership root {}",
        state.asset_count(),
        fr_to_hex(&genesis_roots.ownership_root)
    );

    let prover =
        MockProver::new(&config.prover.setup_seed).with_latency(config.prover_latency());
    let ledger = Arc::new(Mutex::new(RollupLedger::new(
        genesis_roots.ownership_root,
        genesis_roots.nonce_root,
        Arc::new(prover.verifier()),
    )));
    let sequencer = Sequencer::new(
        state,
        Arc::new(prover),
        ledger.clone(),
        PipelineConfig::from(config),
    );
    let service = SequencerService::start(sequencer);

    // Two hops for asset #1
    let first = TransferAuthorizer::build(pick(0), pick(1).address(), AssetId(1), 0);
    service.submit(first).await?;
    let receipt = service.seal().await?.context("first batch was empty")?;
    info!(
        "Batch {} committed as event {}",
        receipt.batch_id, receipt.event_index
    );

    let second = TransferAuthorizer::build(pick(1), pick(2).address(), AssetId(1), 1);
    service.submit(second).await?;
    let receipt = service.seal().await?.context("second batch was empty")?;
    info!(
        "Batch {} committed as event {}",
        receipt.batch_id, receipt.event_index
    );

    let stats = service.stats().await?;
    info!(
        "Committed {} batches ({} transfers), {} failed",
        stats.batches_committed, stats.requests_committed, stats.batches_failed
    );
    let sequencer = service.shutdown().await?;

    // Observer side
    let log_path = config
        .ledger
        .event_log_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("nft-rollup-events.json"));
    ledger.lock().await.export_log(&log_path)?;
    info!("Event log written to {}", log_path.display());

    let observer = StateReconstructor::from_log_file(genesis.build()?, &log_path)?;
    let ledger_roots = ledger.lock().await.roots();
    ensure!(
        observer.roots() == ledger_roots,
        "reconstructed roots diverge from the ledger"
    );
    if sequencer.roots() != ledger_roots {
        warn!("Sequencer roots lag the ledger");
    }

    let owner = observer.state().owner(AssetId(1))?;
    info!(
        "Reconstructed {} events; asset #1 owned by {} at nonce {}",
        observer.next_index(),
        owner,
        observer.state().nonce(AssetId(1))?
    );
    Ok(())
}
