//! Sequencer Pipeline
//!
//! Queues validated requests, seals them into batches, proves and submits
//! them to the ledger.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         Sequencer Pipeline                           │
//! │                                                                      │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌───────────────┐  │
//! │  │  submit  │──▶│  seal    │──▶│ prove        │──▶│ ledger        │  │
//! │  │ validate │   │ assemble │   │ blocking pool│   │ update_state  │  │
//! │  │ + queue  │   │ (scratch)│   │ + timeout    │   │ (CAS + verify)│  │
//! │  └──────────┘   └──────────┘   └──────────────┘   └───────┬───────┘  │
//! │                                                   accepted│rejected  │
//! │                                          adopt post-state │ stale    │
//! │                                                           ▼ root     │
//! │                                               resync from unseen     │
//! │                                               events, drop batch     │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Local state only moves forward when the ledger accepts a batch or when
//! replaying ledger events. No lock is held while proving.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rollup_config::RollupConfig;
use rollup_primitives::BATCH_SIZE;
use rollup_transaction::TransferRequest;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{
    AuthorizationError, BatchConsistencyError, PipelineError, ProofGenerationError,
    ReconstructionMismatch,
};
use crate::sequencer::execution::{BatchAssembler, TransferAuthorizer};
use crate::sequencer::reconstruct::StateReconstructor;
use crate::sequencer::settlement::ledger::{RollupLedger, RootChanged};
use crate::sequencer::settlement::prover::{BatchWitness, Proof, ProofOracle};
use crate::sequencer::storage::{AssetState, RollupRoots};

// ============================================================================
// Configuration
// ============================================================================

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Seal once this many requests are queued
    pub max_batch_requests: usize,
    /// Seal a non-empty queue once its oldest request is this old
    pub max_batch_age: Duration,
    /// Give up on a proof after this long
    pub prover_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch_requests: BATCH_SIZE,
            max_batch_age: Duration::from_secs(2),
            prover_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&RollupConfig> for PipelineConfig {
    fn from(config: &RollupConfig) -> Self {
        Self {
            max_batch_requests: config.batch.max_requests,
            max_batch_age: config.max_batch_age(),
            prover_timeout: config.prover_timeout(),
        }
    }
}

/// Statistics about the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub pending_requests: usize,
    pub batches_committed: u64,
    pub batches_failed: u64,
    pub requests_committed: u64,
    pub resyncs: u64,
    /// Ledger events reflected in local state
    pub applied_events: u64,
}

/// A batch the ledger accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReceipt {
    pub batch_id: u64,
    pub event_index: u64,
    pub requests: usize,
    pub roots: RollupRoots,
}

// ============================================================================
// Sequencer
// ============================================================================

pub struct Sequencer {
    config: PipelineConfig,
    state: AssetState,
    applied_events: u64,
    pending: Vec<TransferRequest>,
    pending_since: Option<Instant>,
    assembler: BatchAssembler,
    prover: Arc<dyn ProofOracle>,
    ledger: Arc<Mutex<RollupLedger>>,
    next_batch_id: u64,
    stats: PipelineStats,
}

impl Sequencer {
    /// `state` must match the ledger's genesis roots; any events already on
    /// the ledger are picked up on the first stale-root rejection.
    pub fn new(
        state: AssetState,
        prover: Arc<dyn ProofOracle>,
        ledger: Arc<Mutex<RollupLedger>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            assembler: BatchAssembler::with_max_requests(config.max_batch_requests),
            config,
            state,
            applied_events: 0,
            pending: Vec::new(),
            pending_since: None,
            prover,
            ledger,
            next_batch_id: 1,
            stats: PipelineStats::default(),
        }
    }

    /// Validate a request against local state and queue it.
    ///
    /// Returns `true` once the queue is full and should be sealed.
    pub fn submit(&mut self, request: TransferRequest) -> Result<bool, PipelineError> {
        let asset_id = request.asset_id();
        if self.pending.iter().any(|r| r.asset_id() == asset_id) {
            return Err(AuthorizationError::AssetPending { asset_id }.into());
        }
        let limit = self.assembler.max_requests();
        if self.pending.len() >= limit {
            return Err(BatchConsistencyError::TooLarge {
                len: self.pending.len() + 1,
                limit,
            }
            .into());
        }
        TransferAuthorizer::validate_state(&request, &self.state)?;

        self.pending.push(request);
        self.pending_since.get_or_insert_with(Instant::now);
        Ok(self.pending.len() >= limit)
    }

    /// Full queue, or a non-empty queue past its age limit
    pub fn should_seal(&self) -> bool {
        if self.pending.len() >= self.assembler.max_requests() {
            return true;
        }
        match self.pending_since {
            Some(since) => since.elapsed() >= self.config.max_batch_age,
            None => false,
        }
    }

    /// Seal the queue into a batch, prove it and submit it.
    ///
    /// The queued requests are consumed whatever the outcome. `Ok(None)` when
    /// the queue is empty.
    pub async fn seal_and_submit(&mut self) -> Result<Option<BatchReceipt>, PipelineError> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let requests = std::mem::take(&mut self.pending);
        self.pending_since = None;
        let batch_id = self.next_batch_id;
        self.next_batch_id += 1;
        let count = requests.len();

        let assembled = match self.assembler.assemble(&self.state, requests) {
            Ok(assembled) => assembled,
            Err(e) => {
                error!(batch_id, error = %e, "Batch assembly failed");
                self.stats.batches_failed += 1;
                return Err(e.into());
            }
        };

        info!(batch_id, requests = count, "Starting proof generation");
        let started = Instant::now();
        let proof = match self.prove(assembled.witness.clone()).await {
            Ok(proof) => proof,
            Err(e) => {
                error!(batch_id, error = %e, "Proof generation failed");
                self.stats.batches_failed += 1;
                return Err(e.into());
            }
        };
        info!(
            batch_id,
            proving_time_ms = started.elapsed().as_millis() as u64,
            "Proof generated"
        );

        let mut ledger = self.ledger.lock().await;
        let outcome = ledger
            .update_state(&proof, assembled.witness.public_inputs.as_fields())
            .map(|event| event.index);
        match outcome {
            Ok(event_index) => {
                drop(ledger);

                self.state = assembled.post_state;
                self.applied_events = event_index + 1;
                self.stats.batches_committed += 1;
                self.stats.requests_committed += count as u64;

                info!(batch_id, event_index, requests = count, "Batch committed");
                Ok(Some(BatchReceipt {
                    batch_id,
                    event_index,
                    requests: count,
                    roots: self.state.roots(),
                }))
            }
            Err(rejection) => {
                self.stats.batches_failed += 1;
                if rejection.is_stale_root() {
                    let unseen = ledger.events_since(self.applied_events).to_vec();
                    drop(ledger);
                    warn!(
                        batch_id,
                        unseen = unseen.len(),
                        "Ledger moved on, resyncing and dropping batch"
                    );
                    self.resync(&unseen)?;
                } else {
                    error!(batch_id, error = %rejection, "Ledger rejected batch");
                }
                Err(rejection.into())
            }
        }
    }

    /// Run the oracle on the blocking pool, bounded by the prover timeout
    async fn prove(&self, witness: BatchWitness) -> Result<Proof, ProofGenerationError> {
        let prover = self.prover.clone();
        let task = tokio::task::spawn_blocking(move || prover.prove(&witness));
        match tokio::time::timeout(self.config.prover_timeout, task).await {
            Err(_) => Err(ProofGenerationError::Timeout(self.config.prover_timeout)),
            Ok(Err(join)) => Err(ProofGenerationError::Backend(format!(
                "prover task failed: {join}"
            ))),
            Ok(Ok(result)) => result,
        }
    }

    /// Bring local state up to date with ledger events it has not seen
    fn resync(&mut self, events: &[RootChanged]) -> Result<(), ReconstructionMismatch> {
        let mut reconstructor =
            StateReconstructor::resume(self.state.clone(), self.applied_events);
        reconstructor.replay(events)?;
        self.applied_events = reconstructor.next_index();
        self.state = reconstructor.into_state();
        self.stats.resyncs += 1;
        Ok(())
    }

    async fn seal_logged(&mut self) {
        if let Err(e) = self.seal_and_submit().await {
            warn!(error = %e, "Automatic seal failed");
        }
    }

    pub fn state(&self) -> &AssetState {
        &self.state
    }

    pub fn roots(&self) -> RollupRoots {
        self.state.roots()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn ledger(&self) -> Arc<Mutex<RollupLedger>> {
        self.ledger.clone()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            pending_requests: self.pending.len(),
            applied_events: self.applied_events,
            ..self.stats.clone()
        }
    }
}

// ============================================================================
// Async Sequencer Service
// ============================================================================

/// Messages for the sequencer service
pub enum SequencerCommand {
    /// Queue a request
    Submit(TransferRequest, oneshot::Sender<Result<(), PipelineError>>),
    /// Seal and submit whatever is queued
    Seal(oneshot::Sender<Result<Option<BatchReceipt>, PipelineError>>),
    /// Local roots
    Roots(oneshot::Sender<RollupRoots>),
    /// Get statistics
    Stats(oneshot::Sender<PipelineStats>),
    /// Shutdown
    Shutdown,
}

/// Runs a `Sequencer` on its own task. Seals when the queue fills and on a
/// periodic age check.
pub struct SequencerService {
    command_tx: mpsc::Sender<SequencerCommand>,
    handle: JoinHandle<Sequencer>,
}

impl SequencerService {
    /// Start the service loop
    pub fn start(mut sequencer: Sequencer) -> Self {
        let (command_tx, mut command_rx) = mpsc::channel::<SequencerCommand>(1000);
        let tick = (sequencer.config.max_batch_age / 2).max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut age_check = tokio::time::interval(tick);

            loop {
                tokio::select! {
                    cmd = command_rx.recv() => {
                        match cmd {
                            Some(SequencerCommand::Submit(request, reply)) => {
                                let result = sequencer.submit(request);
                                let full = matches!(result, Ok(true));
                                let _ = reply.send(result.map(|_| ()));
                                if full {
                                    sequencer.seal_logged().await;
                                }
                            }
                            Some(SequencerCommand::Seal(reply)) => {
                                let result = sequencer.seal_and_submit().await;
                                let _ = reply.send(result);
                            }
                            Some(SequencerCommand::Roots(reply)) => {
                                let _ = reply.send(sequencer.roots());
                            }
                            Some(SequencerCommand::Stats(reply)) => {
                                let _ = reply.send(sequencer.stats());
                            }
                            Some(SequencerCommand::Shutdown) | None => break,
                        }
                    }
                    _ = age_check.tick() => {
                        if sequencer.should_seal() {
                            sequencer.seal_logged().await;
                        }
                    }
                }
            }

            sequencer
        });

        Self { command_tx, handle }
    }

    /// Queue a request
    pub async fn submit(&self, request: TransferRequest) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(SequencerCommand::Submit(request, reply_tx))
            .await
            .context("sequencer service unavailable")?;
        Ok(reply_rx.await.context("sequencer service crashed")??)
    }

    /// Force seal the current queue
    pub async fn seal(&self) -> Result<Option<BatchReceipt>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(SequencerCommand::Seal(reply_tx))
            .await
            .context("sequencer service unavailable")?;
        Ok(reply_rx.await.context("sequencer service crashed")??)
    }

    /// Local roots, after every command sent before this one
    pub async fn roots(&self) -> Result<RollupRoots> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(SequencerCommand::Roots(reply_tx))
            .await
            .context("sequencer service unavailable")?;
        reply_rx.await.context("sequencer service crashed")
    }

    /// Get statistics
    pub async fn stats(&self) -> Result<PipelineStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(SequencerCommand::Stats(reply_tx))
            .await
            .context("sequencer service unavailable")?;
        reply_rx.await.context("sequencer service crashed")
    }

    /// Stop the loop and hand back the sequencer
    pub async fn shutdown(self) -> Result<Sequencer> {
        self.command_tx
            .send(SequencerCommand::Shutdown)
            .await
            .context("sequencer service unavailable")?;
        self.handle.await.context("sequencer service panicked")
    }
}
