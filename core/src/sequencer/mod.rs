pub mod execution;
pub mod pipeline;
pub mod reconstruct;
pub mod settlement;
pub mod storage;

pub use execution::{AssembledBatch, Batch, BatchAssembler, TransferAuthorizer};
pub use pipeline::{
    BatchReceipt, PipelineConfig, PipelineStats, Sequencer, SequencerCommand, SequencerService,
};
pub use reconstruct::StateReconstructor;
pub use settlement::{
    BatchWitness, EventLog, MockProver, MockVerifier, Proof, ProofOracle, PublicInputs,
    RollupLedger, RootChanged, Verifier,
};
pub use storage::{AssetState, Genesis, RollupRoots};

#[cfg(test)]
mod tests;
