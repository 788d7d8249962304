pub mod ledger;
pub mod prover;
pub mod public_inputs;

pub use ledger::{EventLog, RollupLedger, RootChanged};
pub use prover::{
    BatchWitness, MockProver, MockVerifier, Proof, ProofOracle, StepWitness, Verifier,
    check_batch_relation,
};
pub use public_inputs::{PublicInputs, SlotFields};
