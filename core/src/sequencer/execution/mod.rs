pub mod authorizer;
pub mod batch;

pub use authorizer::TransferAuthorizer;
pub use batch::{AssembledBatch, Batch, BatchAssembler};
