pub mod state;

pub use state::{AssetState, Genesis, RollupRoots, TransferStep};
