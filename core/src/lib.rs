pub mod error;
pub mod sequencer;
