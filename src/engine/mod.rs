//! Core engine: the fetch → evaluate → persist → notify loop.

pub mod poller;

pub use poller::{board_signature, CycleOutcome, CycleReport, Poller, PollerConfig};
