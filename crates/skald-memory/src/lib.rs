pub mod event_store;
pub mod run_state;

pub use event_store::{EventStore, RecordOutcome, StoredBlocker, StoredDecision};
pub use run_state::{RunRecord, RunState, RunStateStore};
