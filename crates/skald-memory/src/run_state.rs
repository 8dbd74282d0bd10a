//! Last-successful-run watermark and bounded run history.
//!
//! The watermark bounds incremental processing: read at run start, and
//! overwritten atomically only after the full pipeline succeeds. An aborted
//! run leaves it untouched, so the next run re-covers the same window.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::error;

use skald_core::parse_rfc3339;
use skald_store::{write_atomic, SkaldPaths};

/// Runs kept in history.
const HISTORY_LIMIT: usize = 30;

/// Record of a single digest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub timestamp: String,
    pub channels: Vec<String>,
    #[serde(default)]
    pub message_counts: BTreeMap<String, usize>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Persisted run state: watermark plus recent history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<String>,
    #[serde(default)]
    pub processed_channels: Vec<String>,
    #[serde(default)]
    pub history: Vec<RunRecord>,
}

impl RunState {
    /// Timestamp of the last successful run, if parseable.
    pub fn last_run_at(&self) -> Option<time::OffsetDateTime> {
        self.last_run.as_deref().and_then(parse_rfc3339)
    }

    /// Start of the processing window: the watermark, or now minus the
    /// configured lookback when no prior run exists.
    pub fn window_start(&self, lookback_hours: u64) -> time::OffsetDateTime {
        self.last_run_at().unwrap_or_else(|| {
            time::OffsetDateTime::now_utc() - time::Duration::hours(lookback_hours as i64)
        })
    }
}

/// Reads and commits `run_state.json`.
pub struct RunStateStore {
    paths: SkaldPaths,
}

impl RunStateStore {
    pub fn new(paths: &SkaldPaths) -> Self {
        RunStateStore {
            paths: paths.clone(),
        }
    }

    /// Load current state. Absent file means "no prior run"; a corrupt file
    /// is reinitialized with the loss logged.
    pub fn load(&self) -> RunState {
        let content = match std::fs::read_to_string(&self.paths.run_state_json) {
            Ok(c) => c,
            Err(_) => return RunState::default(),
        };
        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                error!(
                    path = %self.paths.run_state_json.display(),
                    "unreadable run state, reinitializing: {e}"
                );
                RunState::default()
            }
        }
    }

    /// Append a run record and, if it succeeded, advance the watermark.
    /// The whole state file is replaced atomically.
    pub fn commit(&self, run: RunRecord) -> anyhow::Result<RunState> {
        let mut state = self.load();
        if run.success {
            state.last_run = Some(run.timestamp.clone());
            state.processed_channels = run.channels.clone();
        }
        state.history.push(run);
        if state.history.len() > HISTORY_LIMIT {
            let drop = state.history.len() - HISTORY_LIMIT;
            state.history.drain(..drop);
        }
        write_atomic(
            &self.paths.run_state_json,
            serde_json::to_string_pretty(&state)?.as_bytes(),
        )?;
        Ok(state)
    }
}
