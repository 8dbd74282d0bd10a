//! Reaction feedback and the closed loop back into ranking.
//!
//! Feedback lives in an append-only JSONL log; the effective state is a
//! replay where the latest reaction per (item, user) wins. Confidence
//! adjustments are recomputed fresh from the full history each run — no
//! incremental state, so the computation is idempotent and safe to redo
//! after a crash. Nothing in here may block digest generation: any failure
//! degrades to "no adjustment".

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use skald_core::config::SkaldConfig;
use skald_core::{AdjustmentTable, FeedbackCategory, FeedbackEvent};
use skald_store::SkaldPaths;

/// Hard bound on any single (kind, team) confidence delta.
const MAX_ADJUSTMENT: f64 = 0.3;

/// Result of [`FeedbackLog::store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// First reaction from this user on this item.
    Stored,
    /// An earlier reaction from the same user was superseded.
    Replaced,
}

/// Digest-item registry entry: where a delivered item came from, so
/// feedback on it can be attributed to a (kind, team) bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRef {
    pub item_id: String,
    pub kind: String,
    pub team: String,
}

/// Missing-context feedback carried through as a qualitative note for
/// prompt tuning. It never moves a confidence delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingContextNote {
    pub item_id: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Feedback log plus the delivered-item registry it aggregates against.
pub struct FeedbackLog {
    paths: SkaldPaths,
    step: f64,
}

impl FeedbackLog {
    pub fn new(paths: &SkaldPaths, config: &SkaldConfig) -> Self {
        FeedbackLog {
            paths: paths.clone(),
            step: config.adjustment_step,
        }
    }

    /// Upsert a reaction keyed by (item, user). A later reaction from the
    /// same user on the same item replaces the earlier one.
    pub fn store(&self, event: FeedbackEvent) -> anyhow::Result<StoreOutcome> {
        if event.item_id.is_empty() || event.user.is_empty() {
            anyhow::bail!("feedback event needs a non-empty item id and user");
        }
        let key = (event.item_id.clone(), event.user.clone());
        let outcome = if self.replay().contains_key(&key) {
            StoreOutcome::Replaced
        } else {
            StoreOutcome::Stored
        };

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.paths.feedback_jsonl)?;
        writeln!(file, "{}", serde_json::to_string(&event)?)?;
        Ok(outcome)
    }

    /// Register delivered digest items so later feedback can be attributed.
    pub fn record_items(&self, items: &[ItemRef]) -> anyhow::Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.paths.items_jsonl)?;
        for item in items {
            writeln!(file, "{}", serde_json::to_string(item)?)?;
        }
        Ok(())
    }

    /// Confidence deltas per (kind, team), recomputed from the full
    /// feedback history: clamp(±0.3, (accurate − wrong − irrelevant) × step).
    /// Missing-context reactions are excluded here and surfaced by
    /// [`FeedbackLog::notes`] instead.
    pub fn adjustments(&self) -> AdjustmentTable {
        let items = self.item_index();
        let mut net: BTreeMap<(String, String), i64> = BTreeMap::new();

        for event in self.replay().into_values() {
            let Some((kind, team)) = items.get(&event.item_id) else {
                debug!(item = %event.item_id, "feedback for unregistered item, skipping");
                continue;
            };
            let vote = match event.category {
                FeedbackCategory::Accurate => 1,
                FeedbackCategory::Wrong | FeedbackCategory::Irrelevant => -1,
                FeedbackCategory::MissingContext => 0,
            };
            if vote != 0 {
                *net.entry((kind.clone(), team.clone())).or_insert(0) += vote;
            }
        }

        let mut table = AdjustmentTable::default();
        for ((kind, team), votes) in net {
            let delta = (votes as f64 * self.step).clamp(-MAX_ADJUSTMENT, MAX_ADJUSTMENT);
            if delta != 0.0 {
                table.insert(&kind, &team, delta);
            }
        }
        table
    }

    /// Latest missing-context reactions, for the prompt-tuning consumer.
    pub fn notes(&self) -> Vec<MissingContextNote> {
        self.replay()
            .into_values()
            .filter(|e| e.category == FeedbackCategory::MissingContext)
            .map(|e| MissingContextNote {
                item_id: e.item_id,
                user: e.user,
                comment: e.comment,
            })
            .collect()
    }

    /// Replay the log: latest reaction per (item, user) wins. Malformed
    /// lines and an unreadable log degrade to fewer (or no) entries.
    fn replay(&self) -> BTreeMap<(String, String), FeedbackEvent> {
        let mut latest = BTreeMap::new();
        let file = match fs::File::open(&self.paths.feedback_jsonl) {
            Ok(f) => f,
            Err(_) => return latest,
        };
        for line in std::io::BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FeedbackEvent>(&line) {
                Ok(event) => {
                    latest.insert((event.item_id.clone(), event.user.clone()), event);
                }
                Err(e) => {
                    warn!("skipping malformed feedback line: {e}");
                }
            }
        }
        latest
    }

    /// item id → (kind, team), last registration wins.
    fn item_index(&self) -> BTreeMap<String, (String, String)> {
        let mut index = BTreeMap::new();
        let file = match fs::File::open(&self.paths.items_jsonl) {
            Ok(f) => f,
            Err(_) => return index,
        };
        for line in std::io::BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ItemRef>(&line) {
                Ok(item) => {
                    index.insert(item.item_id, (item.kind, item.team));
                }
                Err(e) => {
                    warn!("skipping malformed item line: {e}");
                }
            }
        }
        index
    }
}
