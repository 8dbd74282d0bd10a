//! Persistent memory for decisions and blockers.
//!
//! The store is the only writer of these record sets. Recording is an
//! idempotent upsert: dedup keys are (normalized what-decided, team) for
//! decisions and (normalized issue, owner) for blockers, so a retried run
//! converges to the same state.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use skald_core::{now_rfc3339, parse_rfc3339, BlockerStatus, EventDetail, StructuredEvent, Urgency};
use skald_store::{write_atomic, SkaldPaths};

/// A decision record persisted across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDecision {
    pub id: String,
    pub summary: String,
    pub what_decided: String,
    pub decided_by: String,
    pub team: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub channel: String,
    pub confidence: f64,
    pub first_seen: String,
    pub last_seen: String,
}

/// A blocker record persisted across runs, with resolution tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBlocker {
    pub id: String,
    pub issue: String,
    pub owner: String,
    pub team: String,
    pub severity: Urgency,
    pub status: BlockerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
    #[serde(default)]
    pub channel: String,
    pub confidence: f64,
    pub first_seen: String,
    pub last_seen: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
}

impl StoredBlocker {
    /// Whole days since the blocker was first seen.
    pub fn age_days(&self, now: time::OffsetDateTime) -> i64 {
        match parse_rfc3339(&self.first_seen) {
            Some(first) => (now - first).whole_days(),
            None => 0,
        }
    }
}

/// Counts returned by [`EventStore::record`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    pub new_count: usize,
    pub duplicate_count: usize,
}

/// Decision/blocker memory backed by `decisions.json` and `blockers.json`.
pub struct EventStore {
    paths: SkaldPaths,
    decisions: Vec<StoredDecision>,
    blockers: Vec<StoredBlocker>,
}

impl EventStore {
    /// Open the store, loading existing records. A corrupt record file is
    /// reinitialized empty — the data loss is logged, not hidden.
    pub fn open(paths: &SkaldPaths) -> Self {
        EventStore {
            decisions: load_records(&paths.decisions_json, "decisions"),
            blockers: load_records(&paths.blockers_json, "blockers"),
            paths: paths.clone(),
        }
    }

    /// Upsert decision/blocker events. Duplicates refresh last-seen (and
    /// advance blocker status); other event kinds are ignored here.
    pub fn record(&mut self, events: &[StructuredEvent]) -> anyhow::Result<RecordOutcome> {
        let mut outcome = RecordOutcome::default();
        let now = now_rfc3339();

        for event in events {
            match &event.detail {
                EventDetail::Decision {
                    what_decided,
                    decided_by,
                    context,
                    impact,
                } => {
                    let id = event.item_id();
                    if let Some(existing) = self.decisions.iter_mut().find(|d| d.id == id) {
                        existing.last_seen = now.clone();
                        outcome.duplicate_count += 1;
                    } else {
                        self.decisions.push(StoredDecision {
                            id,
                            summary: event.summary.clone(),
                            what_decided: what_decided.clone(),
                            decided_by: decided_by.clone(),
                            team: event.team().unwrap_or_default().to_string(),
                            context: context.clone(),
                            impact: impact.clone(),
                            channel: event.channel.clone(),
                            confidence: event.confidence,
                            first_seen: now.clone(),
                            last_seen: now.clone(),
                        });
                        outcome.new_count += 1;
                    }
                }
                EventDetail::Blocker {
                    issue,
                    owner,
                    severity,
                    status,
                    blocked_by,
                } => {
                    let id = event.item_id();
                    if let Some(existing) = self.blockers.iter_mut().find(|b| b.id == id) {
                        existing.last_seen = now.clone();
                        if existing.status.can_advance_to(*status) {
                            if *status == BlockerStatus::Resolved
                                && existing.status != BlockerStatus::Resolved
                            {
                                existing.resolved_at = Some(now.clone());
                            }
                            existing.status = *status;
                        } else {
                            warn!(
                                blocker = %id,
                                from = %existing.status,
                                to = %status,
                                "rejecting backward blocker status transition"
                            );
                        }
                        outcome.duplicate_count += 1;
                    } else {
                        self.blockers.push(StoredBlocker {
                            id,
                            issue: issue.clone(),
                            owner: owner.clone(),
                            team: event.team().unwrap_or_default().to_string(),
                            severity: *severity,
                            status: *status,
                            blocked_by: blocked_by.clone(),
                            channel: event.channel.clone(),
                            confidence: event.confidence,
                            first_seen: now.clone(),
                            last_seen: now.clone(),
                            resolved_at: None,
                        });
                        outcome.new_count += 1;
                    }
                }
                _ => {
                    debug!(kind = %event.kind(), "skipping non-persisted event kind");
                }
            }
        }

        self.save()?;
        Ok(outcome)
    }

    /// All unresolved blockers, severity desc then oldest first.
    pub fn active_blockers(&self) -> Vec<StoredBlocker> {
        let mut active: Vec<StoredBlocker> = self
            .blockers
            .iter()
            .filter(|b| b.status != BlockerStatus::Resolved)
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.first_seen.cmp(&b.first_seen))
        });
        active
    }

    /// Decisions seen within the lookback window, newest first.
    pub fn decisions_since(&self, lookback: time::Duration) -> Vec<StoredDecision> {
        let cutoff = time::OffsetDateTime::now_utc() - lookback;
        let mut recent: Vec<StoredDecision> = self
            .decisions
            .iter()
            .filter(|d| matches!(parse_rfc3339(&d.last_seen), Some(ts) if ts >= cutoff))
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        recent
    }

    /// Advance a blocker's status by ID. Returns false if the blocker is
    /// unknown or the transition would move backward.
    pub fn resolve_blocker(&mut self, id: &str, status: BlockerStatus) -> anyhow::Result<bool> {
        let Some(blocker) = self.blockers.iter_mut().find(|b| b.id == id) else {
            return Ok(false);
        };
        if !blocker.status.can_advance_to(status) {
            warn!(
                blocker = %id,
                from = %blocker.status,
                to = %status,
                "rejecting backward blocker status transition"
            );
            return Ok(false);
        }
        if status == BlockerStatus::Resolved && blocker.status != BlockerStatus::Resolved {
            blocker.resolved_at = Some(now_rfc3339());
        }
        blocker.status = status;
        blocker.last_seen = now_rfc3339();
        self.save()?;
        Ok(true)
    }

    pub fn decision_count(&self) -> usize {
        self.decisions.len()
    }

    pub fn blocker_count(&self) -> usize {
        self.blockers.len()
    }

    fn save(&self) -> anyhow::Result<()> {
        write_atomic(
            &self.paths.decisions_json,
            serde_json::to_string_pretty(&self.decisions)?.as_bytes(),
        )?;
        write_atomic(
            &self.paths.blockers_json,
            serde_json::to_string_pretty(&self.blockers)?.as_bytes(),
        )?;
        Ok(())
    }
}

/// Tolerant record-set read: missing file → empty, corrupt file → empty
/// with an error logged (state corruption is acknowledged, not hidden).
fn load_records<T: DeserializeOwned>(path: &Path, store_name: &str) -> Vec<T> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };
    match serde_json::from_str(&content) {
        Ok(records) => records,
        Err(e) => {
            error!(
                store = store_name,
                path = %path.display(),
                "unreadable record set, reinitializing empty: {e}"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skald_core::EventKind;

    fn paths() -> (tempfile::TempDir, SkaldPaths) {
        let tmp = tempfile::tempdir().unwrap();
        let paths = SkaldPaths::discover(tmp.path());
        paths.ensure_layout().unwrap();
        (tmp, paths)
    }

    fn decision(what: &str, team: &str) -> StructuredEvent {
        StructuredEvent {
            summary: what.to_string(),
            confidence: 0.85,
            channel: "C_TEST".to_string(),
            teams: vec![team.to_string()],
            owners: vec![],
            urgency: Urgency::Medium,
            topics: vec![],
            extracted_at: String::new(),
            detail: EventDetail::Decision {
                what_decided: what.to_string(),
                decided_by: "ravi".to_string(),
                context: String::new(),
                impact: String::new(),
            },
        }
    }

    fn blocker(issue: &str, owner: &str, status: BlockerStatus) -> StructuredEvent {
        StructuredEvent {
            summary: issue.to_string(),
            confidence: 0.9,
            channel: "C_TEST".to_string(),
            teams: vec!["software".to_string()],
            owners: vec![owner.to_string()],
            urgency: Urgency::High,
            topics: vec![],
            extracted_at: String::new(),
            detail: EventDetail::Blocker {
                issue: issue.to_string(),
                owner: owner.to_string(),
                severity: Urgency::High,
                status,
                blocked_by: None,
            },
        }
    }

    #[test]
    fn recording_twice_is_idempotent() {
        let (_tmp, paths) = paths();
        let mut store = EventStore::open(&paths);
        let events = vec![
            decision("use sqlite for telemetry", "software"),
            blocker("waiting on schematic", "dana", BlockerStatus::Open),
        ];

        let first = store.record(&events).unwrap();
        assert_eq!(first.new_count, 2);
        assert_eq!(first.duplicate_count, 0);

        let second = store.record(&events).unwrap();
        assert_eq!(second.new_count, 0);
        assert_eq!(second.duplicate_count, 2);
        assert_eq!(store.decision_count(), 1);
        assert_eq!(store.blocker_count(), 1);
    }

    #[test]
    fn dedup_survives_rephrasing_and_reload() {
        let (_tmp, paths) = paths();
        let mut store = EventStore::open(&paths);
        store
            .record(&[decision("Use SQLite for telemetry!", "software")])
            .unwrap();

        // fresh handle, normalized duplicate
        let mut reopened = EventStore::open(&paths);
        let outcome = reopened
            .record(&[decision("use sqlite for telemetry", "software")])
            .unwrap();
        assert_eq!(outcome.duplicate_count, 1);
        assert_eq!(reopened.decision_count(), 1);
    }

    #[test]
    fn blocker_status_never_moves_backward() {
        let (_tmp, paths) = paths();
        let mut store = EventStore::open(&paths);
        store
            .record(&[blocker("fixture jammed", "sam", BlockerStatus::Open)])
            .unwrap();

        store
            .record(&[blocker("fixture jammed", "sam", BlockerStatus::Resolved)])
            .unwrap();
        assert!(store.active_blockers().is_empty());

        // resolved → open arrives as a duplicate and is rejected
        store
            .record(&[blocker("fixture jammed", "sam", BlockerStatus::Open)])
            .unwrap();
        assert!(store.active_blockers().is_empty());
        assert_eq!(store.blocker_count(), 1);
    }

    #[test]
    fn active_blockers_ordered_by_severity_then_age() {
        let (_tmp, paths) = paths();
        let mut store = EventStore::open(&paths);
        let mut low = blocker("minor tooling gap", "kim", BlockerStatus::Open);
        if let EventDetail::Blocker { severity, .. } = &mut low.detail {
            *severity = Urgency::Low;
        }
        store.record(&[low]).unwrap();
        store
            .record(&[blocker("line down", "sam", BlockerStatus::Open)])
            .unwrap();

        let active = store.active_blockers();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].issue, "line down");
        assert_eq!(active[0].severity, Urgency::High);
    }

    #[test]
    fn decisions_since_filters_and_orders() {
        let (_tmp, paths) = paths();
        let mut store = EventStore::open(&paths);
        store.record(&[decision("ship rev c", "electrical")]).unwrap();
        store.record(&[decision("freeze api", "software")]).unwrap();

        let recent = store.decisions_since(time::Duration::hours(1));
        assert_eq!(recent.len(), 2);

        let none = store.decisions_since(time::Duration::seconds(0));
        assert!(none.len() <= 2); // same-instant records may straddle the cutoff
    }

    #[test]
    fn resolve_blocker_by_id() {
        let (_tmp, paths) = paths();
        let mut store = EventStore::open(&paths);
        let event = blocker("waiting on schematic", "dana", BlockerStatus::Open);
        let id = event.item_id();
        store.record(&[event]).unwrap();

        assert!(store.resolve_blocker(&id, BlockerStatus::Mitigated).unwrap());
        assert!(store.resolve_blocker(&id, BlockerStatus::Resolved).unwrap());
        assert!(!store.resolve_blocker(&id, BlockerStatus::Open).unwrap());
        assert!(!store.resolve_blocker("blk_missing", BlockerStatus::Resolved).unwrap());
    }

    #[test]
    fn corrupt_store_reinitializes_empty() {
        let (_tmp, paths) = paths();
        std::fs::write(&paths.blockers_json, "{definitely not json").unwrap();
        let mut store = EventStore::open(&paths);
        assert_eq!(store.blocker_count(), 0);

        // and stays usable
        let outcome = store
            .record(&[blocker("fresh start", "sam", BlockerStatus::Open)])
            .unwrap();
        assert_eq!(outcome.new_count, 1);
    }

    #[test]
    fn updates_are_not_persisted() {
        let (_tmp, paths) = paths();
        let mut store = EventStore::open(&paths);
        let update = StructuredEvent {
            summary: "merged the parser refactor".to_string(),
            confidence: 0.9,
            channel: "C_SW".to_string(),
            teams: vec!["software".to_string()],
            owners: vec![],
            urgency: Urgency::Low,
            topics: vec![],
            extracted_at: String::new(),
            detail: EventDetail::Update {
                what_happened: "merged the parser refactor".to_string(),
                who: "ravi".to_string(),
                category: "progress".to_string(),
            },
        };
        assert_eq!(update.kind(), EventKind::Update);
        let outcome = store.record(&[update]).unwrap();
        assert_eq!(outcome, RecordOutcome::default());
    }
}
