use serde::{Deserialize, Serialize};

use crate::canon::normalize_text;
use crate::hash::short_id;

// ── Urgency / severity scale ──

/// Urgency level shared by events, blocker severity, and dependencies.
/// Ordering is Low < Medium < High < Critical.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Numeric scale used as the base of relevance scores.
    pub fn scale(self) -> f64 {
        match self {
            Urgency::Low => 1.0,
            Urgency::Medium => 2.0,
            Urgency::High => 3.0,
            Urgency::Critical => 4.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Blocker status ──

/// Blocker lifecycle. Transitions only move forward: open → mitigated →
/// resolved. A resolved blocker that reopens must arrive as a new record.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BlockerStatus {
    #[default]
    Open,
    Mitigated,
    Resolved,
}

impl BlockerStatus {
    /// Whether moving to `next` is a forward (or no-op) transition.
    pub fn can_advance_to(self, next: BlockerStatus) -> bool {
        next >= self
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BlockerStatus::Open => "open",
            BlockerStatus::Mitigated => "mitigated",
            BlockerStatus::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for BlockerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Structured events ──

/// Event category. One sum type covers every extracted insight; there is no
/// per-category analyzer hierarchy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Update,
    Blocker,
    Decision,
    ActionItem,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Update => "update",
            EventKind::Blocker => "blocker",
            EventKind::Decision => "decision",
            EventKind::ActionItem => "action_item",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific payload of a structured event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDetail {
    Update {
        what_happened: String,
        who: String,
        #[serde(default)]
        category: String,
    },
    Blocker {
        issue: String,
        owner: String,
        #[serde(default)]
        severity: Urgency,
        #[serde(default)]
        status: BlockerStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        blocked_by: Option<String>,
    },
    Decision {
        what_decided: String,
        decided_by: String,
        #[serde(default)]
        context: String,
        #[serde(default)]
        impact: String,
    },
    ActionItem {
        description: String,
        owner: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        due: Option<String>,
        #[serde(default)]
        priority: Urgency,
    },
}

/// A normalized insight extracted from channel messages.
///
/// Immutable once created. Confidence is only ever adjusted by the feedback
/// loop on a subsequent run, never in place during the run that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredEvent {
    pub summary: String,
    pub confidence: f64,
    pub channel: String,
    #[serde(default)]
    pub teams: Vec<String>,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default)]
    pub extracted_at: String,
    #[serde(flatten)]
    pub detail: EventDetail,
}

impl StructuredEvent {
    pub fn kind(&self) -> EventKind {
        match self.detail {
            EventDetail::Update { .. } => EventKind::Update,
            EventDetail::Blocker { .. } => EventKind::Blocker,
            EventDetail::Decision { .. } => EventKind::Decision,
            EventDetail::ActionItem { .. } => EventKind::ActionItem,
        }
    }

    /// First involved team, if any.
    pub fn team(&self) -> Option<&str> {
        self.teams.first().map(|s| s.as_str())
    }

    /// Stable content-derived ID. Doubles as the store dedup key: decisions
    /// key on (what-decided, team), blockers on (issue, owner), so a
    /// re-extracted record lands on the same ID across runs.
    pub fn item_id(&self) -> String {
        let team = self.team().unwrap_or("");
        match &self.detail {
            EventDetail::Decision { what_decided, .. } => {
                short_id("dec", &[&normalize_text(what_decided), team])
            }
            EventDetail::Blocker { issue, owner, .. } => {
                short_id("blk", &[&normalize_text(issue), owner])
            }
            EventDetail::Update { .. } => short_id("upd", &[&normalize_text(&self.summary), team]),
            EventDetail::ActionItem { description, owner, .. } => {
                short_id("act", &[&normalize_text(description), owner])
            }
        }
    }

    /// All free text of the event, for reference and topic matching.
    pub fn text(&self) -> String {
        let mut parts = vec![self.summary.clone()];
        match &self.detail {
            EventDetail::Update { what_happened, .. } => parts.push(what_happened.clone()),
            EventDetail::Blocker {
                issue, blocked_by, ..
            } => {
                parts.push(issue.clone());
                if let Some(b) = blocked_by {
                    parts.push(b.clone());
                }
            }
            EventDetail::Decision {
                what_decided,
                context,
                impact,
                ..
            } => {
                parts.push(what_decided.clone());
                parts.push(context.clone());
                parts.push(impact.clone());
            }
            EventDetail::ActionItem { description, .. } => parts.push(description.clone()),
        }
        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }
}

// ── Cross-team dependencies ──

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    WaitingOn,
    InterfaceChange,
    TimelineImpact,
    ResourceConflict,
}

impl DependencyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyKind::WaitingOn => "waiting_on",
            DependencyKind::InterfaceChange => "interface_change",
            DependencyKind::TimelineImpact => "timeline_impact",
            DependencyKind::ResourceConflict => "resource_conflict",
        }
    }

    /// Human-readable form for titles and highlights.
    pub fn label(self) -> &'static str {
        match self {
            DependencyKind::WaitingOn => "waiting on",
            DependencyKind::InterfaceChange => "interface change",
            DependencyKind::TimelineImpact => "timeline impact",
            DependencyKind::ResourceConflict => "resource conflict",
        }
    }
}

/// A derived cross-team relationship. Recomputed from the current event set
/// each run, never authored or persisted as a long-lived entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub kind: DependencyKind,
    pub from_team: String,
    pub to_team: String,
    pub rationale: String,
    pub recommended_action: String,
    pub suggested_owner: String,
    pub urgency: Urgency,
    pub confidence: f64,
}

impl Dependency {
    /// Dedup key: near-identical matches from multiple source events
    /// collapse onto one dependency.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.from_team,
            self.to_team,
            self.kind.as_str(),
            normalize_text(&self.rationale)
        )
    }

    /// Stable alert ID for feedback association and dedup across runs.
    pub fn alert_id(&self) -> String {
        short_id(
            "alert",
            &[
                &self.from_team,
                &self.to_team,
                self.kind.as_str(),
                &normalize_text(&self.rationale),
            ],
        )
    }
}

/// A dependency promoted for leadership visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossTeamAlert {
    pub alert_id: String,
    pub title: String,
    /// Ranking priority, assigned ascending from 1 after sorting.
    pub priority: u32,
    pub dependency: Dependency,
}

impl CrossTeamAlert {
    pub fn from_dependency(dep: Dependency) -> Self {
        CrossTeamAlert {
            alert_id: dep.alert_id(),
            title: format!(
                "{} ↔ {}: {}",
                dep.from_team,
                dep.to_team,
                dep.rationale
            ),
            priority: 0,
            dependency: dep,
        }
    }
}

// ── Feedback ──

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    Accurate,
    Wrong,
    MissingContext,
    Irrelevant,
}

impl FeedbackCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackCategory::Accurate => "accurate",
            FeedbackCategory::Wrong => "wrong",
            FeedbackCategory::MissingContext => "missing_context",
            FeedbackCategory::Irrelevant => "irrelevant",
        }
    }
}

/// A user's reaction to a delivered digest item. At most one is retained per
/// (item, user) pair; a later reaction replaces the earlier one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub item_id: String,
    pub user: String,
    pub category: FeedbackCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: String,
}

/// Feedback-derived confidence deltas keyed by (category label, team).
///
/// Produced by the feedback loop, read by the linker and ranker. Deltas are
/// added to confidence before scoring, never multiplied, so they cannot
/// flip a score's sign. A missing key means no adjustment.
#[derive(Debug, Clone, Default)]
pub struct AdjustmentTable {
    deltas: std::collections::BTreeMap<(String, String), f64>,
}

impl AdjustmentTable {
    pub fn insert(&mut self, kind: &str, team: &str, delta: f64) {
        self.deltas
            .insert((kind.to_string(), team.to_string()), delta);
    }

    pub fn delta(&self, kind: &str, team: &str) -> f64 {
        self.deltas
            .get(&(kind.to_string(), team.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }
}

// ── Extraction contract ──

/// Result of the extraction collaborator for one team's channel.
///
/// On extraction failure the pipeline substitutes `TeamAnalysis::empty` —
/// a failed team never aborts the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamAnalysis {
    pub team: String,
    pub channel: String,
    pub message_count: usize,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub events: Vec<StructuredEvent>,
}

impl TeamAnalysis {
    /// Zero-event analysis substituted when extraction fails or a channel
    /// has no messages.
    pub fn empty(team: &str, channel: &str) -> Self {
        TeamAnalysis {
            team: team.to_string(),
            channel: channel.to_string(),
            ..Default::default()
        }
    }
}

// ── Digest items ──

/// A candidate digest entry: an extracted event or a promoted alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DigestItem {
    Event(StructuredEvent),
    Alert(CrossTeamAlert),
}

impl DigestItem {
    /// Category label used for persona boosts and feedback adjustment keys.
    pub fn kind_label(&self) -> &'static str {
        match self {
            DigestItem::Event(e) => e.kind().as_str(),
            DigestItem::Alert(_) => "alert",
        }
    }

    pub fn urgency(&self) -> Urgency {
        match self {
            DigestItem::Event(e) => e.urgency,
            DigestItem::Alert(a) => a.dependency.urgency,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            DigestItem::Event(e) => e.confidence,
            DigestItem::Alert(a) => a.dependency.confidence,
        }
    }

    /// Team the item is attributed to for adjustment lookup.
    pub fn team(&self) -> Option<&str> {
        match self {
            DigestItem::Event(e) => e.team(),
            DigestItem::Alert(a) => Some(a.dependency.from_team.as_str()),
        }
    }

    /// Teams the item touches, for cross-team weighting.
    pub fn teams(&self) -> Vec<&str> {
        match self {
            DigestItem::Event(e) => e.teams.iter().map(|s| s.as_str()).collect(),
            DigestItem::Alert(a) => vec![
                a.dependency.from_team.as_str(),
                a.dependency.to_team.as_str(),
            ],
        }
    }

    pub fn item_id(&self) -> String {
        match self {
            DigestItem::Event(e) => e.item_id(),
            DigestItem::Alert(a) => a.alert_id.clone(),
        }
    }

    /// Free text used for topic matching.
    pub fn text(&self) -> String {
        match self {
            DigestItem::Event(e) => e.text(),
            DigestItem::Alert(a) => format!("{} {}", a.title, a.dependency.recommended_action),
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            DigestItem::Event(e) => &e.summary,
            DigestItem::Alert(a) => &a.title,
        }
    }
}
