//! Collaborator seams: extraction and delivery.
//!
//! Both are external to the core: extraction turns raw channel text into
//! structured events (opaque, may fail), delivery moves rendered payloads
//! to their targets. Every call is wrapped in a caller-supplied timeout and
//! fails with a typed error instead of hanging the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use skald_core::{SkaldError, StructuredEvent, TeamAnalysis};
use skald_store::write_atomic;

/// Raw input for one team's channel, produced by the (excluded) fetch
/// layer: concatenated message text plus a count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelBatch {
    pub team: String,
    pub channel: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub message_count: usize,
}

/// Extraction collaborator: text in, structured events out.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    async fn analyze(
        &self,
        team: &str,
        channel: &str,
        messages: &str,
        message_count: usize,
    ) -> Result<TeamAnalysis, SkaldError>;
}

/// Run one extraction under a timeout. Expiry becomes a typed
/// `CollaboratorUnavailable`, never a hang.
pub async fn analyze_with_timeout(
    extractor: &dyn Extractor,
    batch: &ChannelBatch,
    timeout: Duration,
) -> Result<TeamAnalysis, SkaldError> {
    match tokio::time::timeout(
        timeout,
        extractor.analyze(&batch.team, &batch.channel, &batch.text, batch.message_count),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(SkaldError::collaborator(
            "extraction",
            format!("timed out after {timeout:?} for team {}", batch.team),
        )),
    }
}

/// Where a rendered digest payload is routed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryTarget {
    MainChannel { channel: String },
    TeamThread { channel: String, team: String },
    Dm { user: String },
}

impl DeliveryTarget {
    /// Stable name for logs and export filenames.
    pub fn name(&self) -> String {
        match self {
            DeliveryTarget::MainChannel { channel } => format!("main-{channel}"),
            DeliveryTarget::TeamThread { team, .. } => format!("thread-{team}"),
            DeliveryTarget::Dm { user } => format!("dm-{user}"),
        }
    }
}

/// Delivery collaborator. Rendering is out of scope; payloads pass through
/// as JSON.
#[async_trait::async_trait]
pub trait Deliverer: Send + Sync {
    async fn deliver(
        &self,
        target: &DeliveryTarget,
        payload: &serde_json::Value,
    ) -> Result<(), SkaldError>;
}

/// Run one delivery under a timeout.
pub async fn deliver_with_timeout(
    deliverer: &dyn Deliverer,
    target: &DeliveryTarget,
    payload: &serde_json::Value,
    timeout: Duration,
) -> Result<(), SkaldError> {
    match tokio::time::timeout(timeout, deliverer.deliver(target, payload)).await {
        Ok(result) => result,
        Err(_) => Err(SkaldError::collaborator(
            "delivery",
            format!("timed out after {timeout:?} for target {}", target.name()),
        )),
    }
}

// ── Built-in implementations ──

/// Per-team fixture data for [`FixtureExtractor`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureTeam {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub events: Vec<StructuredEvent>,
}

/// Extractor backed by a JSON fixture keyed by team name. Stands in for
/// the language-model collaborator in demos and tests; a team absent from
/// the fixture yields an empty analysis.
pub struct FixtureExtractor {
    teams: BTreeMap<String, FixtureTeam>,
}

impl FixtureExtractor {
    /// No fixture data: every team analyzes to empty.
    pub fn empty() -> Self {
        FixtureExtractor {
            teams: BTreeMap::new(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read fixture {}: {e}", path.display()))?;
        let teams: BTreeMap<String, FixtureTeam> = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("malformed fixture {}: {e}", path.display()))?;
        Ok(FixtureExtractor { teams })
    }
}

#[async_trait::async_trait]
impl Extractor for FixtureExtractor {
    async fn analyze(
        &self,
        team: &str,
        channel: &str,
        _messages: &str,
        message_count: usize,
    ) -> Result<TeamAnalysis, SkaldError> {
        let Some(fixture) = self.teams.get(team) else {
            debug!(team, "no fixture entry, returning empty analysis");
            return Ok(TeamAnalysis::empty(team, channel));
        };
        Ok(TeamAnalysis {
            team: team.to_string(),
            channel: channel.to_string(),
            message_count,
            summary: fixture.summary.clone(),
            tone: fixture.tone.clone(),
            events: fixture.events.clone(),
        })
    }
}

/// Deliverer that writes each payload to `<dir>/<target-name>.json`.
/// Used by the CLI as the audit-friendly default transport.
pub struct FileDeliverer {
    dir: PathBuf,
}

impl FileDeliverer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileDeliverer { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl Deliverer for FileDeliverer {
    async fn deliver(
        &self,
        target: &DeliveryTarget,
        payload: &serde_json::Value,
    ) -> Result<(), SkaldError> {
        let path = self.dir.join(format!("{}.json", target.name()));
        let pretty = serde_json::to_string_pretty(payload).map_err(|e| {
            SkaldError::collaborator("delivery", format!("serialize {}: {e}", target.name()))
        })?;
        write_atomic(&path, pretty.as_bytes())
            .map_err(|e| SkaldError::collaborator("delivery", e.to_string()))
    }
}
