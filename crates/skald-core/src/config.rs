//! Process-wide configuration.
//!
//! One immutable struct, loaded once and passed into each component
//! constructor. Nothing in the pipeline reads ambient state.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::Urgency;

/// Per-recipient persona wiring: which role/team templates apply and any
/// explicit overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipientConfig {
    pub user: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub team: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<PersonaOverrides>,
}

/// Explicit per-user persona overrides. A present field replaces the
/// resolved template value outright, it is not merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boosts: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_team_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_severity_for_main: Option<Urgency>,
}

/// Main configuration, stored in `.skald/config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkaldConfig {
    /// Team name → channel ID to monitor.
    pub channels: BTreeMap<String, String>,
    /// Channel the org-wide digest is posted to.
    pub digest_channel: String,
    /// Users receiving leadership DMs for cross-team alerts.
    pub leadership_users: Vec<String>,
    /// Digest recipients and their persona wiring.
    pub recipients: Vec<RecipientConfig>,
    /// Lookback window when no prior run watermark exists.
    pub lookback_hours: u64,
    /// Timeout applied to each collaborator call.
    pub extract_timeout_secs: u64,
    /// Dependencies below this confidence are dropped.
    pub confidence_floor: f64,
    /// Dependencies above this confidence become alerts.
    pub alert_threshold: f64,
    /// Additive bonus applied when a persona topic matches item text.
    pub topic_bonus: f64,
    /// Confidence delta contributed by a single net feedback vote.
    pub adjustment_step: f64,
    /// Team name → aliases used when matching team references in text.
    pub team_aliases: BTreeMap<String, Vec<String>>,
}

impl Default for SkaldConfig {
    fn default() -> Self {
        SkaldConfig {
            channels: BTreeMap::new(),
            digest_channel: String::new(),
            leadership_users: Vec::new(),
            recipients: Vec::new(),
            lookback_hours: 24,
            extract_timeout_secs: 60,
            confidence_floor: 0.35,
            alert_threshold: 0.70,
            topic_bonus: 0.25,
            adjustment_step: 0.05,
            team_aliases: default_team_aliases(),
        }
    }
}

/// Built-in aliases for the stock hardware-project teams. Deployments with
/// other team names supply their own table in config.
pub fn default_team_aliases() -> BTreeMap<String, Vec<String>> {
    let mut aliases = BTreeMap::new();
    aliases.insert(
        "mechanical".to_string(),
        ["mechanical", "mech", "cnc", "fab"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    aliases.insert(
        "electrical".to_string(),
        ["electrical", "ee", "pcb", "power"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    aliases.insert(
        "software".to_string(),
        ["software", "sw", "firmware", "api"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    aliases
}

impl SkaldConfig {
    /// Load from a config file. Missing file → defaults; malformed file is
    /// an error (a wrong config should not silently become the default).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(anyhow::anyhow!("cannot read {}: {e}", path.display())),
        };
        let config: SkaldConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("malformed config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Aliases for a team, falling back to the team name itself.
    pub fn aliases_for(&self, team: &str) -> Vec<String> {
        match self.team_aliases.get(team) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => vec![team.to_string()],
        }
    }
}
