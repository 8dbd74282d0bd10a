//! Assembled digest output handed to the delivery collaborator.

use serde::Serialize;

use crate::collab::DeliveryTarget;
use skald_core::{CrossTeamAlert, TeamAnalysis};
use skald_persona::Ranking;

/// Org-wide digest content posted to the main channel.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GlobalDigest {
    pub date: String,
    pub cross_team_highlights: Vec<String>,
    pub total_events: usize,
    pub alert_count: usize,
    /// Team name → extraction summary line.
    pub team_summaries: Vec<(String, String)>,
}

/// Ranked content for one recipient, routed as a DM.
#[derive(Debug, Clone, Serialize)]
pub struct PersonalizedDigest {
    pub user: String,
    pub persona: String,
    pub target: DeliveryTarget,
    pub ranking: Ranking,
}

/// Complete output of one digest run.
#[derive(Debug, Clone, Serialize)]
pub struct DigestOutput {
    pub run_id: String,
    pub global: GlobalDigest,
    pub personalized: Vec<PersonalizedDigest>,
    pub alerts: Vec<CrossTeamAlert>,
}

impl DigestOutput {
    /// Payload for the main-channel post.
    pub fn global_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "run_id": &self.run_id,
            "digest": &self.global,
            "alerts": &self.alerts,
        })
    }

    /// Payload for one team's thread reply.
    pub fn thread_payload(&self, analysis: &TeamAnalysis) -> serde_json::Value {
        serde_json::json!({
            "run_id": &self.run_id,
            "team": &analysis.team,
            "summary": &analysis.summary,
            "tone": &analysis.tone,
            "events": &analysis.events,
        })
    }

    /// Payload for one leadership DM: the alert list, highest priority first.
    pub fn leadership_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "run_id": &self.run_id,
            "alerts": &self.alerts,
            "highlights": &self.global.cross_team_highlights,
        })
    }

    /// Payload for one recipient's personalized DM.
    pub fn personal_payload(digest: &PersonalizedDigest) -> serde_json::Value {
        serde_json::json!({
            "user": &digest.user,
            "persona": &digest.persona,
            "primary": &digest.ranking.primary,
            "secondary": &digest.ranking.secondary,
        })
    }
}
