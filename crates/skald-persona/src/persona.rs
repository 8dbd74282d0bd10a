//! Persona templates and resolution.
//!
//! A recipient's effective persona is a pure function of (role, team,
//! overrides): role and team templates are merged, then explicit user
//! overrides replace whole fields. Unknown role or team names fall back to
//! the default templates (IC / general) rather than failing the run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use skald_core::config::PersonaOverrides;
use skald_core::Urgency;

/// Resolved ranking/filtering profile for one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// e.g. `"lead_electrical"`.
    pub name: String,
    /// The persona's own team; items touching other teams get the
    /// cross-team weight.
    pub team: String,
    /// Category label → score multiplier. Missing entries mean 1.0.
    pub boosts: BTreeMap<String, f64>,
    /// Multiplier applied only to items touching teams other than `team`.
    pub cross_team_weight: f64,
    /// Keywords that raise relevance when present in item text.
    pub topics: Vec<String>,
    /// Items below this urgency go to the secondary (thread) list.
    pub min_severity_for_main: Urgency,
}

impl Persona {
    /// Boost multiplier for a category label, defaulting to 1.0.
    pub fn boost(&self, kind_label: &str) -> f64 {
        self.boosts.get(kind_label).copied().unwrap_or(1.0)
    }

    /// First topic keyword found in `text`, case-insensitive.
    pub fn matched_topic(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.topics
            .iter()
            .find(|t| lower.contains(&t.to_lowercase()))
            .map(|t| t.as_str())
    }
}

struct RoleTemplate {
    boosts: &'static [(&'static str, f64)],
    cross_team_weight: f64,
    min_severity_for_main: Urgency,
}

struct TeamTemplate {
    boosts: &'static [(&'static str, f64)],
    topics: &'static [&'static str],
    min_severity_for_main: Urgency,
}

// Role templates. Leads see everything and care about coordination;
// executives only want the severe, decision-shaped items.
const LEAD: RoleTemplate = RoleTemplate {
    boosts: &[
        ("blocker", 1.5),
        ("decision", 1.4),
        ("action_item", 1.2),
        ("update", 0.9),
        ("alert", 1.5),
    ],
    cross_team_weight: 1.4,
    min_severity_for_main: Urgency::Low,
};

const IC: RoleTemplate = RoleTemplate {
    boosts: &[
        ("blocker", 1.3),
        ("decision", 1.1),
        ("action_item", 1.4),
    ],
    cross_team_weight: 1.1,
    min_severity_for_main: Urgency::Medium,
};

const PM: RoleTemplate = RoleTemplate {
    boosts: &[
        ("blocker", 1.2),
        ("decision", 1.5),
        ("action_item", 1.3),
        ("update", 1.1),
        ("alert", 1.3),
    ],
    cross_team_weight: 1.3,
    min_severity_for_main: Urgency::Medium,
};

const EXECUTIVE: RoleTemplate = RoleTemplate {
    boosts: &[
        ("blocker", 1.3),
        ("decision", 1.5),
        ("update", 0.7),
        ("alert", 1.6),
    ],
    cross_team_weight: 1.5,
    min_severity_for_main: Urgency::High,
};

const MECHANICAL: TeamTemplate = TeamTemplate {
    boosts: &[("blocker", 1.2), ("decision", 1.1), ("action_item", 1.1)],
    topics: &[
        "cad", "cnc", "tolerance", "fixture", "dfm", "prototype", "bracket", "housing",
        "aluminum", "vendor", "lead time",
    ],
    min_severity_for_main: Urgency::Medium,
};

const ELECTRICAL: TeamTemplate = TeamTemplate {
    boosts: &[("blocker", 1.3), ("decision", 1.1), ("action_item", 1.1)],
    topics: &[
        "pcb", "schematic", "layout", "bom", "power", "thermal", "firmware", "connector",
        "burn-in", "sequencing",
    ],
    min_severity_for_main: Urgency::Medium,
};

const SOFTWARE: TeamTemplate = TeamTemplate {
    boosts: &[("blocker", 1.2), ("decision", 1.2), ("action_item", 1.1)],
    topics: &[
        "api", "deploy", "release", "staging", "latency", "cache", "integration", "firmware",
        "code review", "endpoint",
    ],
    min_severity_for_main: Urgency::Medium,
};

const GENERAL: TeamTemplate = TeamTemplate {
    boosts: &[],
    topics: &[],
    min_severity_for_main: Urgency::Medium,
};

fn role_template(role: &str) -> (&'static str, &'static RoleTemplate) {
    match role.to_lowercase().as_str() {
        "lead" | "manager" => ("lead", &LEAD),
        "ic" | "engineer" | "developer" => ("ic", &IC),
        "pm" | "product" => ("pm", &PM),
        "executive" | "exec" | "director" => ("executive", &EXECUTIVE),
        other => {
            debug!(role = other, "unknown role, using ic template");
            ("ic", &IC)
        }
    }
}

fn team_template(team: &str) -> (&'static str, &'static TeamTemplate) {
    match team.to_lowercase().as_str() {
        "mechanical" | "mech" => ("mechanical", &MECHANICAL),
        "electrical" | "ee" | "hardware" => ("electrical", &ELECTRICAL),
        "software" | "sw" | "firmware" => ("software", &SOFTWARE),
        other => {
            debug!(team = other, "unknown team, using general template");
            ("general", &GENERAL)
        }
    }
}

/// Resolve the effective persona for (role, team, overrides).
///
/// Merge rules: boosts multiply per category (missing entries count as 1.0),
/// cross-team weight comes from the role template, topic lists union, and
/// the severity floor takes the stricter of the two templates. Overrides
/// replace the corresponding field outright.
pub fn resolve(role: &str, team: &str, overrides: Option<&PersonaOverrides>) -> Persona {
    let (role_name, role_tpl) = role_template(role);
    let (team_name, team_tpl) = team_template(team);

    let mut boosts: BTreeMap<String, f64> = BTreeMap::new();
    for (kind, factor) in role_tpl.boosts {
        boosts.insert(kind.to_string(), *factor);
    }
    for (kind, factor) in team_tpl.boosts {
        let entry = boosts.entry(kind.to_string()).or_insert(1.0);
        *entry *= factor;
    }

    let mut topics: Vec<String> = team_tpl.topics.iter().map(|t| t.to_string()).collect();

    let mut persona = Persona {
        name: format!("{role_name}_{team_name}"),
        team: team_name.to_string(),
        cross_team_weight: role_tpl.cross_team_weight,
        min_severity_for_main: role_tpl
            .min_severity_for_main
            .max(team_tpl.min_severity_for_main),
        boosts,
        topics: Vec::new(),
    };

    if let Some(ov) = overrides {
        if let Some(boosts) = &ov.boosts {
            persona.boosts = boosts.clone();
        }
        if let Some(weight) = ov.cross_team_weight {
            persona.cross_team_weight = weight;
        }
        if let Some(custom) = &ov.topics {
            topics = custom.clone();
        }
        if let Some(min) = ov.min_severity_for_main {
            // an explicit override may relax the floor
            persona.min_severity_for_main = min;
        }
    }
    persona.topics = topics;
    persona
}
