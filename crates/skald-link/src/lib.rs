//! Cross-team dependency detection.
//!
//! For every ordered pair of active teams (A, B), A's blockers and action
//! items are scanned for references to B, and A's decisions for stated
//! interface or timeline impact naming B. Matches become `Dependency`
//! candidates; high-confidence or high-urgency candidates are promoted to
//! `CrossTeamAlert`s for leadership routing.
//!
//! The scan is O(teams²) with small per-pair work; expected team counts are
//! in the tens.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::debug;

use skald_core::config::SkaldConfig;
use skald_core::{
    AdjustmentTable, CrossTeamAlert, Dependency, DependencyKind, EventDetail, StructuredEvent,
    Urgency,
};

/// Maximum leadership highlight lines per run.
const HIGHLIGHT_CAP: usize = 5;

/// Confidence multiplier when a reference lacks explicit waiting phrasing.
const IMPLICIT_REFERENCE_FACTOR: f64 = 0.75;

/// Result of one cross-team pass.
#[derive(Debug, Clone, Default)]
pub struct LinkOutcome {
    pub dependencies: Vec<Dependency>,
    pub highlights: Vec<String>,
}

pub struct DependencyLinker {
    aliases: BTreeMap<String, Vec<String>>,
    confidence_floor: f64,
    alert_threshold: f64,
    waiting_re: Regex,
    interface_re: Regex,
    timeline_re: Regex,
    resource_re: Regex,
}

impl DependencyLinker {
    pub fn new(config: &SkaldConfig) -> Self {
        DependencyLinker {
            aliases: config.team_aliases.clone(),
            confidence_floor: config.confidence_floor,
            alert_threshold: config.alert_threshold,
            waiting_re: Regex::new(
                r"(?i)\b(?:waiting (?:on|for)|blocked (?:by|on)|needs? from|depends? on)\b",
            )
            .expect("static regex"),
            interface_re: Regex::new(
                r"(?i)\b(?:interface|api|connector|pinout|schema|protocol|board outline)\b",
            )
            .expect("static regex"),
            timeline_re: Regex::new(
                r"(?i)\b(?:timeline|schedule|deadline|slip(?:ped|s)?|delay(?:ed|s)?|push(?:ed)? out)\b",
            )
            .expect("static regex"),
            resource_re: Regex::new(
                r"(?i)\b(?:shared|same|contend(?:ing)?|competing)\b.{0,40}\b(?:resource|bench|rig|fixture|machine)\b",
            )
            .expect("static regex"),
        }
    }

    /// Detect dependencies between all ordered pairs of active teams.
    ///
    /// A team with no events contributes an empty analysis and can still be
    /// the target of another team's references. Feedback adjustments shift
    /// source-event confidence before the floor is applied. Output order is
    /// deterministic regardless of map insertion order.
    pub fn link(
        &self,
        events_by_team: &BTreeMap<String, Vec<StructuredEvent>>,
        adjustments: &AdjustmentTable,
    ) -> LinkOutcome {
        let team_res: BTreeMap<&str, Regex> = events_by_team
            .keys()
            .map(|team| (team.as_str(), self.team_reference_re(team)))
            .collect();

        let mut by_key: BTreeMap<String, Dependency> = BTreeMap::new();

        for (from_team, events) in events_by_team {
            for (&to_team, to_re) in &team_res {
                if from_team.as_str() == to_team {
                    continue;
                }
                for event in events {
                    let delta =
                        adjustments.delta(event.kind().as_str(), event.team().unwrap_or(from_team));
                    if let Some(candidate) =
                        self.candidate(event, from_team, to_team, to_re, delta)
                    {
                        if candidate.confidence < self.confidence_floor {
                            debug!(
                                from = %candidate.from_team,
                                to = %candidate.to_team,
                                confidence = candidate.confidence,
                                "dropping low-confidence dependency candidate"
                            );
                            continue;
                        }
                        let key = candidate.dedup_key();
                        match by_key.get(&key) {
                            Some(existing) if existing.confidence >= candidate.confidence => {}
                            _ => {
                                by_key.insert(key, candidate);
                            }
                        }
                    }
                }
            }
        }

        let mut dependencies: Vec<Dependency> = by_key.into_values().collect();
        dependencies.sort_by(|a, b| {
            b.urgency
                .cmp(&a.urgency)
                .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.from_team.cmp(&b.from_team))
                .then_with(|| a.to_team.cmp(&b.to_team))
        });

        let mut highlights: Vec<String> = Vec::new();
        for dep in &dependencies {
            let line = format!(
                "{} ↔ {}: {}",
                dep.from_team,
                dep.to_team,
                dep.kind.label()
            );
            if !highlights.contains(&line) {
                highlights.push(line);
            }
            if highlights.len() >= HIGHLIGHT_CAP {
                break;
            }
        }

        LinkOutcome {
            dependencies,
            highlights,
        }
    }

    /// Promote dependencies to leadership alerts: anything above the alert
    /// confidence threshold or at high/critical urgency. Alerts are sorted
    /// urgency desc then confidence desc and numbered from 1.
    pub fn alerts(&self, dependencies: &[Dependency]) -> Vec<CrossTeamAlert> {
        let mut alerts: Vec<CrossTeamAlert> = dependencies
            .iter()
            .filter(|d| d.confidence > self.alert_threshold || d.urgency >= Urgency::High)
            .cloned()
            .map(CrossTeamAlert::from_dependency)
            .collect();
        alerts.sort_by(|a, b| {
            b.dependency
                .urgency
                .cmp(&a.dependency.urgency)
                .then_with(|| {
                    b.dependency
                        .confidence
                        .partial_cmp(&a.dependency.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        for (i, alert) in alerts.iter_mut().enumerate() {
            alert.priority = (i + 1) as u32;
        }
        alerts
    }

    /// One event from `from_team` examined against `to_team`.
    fn candidate(
        &self,
        event: &StructuredEvent,
        from_team: &str,
        to_team: &str,
        to_re: &Regex,
        delta: f64,
    ) -> Option<Dependency> {
        match &event.detail {
            EventDetail::Blocker {
                issue,
                owner,
                blocked_by,
                ..
            } => {
                let text = event.text();
                let named_in_text = to_re.is_match(&text);
                let named_as_owner = blocked_by
                    .as_deref()
                    .map(|b| to_re.is_match(b))
                    .unwrap_or(false)
                    || to_re.is_match(owner);
                if !named_in_text && !named_as_owner {
                    return None;
                }
                let kind = if self.resource_re.is_match(&text) {
                    DependencyKind::ResourceConflict
                } else {
                    DependencyKind::WaitingOn
                };
                let explicit = self.waiting_re.is_match(&text) || named_as_owner;
                Some(self.build(
                    kind,
                    from_team,
                    to_team,
                    issue,
                    event,
                    delta,
                    if explicit { 1.0 } else { IMPLICIT_REFERENCE_FACTOR },
                ))
            }
            EventDetail::ActionItem { description, .. } => {
                let text = event.text();
                if !to_re.is_match(&text) {
                    return None;
                }
                let kind = if self.resource_re.is_match(&text) {
                    DependencyKind::ResourceConflict
                } else {
                    DependencyKind::WaitingOn
                };
                let explicit = self.waiting_re.is_match(&text);
                Some(self.build(
                    kind,
                    from_team,
                    to_team,
                    description,
                    event,
                    delta,
                    if explicit { 1.0 } else { IMPLICIT_REFERENCE_FACTOR },
                ))
            }
            EventDetail::Decision {
                what_decided,
                impact,
                ..
            } => {
                let text = event.text();
                if !to_re.is_match(&text) {
                    return None;
                }
                // A decision merely mentioning another team is not an impact
                // statement; require interface or timeline phrasing.
                let kind = if self.interface_re.is_match(&text) {
                    DependencyKind::InterfaceChange
                } else if self.timeline_re.is_match(&text) {
                    DependencyKind::TimelineImpact
                } else {
                    return None;
                };
                let rationale = if impact.is_empty() { what_decided } else { impact };
                Some(self.build(kind, from_team, to_team, rationale, event, delta, 1.0))
            }
            EventDetail::Update { .. } => None,
        }
    }

    fn build(
        &self,
        kind: DependencyKind,
        from_team: &str,
        to_team: &str,
        rationale: &str,
        event: &StructuredEvent,
        delta: f64,
        factor: f64,
    ) -> Dependency {
        let suggested_owner = match &event.detail {
            EventDetail::Blocker { owner, .. } if !owner.is_empty() => owner.clone(),
            _ => format!("{to_team} lead"),
        };
        Dependency {
            kind,
            from_team: from_team.to_string(),
            to_team: to_team.to_string(),
            rationale: rationale.to_string(),
            recommended_action: format!("Schedule a sync between {from_team} and {to_team}"),
            suggested_owner,
            urgency: event.urgency,
            confidence: ((event.confidence + delta).clamp(0.0, 1.0) * factor).clamp(0.0, 1.0),
        }
    }

    /// Word-boundary matcher over a team's aliases (plus the name itself).
    fn team_reference_re(&self, team: &str) -> Regex {
        let mut aliases: Vec<String> = self
            .aliases
            .get(team)
            .cloned()
            .unwrap_or_default();
        if !aliases.iter().any(|a| a.eq_ignore_ascii_case(team)) {
            aliases.push(team.to_string());
        }
        let alternation = aliases
            .iter()
            .map(|a| regex::escape(a))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("escaped alternation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skald_core::BlockerStatus;

    fn linker() -> DependencyLinker {
        DependencyLinker::new(&SkaldConfig::default())
    }

    fn event(team: &str, urgency: Urgency, detail: EventDetail) -> StructuredEvent {
        let summary = match &detail {
            EventDetail::Blocker { issue, .. } => issue.clone(),
            EventDetail::Decision { what_decided, .. } => what_decided.clone(),
            EventDetail::ActionItem { description, .. } => description.clone(),
            EventDetail::Update { what_happened, .. } => what_happened.clone(),
        };
        StructuredEvent {
            summary,
            confidence: 0.9,
            channel: format!("C_{}", team.to_uppercase()),
            teams: vec![team.to_string()],
            owners: vec![],
            urgency,
            topics: vec![],
            extracted_at: String::new(),
            detail,
        }
    }

    fn blocker(team: &str, issue: &str, urgency: Urgency) -> StructuredEvent {
        event(
            team,
            urgency,
            EventDetail::Blocker {
                issue: issue.to_string(),
                owner: "dana".to_string(),
                severity: urgency,
                status: BlockerStatus::Open,
                blocked_by: None,
            },
        )
    }

    fn decision(team: &str, what: &str, impact: &str) -> StructuredEvent {
        event(
            team,
            Urgency::Medium,
            EventDetail::Decision {
                what_decided: what.to_string(),
                decided_by: "ravi".to_string(),
                context: String::new(),
                impact: impact.to_string(),
            },
        )
    }

    fn by_team(entries: Vec<(&str, Vec<StructuredEvent>)>) -> BTreeMap<String, Vec<StructuredEvent>> {
        entries
            .into_iter()
            .map(|(t, e)| (t.to_string(), e))
            .collect()
    }

    #[test]
    fn unrelated_teams_produce_no_dependencies() {
        let events = by_team(vec![
            ("software", vec![blocker("software", "ci runner is flaky", Urgency::Medium)]),
            ("mechanical", vec![blocker("mechanical", "bracket tolerance off", Urgency::Medium)]),
        ]);
        let outcome = linker().link(&events, &AdjustmentTable::default());
        assert!(outcome.dependencies.is_empty());
        assert!(outcome.highlights.is_empty());
    }

    #[test]
    fn waiting_blocker_and_interface_decision() {
        // Scenario: software waits on electrical; electrical changes an
        // interface that names software.
        let events = by_team(vec![
            (
                "software",
                vec![blocker(
                    "software",
                    "waiting on electrical schematic",
                    Urgency::High,
                )],
            ),
            (
                "electrical",
                vec![decision(
                    "electrical",
                    "move to Rev C connector",
                    "changes the firmware interface the software team consumes",
                )],
            ),
        ]);
        let outcome = linker().link(&events, &AdjustmentTable::default());

        let waiting: Vec<&Dependency> = outcome
            .dependencies
            .iter()
            .filter(|d| d.kind == DependencyKind::WaitingOn)
            .collect();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].from_team, "software");
        assert_eq!(waiting[0].to_team, "electrical");
        assert!(waiting[0].confidence > 0.0);

        let interface: Vec<&Dependency> = outcome
            .dependencies
            .iter()
            .filter(|d| d.kind == DependencyKind::InterfaceChange)
            .collect();
        assert_eq!(interface.len(), 1);
        assert_eq!(interface[0].from_team, "electrical");
        assert_eq!(interface[0].to_team, "software");

        let alerts = linker().alerts(&outcome.dependencies);
        assert!(!alerts.is_empty());
        assert_eq!(alerts[0].priority, 1);
        assert_eq!(alerts[0].dependency.urgency, Urgency::High);
    }

    #[test]
    fn near_identical_matches_collapse_keeping_highest_confidence() {
        let mut strong = blocker("software", "Waiting on EE schematic.", Urgency::High);
        strong.confidence = 0.95;
        let mut weak = blocker("software", "waiting on ee schematic", Urgency::High);
        weak.confidence = 0.6;

        let events = by_team(vec![
            ("software", vec![weak, strong]),
            ("electrical", vec![blocker("electrical", "spinning", Urgency::Low)]),
        ]);
        let outcome = linker().link(&events, &AdjustmentTable::default());
        assert_eq!(outcome.dependencies.len(), 1);
        assert_eq!(outcome.dependencies[0].confidence, 0.95);
    }

    #[test]
    fn low_confidence_candidates_are_dropped() {
        let mut vague = blocker("software", "might need something from mech eventually", Urgency::Low);
        vague.confidence = 0.3;
        let events = by_team(vec![
            ("software", vec![vague]),
            ("mechanical", vec![blocker("mechanical", "ok", Urgency::Low)]),
        ]);
        assert!(linker().link(&events, &AdjustmentTable::default()).dependencies.is_empty());
    }

    #[test]
    fn decision_mentioning_team_without_impact_is_not_a_dependency() {
        let events = by_team(vec![
            (
                "electrical",
                vec![decision("electrical", "thanked the software folks", "")],
            ),
            ("software", vec![blocker("software", "quiet day", Urgency::Low)]),
        ]);
        assert!(linker().link(&events, &AdjustmentTable::default()).dependencies.is_empty());
    }

    #[test]
    fn timeline_decision_links_named_team() {
        let events = by_team(vec![
            (
                "mechanical",
                vec![decision(
                    "mechanical",
                    "pilot run slips two weeks",
                    "schedule change delays the electrical bring-up",
                )],
            ),
            ("electrical", vec![blocker("electrical", "idle", Urgency::Low)]),
        ]);
        let outcome = linker().link(&events, &AdjustmentTable::default());
        assert_eq!(outcome.dependencies.len(), 1);
        assert_eq!(outcome.dependencies[0].kind, DependencyKind::TimelineImpact);
        assert_eq!(outcome.dependencies[0].to_team, "electrical");
    }

    #[test]
    fn alerts_gate_on_confidence_or_urgency() {
        let mk = |urgency: Urgency, confidence: f64| Dependency {
            kind: DependencyKind::WaitingOn,
            from_team: "a".to_string(),
            to_team: "b".to_string(),
            rationale: format!("{urgency} {confidence}"),
            recommended_action: String::new(),
            suggested_owner: String::new(),
            urgency,
            confidence,
        };
        let deps = vec![
            mk(Urgency::Low, 0.5),      // neither gate
            mk(Urgency::Low, 0.9),      // confidence gate
            mk(Urgency::Critical, 0.5), // urgency gate
        ];
        let alerts = linker().alerts(&deps);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].dependency.urgency, Urgency::Critical);
        assert_eq!(alerts[0].priority, 1);
        assert_eq!(alerts[1].priority, 2);
        assert!(alerts[0].alert_id.starts_with("alert_"));
    }

    #[test]
    fn feedback_delta_can_drop_a_candidate_below_the_floor() {
        let mut weak = blocker("software", "waiting on electrical schematic", Urgency::High);
        weak.confidence = 0.6;
        let events = by_team(vec![
            ("software", vec![weak]),
            ("electrical", vec![blocker("electrical", "idle", Urgency::Low)]),
        ]);

        let clean = linker().link(&events, &AdjustmentTable::default());
        assert_eq!(clean.dependencies.len(), 1);

        let mut table = AdjustmentTable::default();
        table.insert("blocker", "software", -0.3);
        let adjusted = linker().link(&events, &table);
        assert!(adjusted.dependencies.is_empty());
    }

    #[test]
    fn output_is_deterministic_across_map_order() {
        let a = by_team(vec![
            ("software", vec![blocker("software", "waiting on electrical parts", Urgency::High)]),
            ("electrical", vec![blocker("electrical", "blocked by software api", Urgency::High)]),
        ]);
        let first = linker().link(&a, &AdjustmentTable::default());
        let second = linker().link(&a, &AdjustmentTable::default());
        let keys = |o: &LinkOutcome| {
            o.dependencies
                .iter()
                .map(|d| d.dedup_key())
                .collect::<Vec<_>>()
        };
        assert_eq!(keys(&first), keys(&second));
    }
}
