//! Relevance scoring and ordering of digest items for one persona.
//!
//! Score = urgency scale × adjusted confidence × category boost ×
//! cross-team factor × topic factor. The feedback adjustment is added to
//! confidence (clamped to [0, 1]) before the base is computed, so it can
//! never flip a score's sign. Items below the persona's severity floor move
//! to the secondary list for thread-level detail; nothing is dropped.

use serde::Serialize;

use crate::persona::Persona;
use skald_core::config::SkaldConfig;
use skald_core::{AdjustmentTable, DigestItem};

/// Per-factor breakdown of a computed score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub category_boost: f64,
    pub team_factor: f64,
    pub topic_factor: f64,
    pub adjustment: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_topic: Option<String>,
}

/// A digest item scored against one persona.
#[derive(Debug, Clone, Serialize)]
pub struct RankedItem {
    pub item: DigestItem,
    pub score: f64,
    pub persona: String,
    pub breakdown: ScoreBreakdown,
}

impl RankedItem {
    /// Human-readable score explanation for the CLI.
    pub fn explain(&self) -> String {
        let b = &self.breakdown;
        let mut parts = vec![format!("score {:.2}", self.score), format!("base {:.2}", b.base)];
        if b.category_boost != 1.0 {
            parts.push(format!("{} ×{:.2}", self.item.kind_label(), b.category_boost));
        }
        if b.team_factor != 1.0 {
            parts.push(format!("cross-team ×{:.2}", b.team_factor));
        }
        if let Some(topic) = &b.matched_topic {
            parts.push(format!("topic \"{topic}\" ×{:.2}", b.topic_factor));
        }
        if b.adjustment != 0.0 {
            parts.push(format!("feedback {:+.2}", b.adjustment));
        }
        parts.join(" | ")
    }
}

/// Ranked output: primary digest items and thread-level detail.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ranking {
    pub primary: Vec<RankedItem>,
    pub secondary: Vec<RankedItem>,
}

pub struct ContentRanker {
    topic_bonus: f64,
}

impl ContentRanker {
    pub fn new(config: &SkaldConfig) -> Self {
        ContentRanker {
            topic_bonus: config.topic_bonus,
        }
    }

    /// Score and order `items` for `persona`.
    ///
    /// The output is a permutation of the input: every item lands in exactly
    /// one of primary/secondary. Ordering is score desc, ties broken by
    /// urgency desc then original extraction order (the sort is stable).
    pub fn rank(
        &self,
        items: Vec<DigestItem>,
        persona: &Persona,
        adjustments: &AdjustmentTable,
    ) -> Ranking {
        let mut ranking = Ranking::default();

        for item in items {
            let ranked = self.score(item, persona, adjustments);
            if ranked.item.urgency() >= persona.min_severity_for_main {
                ranking.primary.push(ranked);
            } else {
                ranking.secondary.push(ranked);
            }
        }

        let by_score = |a: &RankedItem, b: &RankedItem| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.item.urgency().cmp(&a.item.urgency()))
        };
        ranking.primary.sort_by(by_score);
        ranking.secondary.sort_by(by_score);
        ranking
    }

    fn score(
        &self,
        item: DigestItem,
        persona: &Persona,
        adjustments: &AdjustmentTable,
    ) -> RankedItem {
        let adjustment = adjustments.delta(item.kind_label(), item.team().unwrap_or_default());
        let confidence = (item.confidence() + adjustment).clamp(0.0, 1.0);
        let base = item.urgency().scale() * confidence;

        let category_boost = persona.boost(item.kind_label());

        let touches_other_team = item
            .teams()
            .iter()
            .any(|t| !t.eq_ignore_ascii_case(&persona.team));
        let team_factor = if touches_other_team {
            persona.cross_team_weight
        } else {
            1.0
        };

        let matched_topic = persona.matched_topic(&item.text()).map(|t| t.to_string());
        let topic_factor = if matched_topic.is_some() {
            1.0 + self.topic_bonus
        } else {
            1.0
        };

        let score = base * category_boost * team_factor * topic_factor;
        RankedItem {
            score,
            persona: persona.name.clone(),
            breakdown: ScoreBreakdown {
                base,
                category_boost,
                team_factor,
                topic_factor,
                adjustment,
                matched_topic,
            },
            item,
        }
    }
}
