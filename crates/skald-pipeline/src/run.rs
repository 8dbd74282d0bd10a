//! The sequential digest pipeline.
//!
//! One pass per invocation: extract per team (concurrently, joined
//! deterministically) → link cross-team dependencies → persist decisions and
//! blockers → rank per recipient → deliver → export alerts → commit the run
//! watermark. A failed collaborator degrades to an empty/partial result;
//! only caller cancellation aborts the run, and it leaves the watermark
//! untouched so the next run re-covers the same window.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collab::{
    analyze_with_timeout, deliver_with_timeout, ChannelBatch, Deliverer, DeliveryTarget, Extractor,
};
use crate::digest::{DigestOutput, GlobalDigest, PersonalizedDigest};
use skald_core::config::SkaldConfig;
use skald_core::hash::new_run_id;
use skald_core::{now_rfc3339, DigestItem, SkaldError, StructuredEvent, TeamAnalysis};
use skald_feedback::{FeedbackLog, ItemRef};
use skald_link::DependencyLinker;
use skald_memory::{EventStore, RunRecord, RunStateStore};
use skald_persona::{resolve, ContentRanker};
use skald_store::{lock_file, write_atomic, SkaldPaths};

/// Counters for one completed run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub run_id: String,
    pub teams: usize,
    pub events: usize,
    pub dependencies: usize,
    pub alerts: usize,
    pub new_records: usize,
    pub duplicate_records: usize,
    pub deliveries: usize,
    pub delivery_failures: usize,
}

pub struct Pipeline {
    paths: SkaldPaths,
    config: SkaldConfig,
}

impl Pipeline {
    pub fn new(paths: &SkaldPaths, config: SkaldConfig) -> Self {
        Pipeline {
            paths: paths.clone(),
            config,
        }
    }

    /// Run the full pipeline over the given channel batches.
    pub async fn run(
        &self,
        batches: Vec<ChannelBatch>,
        extractor: &dyn Extractor,
        deliverer: &dyn Deliverer,
        cancel: CancellationToken,
    ) -> anyhow::Result<(RunSummary, DigestOutput)> {
        let run_id = new_run_id();
        let _lock = lock_file(&self.paths.lock_file)?;
        let run_store = RunStateStore::new(&self.paths);
        let state = run_store.load();
        let timeout = Duration::from_secs(self.config.extract_timeout_secs);

        info!(
            run = %run_id,
            window_start = %state.window_start(self.config.lookback_hours),
            channels = batches.len(),
            "starting digest run"
        );

        // Per-team extraction runs concurrently; the join is deterministic
        // because results are keyed by team name, not completion order.
        let analyses = self.extract_all(&batches, extractor, timeout).await;

        if cancel.is_cancelled() {
            return Err(SkaldError::Cancelled.into());
        }

        let feedback = FeedbackLog::new(&self.paths, &self.config);
        let adjustments = feedback.adjustments();

        let events_by_team: BTreeMap<String, Vec<StructuredEvent>> = analyses
            .iter()
            .map(|(team, a)| (team.clone(), a.events.clone()))
            .collect();
        let linker = DependencyLinker::new(&self.config);
        let linked = linker.link(&events_by_team, &adjustments);
        let alerts = linker.alerts(&linked.dependencies);

        let all_events: Vec<StructuredEvent> = analyses
            .values()
            .flat_map(|a| a.events.iter().cloned())
            .collect();
        let mut store = EventStore::open(&self.paths);
        let recorded = store.record(&all_events)?;

        // Candidate digest items: every event plus every promoted alert.
        let items: Vec<DigestItem> = all_events
            .iter()
            .cloned()
            .map(DigestItem::Event)
            .chain(alerts.iter().cloned().map(DigestItem::Alert))
            .collect();

        // Register delivered items so feedback can be attributed later.
        // Registration failure degrades; it never blocks the digest.
        let mut seen = BTreeSet::new();
        let refs: Vec<ItemRef> = items
            .iter()
            .filter(|item| seen.insert(item.item_id()))
            .map(|item| ItemRef {
                item_id: item.item_id(),
                kind: item.kind_label().to_string(),
                team: item.team().unwrap_or_default().to_string(),
            })
            .collect();
        if let Err(e) = feedback.record_items(&refs) {
            warn!("failed to register digest items for feedback: {e}");
        }

        let ranker = ContentRanker::new(&self.config);
        let mut personalized = Vec::new();
        for recipient in &self.config.recipients {
            let persona = resolve(
                &recipient.role,
                &recipient.team,
                recipient.overrides.as_ref(),
            );
            let ranking = ranker.rank(items.clone(), &persona, &adjustments);
            personalized.push(PersonalizedDigest {
                user: recipient.user.clone(),
                persona: persona.name.clone(),
                target: DeliveryTarget::Dm {
                    user: recipient.user.clone(),
                },
                ranking,
            });
        }

        let output = DigestOutput {
            run_id: run_id.clone(),
            global: GlobalDigest {
                date: now_rfc3339(),
                cross_team_highlights: linked.highlights.clone(),
                total_events: all_events.len(),
                alert_count: alerts.len(),
                team_summaries: analyses
                    .iter()
                    .map(|(team, a)| (team.clone(), a.summary.clone()))
                    .collect(),
            },
            personalized,
            alerts,
        };

        let (deliveries, delivery_failures) =
            self.deliver_all(&output, &analyses, deliverer, timeout).await;

        // Alert export for leadership routing and audit.
        write_atomic(
            &self.paths.alerts_json,
            serde_json::to_string_pretty(&output.alerts)?.as_bytes(),
        )?;

        if cancel.is_cancelled() {
            // Partial store writes stay; they are idempotent upserts and a
            // retried run converges. The watermark is not advanced.
            return Err(SkaldError::Cancelled.into());
        }

        run_store.commit(RunRecord {
            run_id: run_id.clone(),
            timestamp: now_rfc3339(),
            channels: batches.iter().map(|b| b.channel.clone()).collect(),
            message_counts: batches
                .iter()
                .map(|b| (b.channel.clone(), b.message_count))
                .collect(),
            success: true,
            error: None,
        })?;

        let summary = RunSummary {
            run_id,
            teams: analyses.len(),
            events: all_events.len(),
            dependencies: linked.dependencies.len(),
            alerts: output.alerts.len(),
            new_records: recorded.new_count,
            duplicate_records: recorded.duplicate_count,
            deliveries,
            delivery_failures,
        };
        info!(
            run = %summary.run_id,
            events = summary.events,
            dependencies = summary.dependencies,
            alerts = summary.alerts,
            "digest run complete"
        );
        Ok((summary, output))
    }

    /// Extract all batches concurrently and join into a team-keyed map.
    /// A failed or timed-out extraction substitutes an empty analysis.
    async fn extract_all(
        &self,
        batches: &[ChannelBatch],
        extractor: &dyn Extractor,
        timeout: Duration,
    ) -> BTreeMap<String, TeamAnalysis> {
        let results = futures::future::join_all(batches.iter().map(|batch| async move {
            let analysis = match analyze_with_timeout(extractor, batch, timeout).await {
                Ok(a) => a,
                Err(e) => {
                    warn!(
                        team = %batch.team,
                        channel = %batch.channel,
                        "extraction failed, substituting empty analysis: {e}"
                    );
                    TeamAnalysis::empty(&batch.team, &batch.channel)
                }
            };
            (batch.team.clone(), analysis)
        }))
        .await;

        let mut analyses: BTreeMap<String, TeamAnalysis> = BTreeMap::new();
        for (team, analysis) in results {
            match analyses.entry(team) {
                std::collections::btree_map::Entry::Vacant(entry) => {
                    entry.insert(analysis);
                }
                std::collections::btree_map::Entry::Occupied(mut entry) => {
                    let merged = entry.get_mut();
                    merged.message_count += analysis.message_count;
                    merged.events.extend(analysis.events);
                }
            }
        }
        analyses
    }

    /// Post to every target, continuing after per-target failures.
    async fn deliver_all(
        &self,
        output: &DigestOutput,
        analyses: &BTreeMap<String, TeamAnalysis>,
        deliverer: &dyn Deliverer,
        timeout: Duration,
    ) -> (usize, usize) {
        let mut targets: Vec<(DeliveryTarget, serde_json::Value)> = Vec::new();

        if !self.config.digest_channel.is_empty() {
            targets.push((
                DeliveryTarget::MainChannel {
                    channel: self.config.digest_channel.clone(),
                },
                output.global_payload(),
            ));
        }
        for (team, analysis) in analyses {
            if analysis.events.is_empty() {
                continue;
            }
            targets.push((
                DeliveryTarget::TeamThread {
                    channel: analysis.channel.clone(),
                    team: team.clone(),
                },
                output.thread_payload(analysis),
            ));
        }
        if !output.alerts.is_empty() {
            for user in &self.config.leadership_users {
                targets.push((
                    DeliveryTarget::Dm { user: user.clone() },
                    output.leadership_payload(),
                ));
            }
        }
        for digest in &output.personalized {
            targets.push((digest.target.clone(), DigestOutput::personal_payload(digest)));
        }

        let mut delivered = 0;
        let mut failures = 0;
        for (target, payload) in &targets {
            match deliver_with_timeout(deliverer, target, payload, timeout).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(target = %target.name(), "delivery failed, continuing: {e}");
                    failures += 1;
                }
            }
        }
        (delivered, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skald_core::{BlockerStatus, EventDetail, FeedbackCategory, FeedbackEvent, Urgency};
    use std::sync::Mutex;

    struct MockExtractor {
        analyses: BTreeMap<String, TeamAnalysis>,
        failing: BTreeSet<String>,
    }

    #[async_trait::async_trait]
    impl Extractor for MockExtractor {
        async fn analyze(
            &self,
            team: &str,
            channel: &str,
            _messages: &str,
            _message_count: usize,
        ) -> Result<TeamAnalysis, SkaldError> {
            if self.failing.contains(team) {
                return Err(SkaldError::collaborator("extraction", "model unavailable"));
            }
            Ok(self
                .analyses
                .get(team)
                .cloned()
                .unwrap_or_else(|| TeamAnalysis::empty(team, channel)))
        }
    }

    #[derive(Default)]
    struct MockDeliverer {
        sent: Mutex<Vec<String>>,
        failing: BTreeSet<String>,
    }

    #[async_trait::async_trait]
    impl Deliverer for MockDeliverer {
        async fn deliver(
            &self,
            target: &DeliveryTarget,
            _payload: &serde_json::Value,
        ) -> Result<(), SkaldError> {
            if self.failing.contains(&target.name()) {
                return Err(SkaldError::collaborator("delivery", "channel rejected post"));
            }
            self.sent.lock().unwrap().push(target.name());
            Ok(())
        }
    }

    fn blocker_event(team: &str, issue: &str, urgency: Urgency) -> StructuredEvent {
        StructuredEvent {
            summary: issue.to_string(),
            confidence: 0.9,
            channel: format!("C_{}", team.to_uppercase()),
            teams: vec![team.to_string()],
            owners: vec!["dana".to_string()],
            urgency,
            topics: vec![],
            extracted_at: String::new(),
            detail: EventDetail::Blocker {
                issue: issue.to_string(),
                owner: "dana".to_string(),
                severity: urgency,
                status: BlockerStatus::Open,
                blocked_by: None,
            },
        }
    }

    fn analysis(team: &str, events: Vec<StructuredEvent>) -> TeamAnalysis {
        TeamAnalysis {
            team: team.to_string(),
            channel: format!("C_{}", team.to_uppercase()),
            message_count: events.len(),
            summary: format!("{team} summary"),
            tone: "focused".to_string(),
            events,
        }
    }

    fn batch(team: &str) -> ChannelBatch {
        ChannelBatch {
            team: team.to_string(),
            channel: format!("C_{}", team.to_uppercase()),
            text: "...".to_string(),
            message_count: 4,
        }
    }

    fn test_config() -> SkaldConfig {
        let mut config = SkaldConfig::default();
        config.digest_channel = "C_DIGEST".to_string();
        config.leadership_users = vec!["U_VP".to_string()];
        config.recipients = vec![skald_core::config::RecipientConfig {
            user: "U_DANA".to_string(),
            role: "lead".to_string(),
            team: "software".to_string(),
            overrides: None,
        }];
        config
    }

    fn pipeline(dir: &std::path::Path) -> (SkaldPaths, Pipeline) {
        let paths = SkaldPaths::discover(dir);
        paths.ensure_layout().unwrap();
        let pipeline = Pipeline::new(&paths, test_config());
        (paths, pipeline)
    }

    #[tokio::test]
    async fn full_run_links_persists_ranks_and_delivers() {
        let tmp = tempfile::tempdir().unwrap();
        let (paths, pipeline) = pipeline(tmp.path());

        let extractor = MockExtractor {
            analyses: BTreeMap::from([
                (
                    "software".to_string(),
                    analysis(
                        "software",
                        vec![blocker_event(
                            "software",
                            "waiting on electrical schematic",
                            Urgency::High,
                        )],
                    ),
                ),
                (
                    "electrical".to_string(),
                    analysis(
                        "electrical",
                        vec![blocker_event("electrical", "reflow oven down", Urgency::Medium)],
                    ),
                ),
            ]),
            failing: BTreeSet::new(),
        };
        let deliverer = MockDeliverer::default();

        let (summary, output) = pipeline
            .run(
                vec![batch("software"), batch("electrical")],
                &extractor,
                &deliverer,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary.teams, 2);
        assert_eq!(summary.events, 2);
        assert_eq!(summary.dependencies, 1);
        assert_eq!(summary.alerts, 1);
        assert_eq!(summary.new_records, 2);
        assert_eq!(summary.delivery_failures, 0);
        assert_eq!(output.alerts[0].dependency.from_team, "software");
        assert_eq!(output.alerts[0].dependency.to_team, "electrical");

        let sent = deliverer.sent.lock().unwrap().clone();
        assert!(sent.contains(&"main-C_DIGEST".to_string()));
        assert!(sent.contains(&"thread-software".to_string()));
        assert!(sent.contains(&"dm-U_VP".to_string()));
        assert!(sent.contains(&"dm-U_DANA".to_string()));

        // alert export and advanced watermark
        assert!(paths.alerts_json.exists());
        let state = RunStateStore::new(&paths).load();
        assert!(state.last_run.is_some());
        assert_eq!(state.history.len(), 1);

        // personalized digest ranks the cross-team blocker for the lead
        let personal = &output.personalized[0];
        assert_eq!(personal.persona, "lead_software");
        assert!(!personal.ranking.primary.is_empty());
    }

    #[tokio::test]
    async fn failed_team_contributes_empty_analysis_not_an_error() {
        // Scenario: empty/failed channel "qa" must not abort the run or
        // appear in thread deliveries.
        let tmp = tempfile::tempdir().unwrap();
        let (_paths, pipeline) = pipeline(tmp.path());

        let extractor = MockExtractor {
            analyses: BTreeMap::from([(
                "software".to_string(),
                analysis(
                    "software",
                    vec![blocker_event("software", "ci is red", Urgency::Medium)],
                ),
            )]),
            failing: BTreeSet::from(["qa".to_string()]),
        };
        let deliverer = MockDeliverer::default();

        let (summary, _output) = pipeline
            .run(
                vec![batch("software"), batch("qa")],
                &extractor,
                &deliverer,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary.teams, 2);
        assert_eq!(summary.events, 1);

        let sent = deliverer.sent.lock().unwrap().clone();
        assert!(sent.contains(&"thread-software".to_string()));
        assert!(!sent.iter().any(|t| t.contains("qa")));
    }

    #[tokio::test]
    async fn delivery_failure_does_not_stop_remaining_targets() {
        let tmp = tempfile::tempdir().unwrap();
        let (_paths, pipeline) = pipeline(tmp.path());

        let extractor = MockExtractor {
            analyses: BTreeMap::from([(
                "software".to_string(),
                analysis(
                    "software",
                    vec![blocker_event("software", "ci is red", Urgency::Medium)],
                ),
            )]),
            failing: BTreeSet::new(),
        };
        let deliverer = MockDeliverer {
            sent: Mutex::new(Vec::new()),
            failing: BTreeSet::from(["main-C_DIGEST".to_string()]),
        };

        let (summary, _output) = pipeline
            .run(
                vec![batch("software")],
                &extractor,
                &deliverer,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary.delivery_failures, 1);
        let sent = deliverer.sent.lock().unwrap().clone();
        assert!(sent.contains(&"thread-software".to_string()));
        assert!(sent.contains(&"dm-U_DANA".to_string()));
    }

    #[tokio::test]
    async fn cancellation_aborts_without_advancing_watermark() {
        let tmp = tempfile::tempdir().unwrap();
        let (paths, pipeline) = pipeline(tmp.path());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let extractor = MockExtractor {
            analyses: BTreeMap::new(),
            failing: BTreeSet::new(),
        };
        let err = pipeline
            .run(
                vec![batch("software")],
                &extractor,
                &MockDeliverer::default(),
                cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SkaldError>(),
            Some(SkaldError::Cancelled)
        ));
        assert!(RunStateStore::new(&paths).load().last_run.is_none());
    }

    #[tokio::test]
    async fn feedback_lowers_future_ranking_of_a_noisy_category() {
        // Close the loop: deliver, react "wrong", re-run, observe the
        // adjusted score.
        let tmp = tempfile::tempdir().unwrap();
        let (paths, pipeline) = pipeline(tmp.path());

        let extractor = MockExtractor {
            analyses: BTreeMap::from([(
                "software".to_string(),
                analysis(
                    "software",
                    vec![blocker_event("software", "flaky test suite", Urgency::Medium)],
                ),
            )]),
            failing: BTreeSet::new(),
        };
        let deliverer = MockDeliverer::default();

        let (_summary, first) = pipeline
            .run(
                vec![batch("software")],
                &extractor,
                &deliverer,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let first_score = first.personalized[0].ranking.primary[0].score;
        let item_id = first.personalized[0].ranking.primary[0].item.item_id();

        let feedback = FeedbackLog::new(&paths, &test_config());
        feedback
            .store(FeedbackEvent {
                item_id,
                user: "U_DANA".to_string(),
                category: FeedbackCategory::Wrong,
                comment: None,
                created_at: now_rfc3339(),
            })
            .unwrap();

        let (_summary, second) = pipeline
            .run(
                vec![batch("software")],
                &extractor,
                &deliverer,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let second_score = second.personalized[0].ranking.primary[0].score;
        assert!(second_score < first_score);
        assert_eq!(
            second.personalized[0].ranking.primary[0].breakdown.adjustment,
            -0.05
        );
    }
}
