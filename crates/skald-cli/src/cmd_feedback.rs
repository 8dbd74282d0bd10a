use std::path::Path;

use skald_core::config::SkaldConfig;
use skald_core::{now_rfc3339, FeedbackCategory, FeedbackEvent};
use skald_feedback::{FeedbackLog, StoreOutcome};
use skald_store::SkaldPaths;

pub fn execute(
    root: &Path,
    item: &str,
    user: &str,
    category: &str,
    comment: Option<&str>,
) -> anyhow::Result<()> {
    let category = match category.to_lowercase().as_str() {
        "accurate" => FeedbackCategory::Accurate,
        "wrong" => FeedbackCategory::Wrong,
        "missing-context" | "missing_context" => FeedbackCategory::MissingContext,
        "irrelevant" => FeedbackCategory::Irrelevant,
        other => anyhow::bail!(
            "unknown category \"{other}\" (expected accurate, wrong, missing-context, or irrelevant)"
        ),
    };

    let paths = SkaldPaths::discover(root);
    if !paths.is_initialized() {
        anyhow::bail!("not a skald workspace. Run `skald init` first.");
    }
    let config = SkaldConfig::load(&paths.config_json)?;
    let log = FeedbackLog::new(&paths, &config);

    let outcome = log.store(FeedbackEvent {
        item_id: item.to_string(),
        user: user.to_string(),
        category,
        comment: comment.map(|c| c.to_string()),
        created_at: now_rfc3339(),
    })?;

    match outcome {
        StoreOutcome::Stored => println!("Recorded {} on {item} by {user}", category.as_str()),
        StoreOutcome::Replaced => println!(
            "Replaced earlier reaction: now {} on {item} by {user}",
            category.as_str()
        ),
    }
    Ok(())
}
