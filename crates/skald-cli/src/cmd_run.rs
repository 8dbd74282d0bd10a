use std::path::Path;

use tokio_util::sync::CancellationToken;

use skald_core::config::SkaldConfig;
use skald_pipeline::{ChannelBatch, FileDeliverer, FixtureExtractor, Pipeline};
use skald_store::SkaldPaths;

pub fn execute(
    root: &Path,
    input: Option<&Path>,
    events: Option<&Path>,
) -> anyhow::Result<()> {
    let paths = SkaldPaths::discover(root);
    if !paths.is_initialized() {
        anyhow::bail!(
            "not a skald workspace ({} not found). Run `skald init` first.",
            paths.skald_dir.display()
        );
    }
    let config = SkaldConfig::load(&paths.config_json)?;

    let batches = match input {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
            serde_json::from_str::<Vec<ChannelBatch>>(&content)
                .map_err(|e| anyhow::anyhow!("malformed batches {}: {e}", path.display()))?
        }
        None => config
            .channels
            .iter()
            .map(|(team, channel)| ChannelBatch {
                team: team.clone(),
                channel: channel.clone(),
                text: String::new(),
                message_count: 0,
            })
            .collect(),
    };
    if batches.is_empty() {
        anyhow::bail!("no channels to process: configure `channels` or pass --input");
    }

    let extractor = match events {
        Some(path) => FixtureExtractor::load(path)?,
        None => FixtureExtractor::empty(),
    };
    let deliverer = FileDeliverer::new(&paths.export_dir);
    let pipeline = Pipeline::new(&paths, config);

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;

    let (summary, _output) = tokio::runtime::Runtime::new()?.block_on(pipeline.run(
        batches,
        &extractor,
        &deliverer,
        cancel,
    ))?;

    println!("Run {} complete", summary.run_id);
    println!(
        "  {} teams, {} events ({} new, {} duplicate)",
        summary.teams, summary.events, summary.new_records, summary.duplicate_records
    );
    println!(
        "  {} dependencies, {} alerts",
        summary.dependencies, summary.alerts
    );
    println!(
        "  {} deliveries, {} failed",
        summary.deliveries, summary.delivery_failures
    );
    println!("  export: {}", paths.export_dir.display());
    Ok(())
}
