use std::path::Path;

use skald_memory::RunStateStore;
use skald_store::SkaldPaths;

pub fn execute(root: &Path, limit: usize) -> anyhow::Result<()> {
    let paths = SkaldPaths::discover(root);
    let state = RunStateStore::new(&paths).load();

    if state.history.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }

    for run in state.history.iter().rev().take(limit) {
        let status = if run.success { "ok" } else { "failed" };
        let messages: usize = run.message_counts.values().sum();
        print!(
            "{} {} [{}] {} channels, {} messages",
            run.run_id,
            run.timestamp,
            status,
            run.channels.len(),
            messages
        );
        match &run.error {
            Some(e) => println!(" — {e}"),
            None => println!(),
        }
    }
    Ok(())
}
