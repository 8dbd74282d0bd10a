use std::path::Path;

use skald_memory::{EventStore, RunStateStore};
use skald_store::SkaldPaths;

pub fn execute(root: &Path) -> anyhow::Result<()> {
    let paths = SkaldPaths::discover(root);
    if !paths.is_initialized() {
        anyhow::bail!("not a skald workspace. Run `skald init` first.");
    }

    let state = RunStateStore::new(&paths).load();
    match &state.last_run {
        Some(ts) => println!("Last successful run: {ts}"),
        None => println!("Last successful run: (none)"),
    }
    if !state.processed_channels.is_empty() {
        println!("Processed channels: {}", state.processed_channels.join(", "));
    }

    let store = EventStore::open(&paths);
    let active = store.active_blockers();
    println!("Decisions on record: {}", store.decision_count());
    println!(
        "Blockers on record: {} ({} active)",
        store.blocker_count(),
        active.len()
    );
    Ok(())
}
