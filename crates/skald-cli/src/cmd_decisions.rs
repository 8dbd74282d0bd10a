use std::path::Path;

use skald_memory::EventStore;
use skald_store::SkaldPaths;

pub fn execute(root: &Path, days: u64) -> anyhow::Result<()> {
    let paths = SkaldPaths::discover(root);
    let store = EventStore::open(&paths);
    let recent = store.decisions_since(time::Duration::days(days as i64));

    if recent.is_empty() {
        println!("No decisions in the last {days}d.");
        return Ok(());
    }

    for decision in recent {
        println!(
            "{} {} — {} (by {}, team: {})",
            decision.id, decision.last_seen, decision.what_decided, decision.decided_by, decision.team
        );
    }
    Ok(())
}
