use std::path::Path;

use skald_memory::EventStore;
use skald_store::SkaldPaths;

pub fn execute(root: &Path) -> anyhow::Result<()> {
    let paths = SkaldPaths::discover(root);
    let store = EventStore::open(&paths);
    let active = store.active_blockers();

    if active.is_empty() {
        println!("No active blockers.");
        return Ok(());
    }

    let now = time::OffsetDateTime::now_utc();
    for blocker in active {
        println!(
            "{} [{}] {} (owner: {}, team: {}, {}d old)",
            blocker.id,
            blocker.severity,
            blocker.issue,
            blocker.owner,
            blocker.team,
            blocker.age_days(now)
        );
    }
    Ok(())
}
