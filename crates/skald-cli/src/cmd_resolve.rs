use std::path::Path;

use skald_core::BlockerStatus;
use skald_memory::EventStore;
use skald_store::SkaldPaths;

pub fn execute(root: &Path, id: &str, status: &str) -> anyhow::Result<()> {
    let status = match status.to_lowercase().as_str() {
        "mitigated" => BlockerStatus::Mitigated,
        "resolved" => BlockerStatus::Resolved,
        other => anyhow::bail!("unknown status \"{other}\" (expected mitigated or resolved)"),
    };

    let paths = SkaldPaths::discover(root);
    let mut store = EventStore::open(&paths);
    if store.resolve_blocker(id, status)? {
        println!("Blocker {id} → {status}");
    } else {
        println!("No change: {id} is unknown or already past {status}");
    }
    Ok(())
}
