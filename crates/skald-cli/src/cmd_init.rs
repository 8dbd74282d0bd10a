use std::path::Path;

use skald_core::config::SkaldConfig;
use skald_store::{write_atomic, SkaldPaths};

pub fn execute(root: &Path) -> anyhow::Result<()> {
    let paths = SkaldPaths::discover(root);
    let already = paths.is_initialized();
    paths.ensure_layout()?;

    if !paths.config_json.exists() {
        let config = SkaldConfig::default();
        write_atomic(
            &paths.config_json,
            serde_json::to_string_pretty(&config)?.as_bytes(),
        )?;
        println!("Wrote default config to {}", paths.config_json.display());
    }

    if already {
        println!("Workspace already initialized at {}", paths.skald_dir.display());
    } else {
        println!("Initialized skald workspace at {}", paths.skald_dir.display());
    }
    Ok(())
}
