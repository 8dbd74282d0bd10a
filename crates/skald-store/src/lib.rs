use fs2::FileExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// All well-known paths under `.skald/`.
#[derive(Debug, Clone)]
pub struct SkaldPaths {
    pub root: PathBuf,
    pub skald_dir: PathBuf,
    pub config_json: PathBuf,
    pub memory_dir: PathBuf,
    pub decisions_json: PathBuf,
    pub blockers_json: PathBuf,
    pub feedback_dir: PathBuf,
    pub feedback_jsonl: PathBuf,
    pub items_jsonl: PathBuf,
    pub state_dir: PathBuf,
    pub run_state_json: PathBuf,
    pub export_dir: PathBuf,
    pub alerts_json: PathBuf,
    pub lock_file: PathBuf,
}

impl SkaldPaths {
    /// Derive all paths from a workspace root. Pure computation, no I/O.
    pub fn discover(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let skald_dir = root.join(".skald");
        let memory_dir = skald_dir.join("memory");
        let feedback_dir = skald_dir.join("feedback");
        let state_dir = skald_dir.join("state");
        let export_dir = skald_dir.join("export");
        Self {
            config_json: skald_dir.join("config.json"),
            decisions_json: memory_dir.join("decisions.json"),
            blockers_json: memory_dir.join("blockers.json"),
            feedback_jsonl: feedback_dir.join("feedback.jsonl"),
            items_jsonl: feedback_dir.join("items.jsonl"),
            run_state_json: state_dir.join("run_state.json"),
            alerts_json: export_dir.join("alerts.json"),
            lock_file: skald_dir.join("LOCK"),
            memory_dir,
            feedback_dir,
            state_dir,
            export_dir,
            skald_dir,
            root,
        }
    }

    /// Whether this root has been initialized as a skald workspace.
    pub fn is_initialized(&self) -> bool {
        self.skald_dir.is_dir()
    }

    /// Create all required directories. Idempotent.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        for dir in [
            &self.skald_dir,
            &self.memory_dir,
            &self.feedback_dir,
            &self.state_dir,
            &self.export_dir,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Atomic write: write to temp file in same dir, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// File-based exclusive lock guard. The digest pipeline is single-writer
/// per workspace; the lock documents and enforces that precondition.
pub struct LockGuard {
    _file: fs::File,
}

/// Acquire an exclusive file lock. Creates the lock file if needed.
pub fn lock_file(path: &Path) -> anyhow::Result<LockGuard> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    file.lock_exclusive()?;
    Ok(LockGuard { _file: file })
}
