// Advisory single-instance lock beside the task database

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Held for as long as one process works on a task database
///
/// The lock is released when the value is dropped and the file handle closes.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    _file: File,
}

impl InstanceLock {
    /// Lock `<database>.lock`, failing fast if another process holds it
    pub fn acquire(database: &Path) -> Result<Self> {
        let path = lock_path(database);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .wrap_err_with(|| format!("Failed to open lock file {}", path.display()))?;

        FileExt::try_lock_exclusive(&file).map_err(|_| {
            eyre!(
                "Task database {} is already in use by another taskorg process",
                database.display()
            )
        })?;

        debug!(path = %path.display(), "Acquired instance lock");
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_path(database: &Path) -> PathBuf {
    let mut name = database.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    database.with_file_name(name)
}
