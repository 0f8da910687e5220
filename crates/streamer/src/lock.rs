use std::path::{Path, PathBuf};

use crate::error::StreamerError;

/// A process-wide lock file in the vault workspace directory (spec §9
/// "Global state"), preventing two orchestrators from racing on the same
/// local database. Released when dropped.
pub struct WorkspaceLock {
    path: PathBuf,
}

impl WorkspaceLock {
    pub fn acquire(workspace_dir: &Path) -> Result<Self, StreamerError> {
        std::fs::create_dir_all(workspace_dir)?;
        let path = workspace_dir.join(".basin.lock");
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StreamerError::WorkspaceLocked(path))
            }
            Err(e) => Err(StreamerError::Io(e)),
        }
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_in_same_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let first = WorkspaceLock::acquire(dir.path()).unwrap();
        assert!(WorkspaceLock::acquire(dir.path()).is_err());
        drop(first);
        assert!(WorkspaceLock::acquire(dir.path()).is_ok());
    }
}
