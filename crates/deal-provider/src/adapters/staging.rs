//! Staging files on the local filesystem under `<repo>/incoming`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::StagingError;
use crate::ports::outbound::{StagingFile, StagingStore};

/// Creates one uniquely named file per proposed deal.
#[derive(Debug, Clone)]
pub struct LocalStagingStore {
    dir: PathBuf,
}

impl LocalStagingStore {
    /// Staging directory `incoming` inside `repo_root`.
    pub fn new(repo_root: impl AsRef<Path>) -> Self {
        Self {
            dir: repo_root.as_ref().join("incoming"),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl StagingStore for LocalStagingStore {
    async fn create_staging_file(&self) -> Result<StagingFile, StagingError> {
        let create_err = |e: std::io::Error| StagingError::Create {
            dir: self.dir.clone(),
            reason: e.to_string(),
        };
        fs::create_dir_all(&self.dir).await.map_err(create_err)?;

        let path = self.dir.join(format!("deal-{}", Uuid::new_v4()));
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(create_err)?;
        debug!(path = %path.display(), "Created staging file");
        Ok(StagingFile::new(path, file))
    }

    async fn close(&self, file: StagingFile) -> Result<(), StagingError> {
        let path = file.path().to_path_buf();
        file.into_file()
            .sync_all()
            .await
            .map_err(|e| StagingError::Close {
                path,
                reason: e.to_string(),
            })
    }

    async fn remove(&self, path: &Path) -> Result<(), StagingError> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed staging file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StagingError::Remove {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }
}
