// # File Health Publisher
//
// Atomic file publication of the health snapshot.
//
// ## Atomicity
//
// The snapshot is serialized to a temporary file next to the target and
// renamed over it. Rename is atomic on POSIX filesystems, so an external
// probe reading at any moment sees either the previous complete document
// or the new one — never a truncated write.
//
// The document is overwritten wholesale on every publication; nothing is
// ever read back.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::health::HealthSnapshot;
use crate::traits::HealthPublisher;
use crate::Error;

/// Publishes the health snapshot to a JSON file with atomic replacement.
#[derive(Debug)]
pub struct FileHealthPublisher {
    path: PathBuf,
}

impl FileHealthPublisher {
    /// Create a publisher for the given path, creating parent directories
    /// if needed.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::health_publish(format!(
                    "failed to create health directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        Ok(Self { path })
    }

    /// Path to the temporary file used for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }
}

#[async_trait::async_trait]
impl HealthPublisher for FileHealthPublisher {
    async fn publish(&self, snapshot: &HealthSnapshot) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| Error::health_publish(format!("failed to serialize snapshot: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::health_publish(format!(
                    "failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::health_publish(format!(
                    "failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::health_publish(format!(
                    "failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::health_publish(format!(
                "failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("health snapshot published to {}", self.path.display());
        Ok(())
    }
}
