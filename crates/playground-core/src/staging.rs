//! Staging of source and compiled artifacts in the exchange directory.
//!
//! An artifact exists only for the lifetime of one pipeline stage and is
//! owned by the orchestrator; nothing staged here survives a completed
//! request. Identities are typed `Uuid`s, so a hostile caller cannot smuggle
//! path components through the artifact name; the extension is re-validated
//! anyway since it arrives from configuration.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::PlaygroundConfig;
use crate::errors::PlaygroundError;

#[derive(Debug, Clone)]
pub struct ArtifactStager {
    exchange_dir: PathBuf,
}

impl ArtifactStager {
    pub fn new(exchange_dir: PathBuf) -> Self {
        Self { exchange_dir }
    }

    pub fn exchange_dir(&self) -> &Path {
        &self.exchange_dir
    }

    /// Host-side path of the artifact named `{identity}.{ext}`.
    pub fn artifact_path(&self, identity: &Uuid, ext: &str) -> PathBuf {
        self.exchange_dir
            .join(PlaygroundConfig::artifact_name(identity, ext))
    }

    /// Write `content` as `{identity}.{ext}` under the exchange root and
    /// return the host-side path.
    pub async fn stage(
        &self,
        identity: &Uuid,
        ext: &str,
        content: &str,
    ) -> Result<PathBuf, PlaygroundError> {
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PlaygroundError::StagingError(format!(
                "refusing to stage artifact with extension '{}'",
                ext
            )));
        }

        fs::create_dir_all(&self.exchange_dir).await?;

        let path = self.artifact_path(identity, ext);
        // A failure mid-write must not leave a partial artifact behind in
        // the exchange directory.
        if let Err(e) = write_artifact(&path, content).await {
            self.unstage(&path).await;
            return Err(e.into());
        }

        log::debug!("Staged artifact at {}", path.display());
        Ok(path)
    }

    /// Remove a staged artifact. Idempotent: an already-removed file is
    /// success, and any other failure is logged but swallowed so cleanup
    /// can never mask the outcome of the stage that consumed the artifact.
    pub async fn unstage(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => log::debug!("Unstaged artifact at {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to unstage {}: {}", path.display(), e),
        }
    }

    pub async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }
}

async fn write_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
