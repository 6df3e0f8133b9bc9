//! Durable storage for saved editor files.
//!
//! Each saved file is one JSON record, `{id}.json`, under the files root.
//! Records are small and written whole; the on-disk mtime doubles as the
//! freshness signal the retention sweeper checks against.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::core_types::SavedFile;
use crate::errors::PlaygroundError;

/// Request to persist a file. Missing fields are filled in on save: a
/// fresh v4 id, and a display name derived from the id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFileRequest {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub id: Option<Uuid>,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    files_dir: PathBuf,
}

impl FileStore {
    pub fn new(files_dir: PathBuf) -> Self {
        Self { files_dir }
    }

    pub fn record_path(&self, id: &Uuid) -> PathBuf {
        self.files_dir.join(format!("{}.json", id))
    }

    /// Persist a record, minting the id and display name if absent, and
    /// return the stored file together with its path (for retention
    /// scheduling).
    pub async fn save(
        &self,
        request: SaveFileRequest,
    ) -> Result<(SavedFile, PathBuf), PlaygroundError> {
        let id = request.id.unwrap_or_else(Uuid::new_v4);
        let file_name = request
            .file_name
            .unwrap_or_else(|| display_name_for(&id));

        let record = SavedFile {
            id,
            file_name,
            code: request.code,
            last_modified: chrono::Utc::now().timestamp_millis(),
        };

        fs::create_dir_all(&self.files_dir).await?;
        let path = self.record_path(&id);
        let json = serde_json::to_vec(&record)?;
        fs::write(&path, json).await?;

        log::info!("Saved file {} ({})", record.id, record.file_name);
        Ok((record, path))
    }

    /// Load a record by id; `None` when it does not exist (or was already
    /// swept).
    pub async fn load(&self, id: &Uuid) -> Result<Option<SavedFile>, PlaygroundError> {
        let path = self.record_path(id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }
}

const COLORS: &[&str] = &[
    "amber", "azure", "coral", "crimson", "emerald", "indigo", "ivory", "jade", "magenta",
    "maroon", "ochre", "olive", "scarlet", "teal", "violet", "umber",
];

const ANIMALS: &[&str] = &[
    "badger", "bison", "crane", "falcon", "gecko", "heron", "ibex", "jackal", "lemur", "lynx",
    "marmot", "otter", "puffin", "raven", "stoat", "wombat",
];

/// Default display name for an unnamed file, derived from the id bytes so
/// the same id always maps to the same name.
fn display_name_for(id: &Uuid) -> String {
    let bytes = id.as_bytes();
    let color = COLORS[bytes[0] as usize % COLORS.len()];
    let animal = ANIMALS[bytes[1] as usize % ANIMALS.len()];
    format!("{}-{}", color, animal)
}
