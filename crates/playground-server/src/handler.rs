//! The seam between the HTTP layer and the execution core.
//!
//! Route handlers talk to a [`PlaygroundHandler`] rather than to the
//! pipeline directly, so router tests can swap in a mock and deployments
//! can choose the runner strategy at construction time.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use playground_core::{
    ContainerRunner, ExecutionRequest, FileStore, Pipeline, PipelineOutcome, PlaygroundConfig,
    PlaygroundError, RetentionSweeper, SaveFileRequest, SavedFile,
};

#[async_trait]
pub trait PlaygroundHandler: Send + Sync {
    /// Run the full compile-then-run pipeline for one request.
    async fn compile_and_run(
        &self,
        request: ExecutionRequest,
    ) -> Result<PipelineOutcome, PlaygroundError>;

    /// Persist a file and schedule its retention check.
    async fn save_file(&self, request: SaveFileRequest) -> Result<SavedFile, PlaygroundError>;

    /// Fetch a previously saved file, if it still exists.
    async fn load_file(&self, id: &Uuid) -> Result<Option<SavedFile>, PlaygroundError>;
}

/// Production handler wiring the pipeline, the saved-file store, and the
/// retention sweeper together.
#[derive(Clone)]
pub struct PlaygroundService {
    pipeline: Arc<Pipeline>,
    store: FileStore,
    sweeper: RetentionSweeper,
}

impl PlaygroundService {
    pub fn new(runner: Arc<dyn ContainerRunner>, config: PlaygroundConfig) -> Self {
        let store = FileStore::new(config.files_dir.clone());
        let sweeper = RetentionSweeper::spawn(config.retention_window);
        let pipeline = Arc::new(Pipeline::new(runner, config));
        Self {
            pipeline,
            store,
            sweeper,
        }
    }

    pub fn files_dir(&self) -> PathBuf {
        self.store.files_dir().to_path_buf()
    }
}

#[async_trait]
impl PlaygroundHandler for PlaygroundService {
    async fn compile_and_run(
        &self,
        request: ExecutionRequest,
    ) -> Result<PipelineOutcome, PlaygroundError> {
        self.pipeline.compile_and_run(request).await
    }

    async fn save_file(&self, request: SaveFileRequest) -> Result<SavedFile, PlaygroundError> {
        let (saved, path) = self.store.save(request).await?;
        self.sweeper.schedule(path);
        Ok(saved)
    }

    async fn load_file(&self, id: &Uuid) -> Result<Option<SavedFile>, PlaygroundError> {
        self.store.load(id).await
    }
}
