//! Service configuration for the sandbox-execution pipeline
//!
//! Everything the pipeline needs to know about its deployment lives here:
//! which images to invoke, where the shared exchange directory is, and the
//! fixed toolchain extension mapping. The configuration is constructed
//! explicitly and handed to the orchestrator; nothing else in this crate
//! reads ambient process state, which keeps the pipeline testable against
//! fakes. `from_env` exists as the one convenience bridge for deployments
//! that configure through the environment, matching the original service.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::PlaygroundError;

/// In-container path the exchange directory is bind-mounted to.
pub const CONTAINER_MOUNT: &str = "/isolated/tmp";

/// Default retention window for saved files: seven days.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// Maximum accepted source length in bytes (1 MiB).
pub const MAX_CODE_LEN: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct PlaygroundConfig {
    /// Image invoked for the compile stage.
    pub compiler_image: String,
    /// Image invoked for the run stage.
    pub interpreter_image: String,
    /// Host-side exchange directory, bind-mounted into both images.
    pub exchange_dir: PathBuf,
    /// Directory holding saved-file JSON records.
    pub files_dir: PathBuf,
    /// Forced target platform (e.g. "linux/amd64" on arm64 hosts), if any.
    pub platform: Option<String>,
    /// Extension of staged source artifacts.
    pub source_ext: String,
    /// Extension the compiler gives the produced artifact.
    pub target_ext: String,
    /// How long an untouched saved file survives.
    pub retention_window: Duration,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            compiler_image: "plume-compiler".to_string(),
            interpreter_image: "plume-interpreter".to_string(),
            exchange_dir: PathBuf::from("server/tmp"),
            files_dir: PathBuf::from("server/files"),
            platform: None,
            source_ext: "plm".to_string(),
            target_ext: "bin".to_string(),
            retention_window: DEFAULT_RETENTION,
        }
    }
}

impl PlaygroundConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the environment variables the original
    /// deployment used: `SERVER_PATH` (root containing `tmp/` and `files/`),
    /// `PLATFORM` (`arm64` forces amd64 emulation), and optional
    /// `COMPILER_IMAGE` / `INTERPRETER_IMAGE` overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(server_path) = env::var("SERVER_PATH") {
            config = config.with_server_path(server_path);
        }
        if let Ok(platform) = env::var("PLATFORM") {
            if platform == "arm64" {
                config.platform = Some("linux/amd64".to_string());
            }
        }
        if let Ok(image) = env::var("COMPILER_IMAGE") {
            config.compiler_image = image;
        }
        if let Ok(image) = env::var("INTERPRETER_IMAGE") {
            config.interpreter_image = image;
        }

        config
    }

    /// Root both the exchange and files directories under `server_path`.
    pub fn with_server_path(mut self, server_path: impl AsRef<Path>) -> Self {
        self.exchange_dir = server_path.as_ref().join("tmp");
        self.files_dir = server_path.as_ref().join("files");
        self
    }

    pub fn with_images(
        mut self,
        compiler: impl Into<String>,
        interpreter: impl Into<String>,
    ) -> Self {
        self.compiler_image = compiler.into();
        self.interpreter_image = interpreter.into();
        self
    }

    pub fn with_exchange_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exchange_dir = dir.into();
        self
    }

    pub fn with_files_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.files_dir = dir.into();
        self
    }

    pub fn with_platform(mut self, platform: Option<String>) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_retention_window(mut self, window: Duration) -> Self {
        self.retention_window = window;
        self
    }

    /// The name a staged or compiled artifact carries in the exchange
    /// directory: `{identity}.{ext}`.
    pub fn artifact_name(identity: &uuid::Uuid, ext: &str) -> String {
        format!("{}.{}", identity, ext)
    }

    /// The path a stage passes to the container: relative to the mount,
    /// the way the images expect it (`tmp/{identity}.{ext}`).
    pub fn container_arg(identity: &uuid::Uuid, ext: &str) -> String {
        format!("tmp/{}", Self::artifact_name(identity, ext))
    }

    pub fn validate(&self) -> Result<(), PlaygroundError> {
        if self.compiler_image.trim().is_empty() {
            return Err(PlaygroundError::ConfigError(
                "compiler image name must not be empty".to_string(),
            ));
        }
        if self.interpreter_image.trim().is_empty() {
            return Err(PlaygroundError::ConfigError(
                "interpreter image name must not be empty".to_string(),
            ));
        }
        for ext in [&self.source_ext, &self.target_ext] {
            if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(PlaygroundError::ConfigError(format!(
                    "artifact extension '{}' must be non-empty and alphanumeric",
                    ext
                )));
            }
        }
        if self.retention_window.is_zero() {
            return Err(PlaygroundError::ConfigError(
                "retention window must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
