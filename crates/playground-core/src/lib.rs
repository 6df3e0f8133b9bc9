//! Core library for the Plume playground sandbox-execution service.
//!
//! Untrusted source text arrives from the web layer, gets staged into a
//! shared exchange directory, and is pushed through two isolated container
//! stages (compile, then run) whose output and exit status are captured
//! and normalized into a single outcome. No user code ever touches the
//! host directly, and no transient artifact survives a finished request.
//!
//! # Architecture Overview
//!
//! - **Container runner**: invokes a named image and resolves one complete
//!   result per call, via the Docker daemon or a relay-process fallback
//! - **Artifact stager**: filename-addressed writes and idempotent removal
//!   inside the bind-mounted exchange directory
//! - **Pipeline**: sequences compile and run, short-circuits on the first
//!   failure, and guarantees cleanup on every path
//! - **Saved-file store**: persisted editor files as JSON records
//! - **Retention sweeper**: a time-ordered expiry index that deletes saved
//!   files once they have gone untouched for the retention window
//! - **Configuration**: explicit, injected deployment settings (images,
//!   exchange root, platform override, toolchain extensions)

pub mod config;
pub mod core_types;
pub mod errors;
pub mod files;
pub mod pipeline;
pub mod retention;
pub mod runner;
pub mod staging;

pub use config::PlaygroundConfig;
pub use core_types::{ExecutionRequest, PipelineOutcome, SavedFile};
pub use errors::{PlaygroundError, RunnerError};
pub use files::{FileStore, SaveFileRequest};
pub use pipeline::Pipeline;
pub use retention::RetentionSweeper;
pub use runner::{ContainerResult, ContainerRunner, DockerRunner, RelayRunner};
