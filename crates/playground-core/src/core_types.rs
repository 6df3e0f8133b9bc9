//! Shared types flowing through the execution pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One inbound compile-and-run request.
///
/// When `identity` is absent a fresh v4 UUID is minted for the request, so
/// concurrent anonymous requests can never collide on artifact names. A
/// caller-supplied identity names the artifacts deterministically; reusing
/// the same identity from two concurrent requests is an unguarded hazard
/// that callers must avoid.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub code: String,
    #[serde(default)]
    pub identity: Option<Uuid>,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: Uuid) -> Self {
        self.identity = Some(identity);
        self
    }
}

/// Terminal state of one pipeline request. Exactly one variant is produced
/// per request; user-code failures live here rather than in the error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Both stages exited zero; `output` is the interpreter's full stdout.
    Success { output: String },
    /// The compiler exited nonzero; `diagnostic` is its output verbatim.
    CompileFailure { exit_code: i64, diagnostic: String },
    /// The interpreter exited nonzero.
    RunFailure { exit_code: i64, diagnostic: String },
    /// The compiler reported success but produced no artifact. This is a
    /// toolchain inconsistency, not a user-code defect, and is reported
    /// distinctly from a compile failure.
    ArtifactMissing,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success { .. })
    }
}

/// A persisted editor file, stored as `{id}.json` under the files root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SavedFile {
    pub id: Uuid,
    pub file_name: String,
    pub code: String,
    /// Last-modified timestamp in epoch milliseconds. The retention sweeper
    /// compares the on-disk mtime, not this field, when deciding deletion.
    pub last_modified: i64,
}
