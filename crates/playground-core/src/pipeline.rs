//! Two-stage compile-then-run orchestration over a container runner.
//!
//! The pipeline is a short linear state machine: stage the source, invoke
//! the compiler image, check that a compiled artifact actually appeared,
//! invoke the interpreter image, and map the exit codes onto a
//! [`PipelineOutcome`]. The first nonzero exit short-circuits the rest.
//! Every transition deletes the artifact it consumed regardless of branch,
//! including when the runner itself fails, so the exchange directory never
//! accumulates leftovers from finished requests.

use std::sync::Arc;
use uuid::Uuid;

use crate::config::PlaygroundConfig;
use crate::core_types::{ExecutionRequest, PipelineOutcome};
use crate::errors::PlaygroundError;
use crate::runner::ContainerRunner;
use crate::staging::ArtifactStager;

pub struct Pipeline {
    runner: Arc<dyn ContainerRunner>,
    stager: ArtifactStager,
    config: PlaygroundConfig,
}

impl Pipeline {
    pub fn new(runner: Arc<dyn ContainerRunner>, config: PlaygroundConfig) -> Self {
        let stager = ArtifactStager::new(config.exchange_dir.clone());
        Self {
            runner,
            stager,
            config,
        }
    }

    pub fn config(&self) -> &PlaygroundConfig {
        &self.config
    }

    /// Run the full pipeline for one request.
    ///
    /// Compile and run are strictly sequential within the request; distinct
    /// requests may execute concurrently, and distinct identities never
    /// collide on artifact names. Two concurrent requests supplying the
    /// *same* identity can interleave each other's writes and deletes:
    /// there is no lock, and callers are expected to keep supplied
    /// identities unique.
    pub async fn compile_and_run(
        &self,
        request: ExecutionRequest,
    ) -> Result<PipelineOutcome, PlaygroundError> {
        let identity = request.identity.unwrap_or_else(Uuid::new_v4);
        log::info!("Pipeline request {} starting compile stage", identity);

        let source_path = self
            .stager
            .stage(&identity, &self.config.source_ext, &request.code)
            .await?;

        let compile_arg = PlaygroundConfig::container_arg(&identity, &self.config.source_ext);
        let compile = self
            .runner
            .run(&self.config.compiler_image, &[compile_arg])
            .await;
        // The staged source is consumed by the compile stage whatever its
        // result was, runner failure included.
        self.stager.unstage(&source_path).await;
        let compile = compile?;

        if !compile.success() {
            log::info!(
                "Pipeline request {} failed at compile (exit {})",
                identity,
                compile.exit_code
            );
            return Ok(PipelineOutcome::CompileFailure {
                exit_code: compile.exit_code,
                diagnostic: compile.diagnostic().to_string(),
            });
        }

        let artifact_path = self
            .stager
            .artifact_path(&identity, &self.config.target_ext);
        if !self.stager.exists(&artifact_path).await {
            // A compiler that reports success but emits nothing is a
            // toolchain inconsistency; the run stage is never attempted.
            log::error!(
                "Pipeline request {} compiled cleanly but produced no artifact",
                identity
            );
            return Ok(PipelineOutcome::ArtifactMissing);
        }

        log::info!("Pipeline request {} starting run stage", identity);
        let run_arg = PlaygroundConfig::container_arg(&identity, &self.config.target_ext);
        let run = self
            .runner
            .run(&self.config.interpreter_image, &[run_arg])
            .await;
        self.stager.unstage(&artifact_path).await;
        let run = run?;

        if !run.success() {
            log::info!(
                "Pipeline request {} failed at run (exit {})",
                identity,
                run.exit_code
            );
            return Ok(PipelineOutcome::RunFailure {
                exit_code: run.exit_code,
                diagnostic: run.diagnostic().to_string(),
            });
        }

        log::info!("Pipeline request {} completed", identity);
        Ok(PipelineOutcome::Success { output: run.stdout })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RunnerError;
    use crate::runner::ContainerResult;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// What a fake stage does when invoked.
    #[derive(Clone)]
    enum Behavior {
        /// Exit 0 with the given stdout; the compile stage also drops the
        /// expected `.bin` artifact into the exchange directory unless
        /// `emit_artifact` is false.
        Succeed { stdout: String, emit_artifact: bool },
        Fail { exit_code: i64, stderr: String },
        Infra,
    }

    struct FakeRunner {
        exchange_dir: PathBuf,
        compile: Behavior,
        run: Behavior,
        invocations: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        fn new(exchange_dir: PathBuf, compile: Behavior, run: Behavior) -> Self {
            Self {
                exchange_dir,
                compile,
                run,
                invocations: Mutex::new(Vec::new()),
            }
        }

        fn invocations(&self) -> Vec<String> {
            self.invocations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContainerRunner for FakeRunner {
        async fn run(
            &self,
            image: &str,
            args: &[String],
        ) -> Result<ContainerResult, RunnerError> {
            self.invocations.lock().unwrap().push(image.to_string());

            let behavior = if image == "plume-compiler" {
                self.compile.clone()
            } else {
                self.run.clone()
            };

            match behavior {
                Behavior::Succeed {
                    stdout,
                    emit_artifact,
                } => {
                    if image == "plume-compiler" && emit_artifact {
                        let staged = args[0].strip_prefix("tmp/").unwrap();
                        let produced = staged.replace(".plm", ".bin");
                        tokio::fs::write(self.exchange_dir.join(produced), b"bytecode")
                            .await
                            .unwrap();
                    }
                    Ok(ContainerResult {
                        exit_code: 0,
                        stdout,
                        stderr: String::new(),
                    })
                }
                Behavior::Fail { exit_code, stderr } => Ok(ContainerResult {
                    exit_code,
                    stdout: String::new(),
                    stderr,
                }),
                Behavior::Infra => Err(RunnerError::RelayError("daemon unreachable".into())),
            }
        }
    }

    fn pipeline(
        dir: &tempfile::TempDir,
        compile: Behavior,
        run: Behavior,
    ) -> (Arc<FakeRunner>, Pipeline) {
        let config = PlaygroundConfig::default().with_exchange_dir(dir.path().to_path_buf());
        let runner = Arc::new(FakeRunner::new(dir.path().to_path_buf(), compile, run));
        (runner.clone(), Pipeline::new(runner, config))
    }

    fn exchange_is_empty(dir: &tempfile::TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    fn compile_ok() -> Behavior {
        Behavior::Succeed {
            stdout: String::new(),
            emit_artifact: true,
        }
    }

    #[tokio::test]
    async fn hello_world_succeeds_with_exact_output() {
        let dir = tempfile::tempdir().unwrap();
        let (_, pipeline) = pipeline(
            &dir,
            compile_ok(),
            Behavior::Succeed {
                stdout: "Hello, world!\n".into(),
                emit_artifact: false,
            },
        );

        let outcome = pipeline
            .compile_and_run(ExecutionRequest::new("println(\"Hello, world!\")"))
            .await
            .unwrap();

        match outcome {
            PipelineOutcome::Success { output } => assert!(output.contains("Hello, world!")),
            other => panic!("expected success, got {:?}", other),
        }
        assert!(exchange_is_empty(&dir));
    }

    #[tokio::test]
    async fn deterministic_pipeline_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (_, pipeline) = pipeline(
            &dir,
            compile_ok(),
            Behavior::Succeed {
                stdout: "42\n".into(),
                emit_artifact: false,
            },
        );

        let first = pipeline
            .compile_and_run(ExecutionRequest::new("println(42)"))
            .await
            .unwrap();
        let second = pipeline
            .compile_and_run(ExecutionRequest::new("println(42)"))
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn compile_failure_never_invokes_run_stage() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, pipeline) = pipeline(
            &dir,
            Behavior::Fail {
                exit_code: 1,
                stderr: "syntax error at line 1".into(),
            },
            compile_ok(),
        );

        let outcome = pipeline
            .compile_and_run(ExecutionRequest::new("prinln(oops"))
            .await
            .unwrap();

        match outcome {
            PipelineOutcome::CompileFailure {
                exit_code,
                diagnostic,
            } => {
                assert_eq!(exit_code, 1);
                assert!(!diagnostic.is_empty());
            }
            other => panic!("expected compile failure, got {:?}", other),
        }
        assert_eq!(runner.invocations(), vec!["plume-compiler"]);
        assert!(exchange_is_empty(&dir));
    }

    #[tokio::test]
    async fn run_failure_carries_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let (_, pipeline) = pipeline(
            &dir,
            compile_ok(),
            Behavior::Fail {
                exit_code: 3,
                stderr: "panic: index out of range".into(),
            },
        );

        let outcome = pipeline
            .compile_and_run(ExecutionRequest::new("boom()"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PipelineOutcome::RunFailure {
                exit_code: 3,
                diagnostic: "panic: index out of range".into(),
            }
        );
        assert!(exchange_is_empty(&dir));
    }

    #[tokio::test]
    async fn silent_compiler_yields_artifact_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, pipeline) = pipeline(
            &dir,
            Behavior::Succeed {
                stdout: String::new(),
                emit_artifact: false,
            },
            compile_ok(),
        );

        let outcome = pipeline
            .compile_and_run(ExecutionRequest::new("println(1)"))
            .await
            .unwrap();

        assert_eq!(outcome, PipelineOutcome::ArtifactMissing);
        // The run stage was never attempted.
        assert_eq!(runner.invocations(), vec!["plume-compiler"]);
        assert!(exchange_is_empty(&dir));
    }

    #[tokio::test]
    async fn artifact_deleted_externally_between_stages_is_not_a_crash() {
        // Equivalent to the silent-compiler case from the pipeline's point
        // of view: the artifact existed conceptually but is gone by the
        // time the existence check runs.
        let dir = tempfile::tempdir().unwrap();
        let (_, pipeline) = pipeline(
            &dir,
            Behavior::Succeed {
                stdout: String::new(),
                emit_artifact: false,
            },
            compile_ok(),
        );

        let outcome = pipeline
            .compile_and_run(
                ExecutionRequest::new("println(1)").with_identity(Uuid::new_v4()),
            )
            .await
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::ArtifactMissing);
    }

    #[tokio::test]
    async fn runner_infrastructure_error_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let (_, pipeline) = pipeline(&dir, Behavior::Infra, compile_ok());

        let result = pipeline
            .compile_and_run(ExecutionRequest::new("println(1)"))
            .await;

        assert!(matches!(
            result,
            Err(PlaygroundError::RunnerError(RunnerError::RelayError(_)))
        ));
        // The staged source must not leak even though the runner died.
        assert!(exchange_is_empty(&dir));
    }

    #[tokio::test]
    async fn run_stage_infrastructure_error_cleans_up_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let (_, pipeline) = pipeline(&dir, compile_ok(), Behavior::Infra);

        let result = pipeline
            .compile_and_run(ExecutionRequest::new("println(1)"))
            .await;

        assert!(result.is_err());
        assert!(exchange_is_empty(&dir));
    }
}
