//! Process execution for single tools and multi-step chains.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};
use umcp_policy::{CommandValidator, Sandbox, SandboxError};
use umcp_primitives::{Catalog, CatalogSettings, ToolDefinition};
use umcp_telemetry::Tracer;
use umcp_tools::{BuildError, CommandBuilder, parse_output};

/// Marker appended to output cut at the size limit.
pub const TRUNCATION_MARKER: &str = "\n... (output truncated)";

/// Result alias for single-command execution.
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors produced while running a tool command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command line could not be built.
    #[error("failed to build command: {0}")]
    Build(#[from] BuildError),

    /// The sandbox rejected the command line.
    #[error("command blocked by security policy: {0}")]
    Sandbox(#[from] SandboxError),

    /// The working directory could not be resolved.
    #[error("failed to resolve working directory: {0}")]
    WorkingDir(#[source] std::io::Error),

    /// The process could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// Program that failed to start.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the process failed.
    #[error("failed waiting for command: {0}")]
    Wait(#[source] std::io::Error),

    /// The process exceeded its deadline and was killed.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// The process exited unsuccessfully.
    #[error("{}", describe_exit(*exit_code))]
    ExecutionFailed {
        /// Exit code, absent when terminated by a signal.
        exit_code: Option<i32>,
        /// Captured output.
        output: String,
    },
}

impl ExecError {
    /// Returns output captured before the failure, if any.
    #[must_use]
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Self::ExecutionFailed { output, .. } if !output.is_empty() => Some(output),
            _ => None,
        }
    }
}

fn describe_exit(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("command failed with exit code {code}"),
        None => "command terminated by signal".to_owned(),
    }
}

/// A chain step failed; earlier steps' output is preserved.
#[derive(Debug, Error)]
#[error("chain step {step} failed: {source}")]
pub struct ChainError {
    step: usize,
    output: String,
    #[source]
    source: ExecError,
}

impl ChainError {
    /// Returns the 1-based index of the failing step.
    #[must_use]
    pub const fn step(&self) -> usize {
        self.step
    }

    /// Returns the newline-joined output of the steps that succeeded.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Returns the failure of the step.
    #[must_use]
    pub fn cause(&self) -> &ExecError {
        &self.source
    }
}

/// Result alias for chain execution.
pub type ChainResult<T> = Result<T, ChainError>;

struct ProcessOutput {
    text: String,
    exit_code: Option<i32>,
    success: bool,
}

/// Runs validated command lines as child processes.
///
/// Every invocation is reported to the tracer.
#[derive(Debug, Clone)]
pub struct Executor {
    tracer: Arc<Tracer>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(Arc::new(Tracer::disabled()))
    }
}

impl Executor {
    /// Creates an executor reporting to `tracer`.
    #[must_use]
    pub fn new(tracer: Arc<Tracer>) -> Self {
        Self { tracer }
    }

    /// Returns the tracer observing this executor.
    #[must_use]
    pub fn tracer(&self) -> &Arc<Tracer> {
        &self.tracer
    }

    /// Builds, validates, and runs a tool against its catalog's policy.
    ///
    /// # Errors
    ///
    /// See [`Executor::execute_with`].
    pub async fn execute(
        &self,
        catalog: &Catalog,
        tool: &ToolDefinition,
        values: &Map<String, Value>,
    ) -> ExecResult<String> {
        let sandbox = Sandbox::new(catalog.security().clone());
        self.execute_with(&sandbox, catalog, tool, values).await
    }

    /// Builds, validates with `validator`, and runs a tool.
    ///
    /// Output above the policy's size limit is truncated. Successful output is
    /// reinterpreted by the tool's output spec; a parse failure falls back to
    /// the raw text.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Build`] or [`ExecError::Sandbox`] before anything
    /// runs, [`ExecError::Timeout`] when the deadline passes, and
    /// [`ExecError::ExecutionFailed`] with the captured output on a non-zero
    /// exit.
    pub async fn execute_with(
        &self,
        validator: &dyn CommandValidator,
        catalog: &Catalog,
        tool: &ToolDefinition,
        values: &Map<String, Value>,
    ) -> ExecResult<String> {
        let tokens = CommandBuilder::new(catalog.settings(), tool).build(values)?;
        validator.validate(&tokens)?;

        let mut process = self.run(&tokens, catalog.settings()).await?;
        let limit = usize::try_from(catalog.security().max_output_size()).unwrap_or(usize::MAX);
        truncate_output(&mut process.text, limit);

        if !process.success {
            return Err(ExecError::ExecutionFailed {
                exit_code: process.exit_code,
                output: process.text,
            });
        }

        match parse_output(&process.text, tool.output()) {
            Ok(parsed) => Ok(parsed),
            Err(err) => {
                warn!(tool = %tool.name(), error = %err, "failed to parse output, returning raw");
                Ok(process.text)
            }
        }
    }

    /// Runs a tool's chain steps in order.
    ///
    /// Each step runs the catalog base command, the step sub-command, and its
    /// argument templates with every `${name}` placeholder replaced. Chains
    /// bypass sandbox validation and output parsing.
    ///
    /// # Errors
    ///
    /// Returns a [`ChainError`] for the first step that fails, carrying the
    /// output of the steps before it.
    pub async fn execute_chain(
        &self,
        catalog: &Catalog,
        tool: &ToolDefinition,
        values: &Map<String, Value>,
    ) -> ChainResult<String> {
        let settings = catalog.settings();
        let mut outputs: Vec<String> = Vec::with_capacity(tool.chain().len());

        for (index, step) in tool.chain().iter().enumerate() {
            let number = index + 1;
            let mut tokens = vec![settings.command().to_owned()];
            tokens.extend(step.command().map(str::to_owned));
            tokens.extend(step.arguments().iter().map(|arg| substitute(arg, values)));
            debug!(tool = %tool.name(), step = number, command = ?tokens, "executing chain step");

            let failure = match self.run(&tokens, settings).await {
                Ok(process) if process.success => {
                    outputs.push(process.text);
                    continue;
                }
                Ok(process) => ExecError::ExecutionFailed {
                    exit_code: process.exit_code,
                    output: process.text,
                },
                Err(err) => err,
            };
            return Err(ChainError {
                step: number,
                output: outputs.join("\n"),
                source: failure,
            });
        }

        Ok(outputs.join("\n"))
    }

    async fn run(&self, tokens: &[String], settings: &CatalogSettings) -> ExecResult<ProcessOutput> {
        let Some((program, args)) = tokens.split_first() else {
            return Err(ExecError::Sandbox(SandboxError::EmptyCommand));
        };
        let working_dir = resolve_working_dir(settings)?;
        let timeout = settings.effective_timeout();

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for entry in settings.environment() {
            match entry.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    command.env(key, value);
                }
                _ => warn!(entry = %entry, "ignoring malformed environment entry"),
            }
        }

        debug!(command = ?tokens, working_dir = %working_dir.display(), "executing command");
        self.tracer
            .trace_command(tokens, &working_dir, settings.environment())
            .await;

        let child = command.spawn().map_err(|source| ExecError::Spawn {
            command: program.clone(),
            source,
        });
        let child = match child {
            Ok(child) => child,
            Err(err) => {
                self.tracer.trace_output("", None, Some(&err.to_string())).await;
                return Err(err);
            }
        };

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                let err = ExecError::Wait(source);
                self.tracer.trace_output("", None, Some(&err.to_string())).await;
                return Err(err);
            }
            Err(_) => {
                let err = ExecError::Timeout(timeout);
                self.tracer.trace_output("", None, Some(&err.to_string())).await;
                return Err(err);
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.stderr.is_empty() {
            text.push('\n');
            text.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        let exit_code = output.status.code();
        let success = output.status.success();
        let error = (!success).then(|| describe_exit(exit_code));
        self.tracer.trace_output(&text, exit_code, error.as_deref()).await;

        Ok(ProcessOutput {
            text,
            exit_code,
            success,
        })
    }
}

fn resolve_working_dir(settings: &CatalogSettings) -> ExecResult<PathBuf> {
    match settings.working_dir() {
        Some(dir) => Ok(dir.to_path_buf()),
        None => std::env::current_dir().map_err(ExecError::WorkingDir),
    }
}

/// Cuts `text` to at most `limit` bytes on a character boundary and appends
/// [`TRUNCATION_MARKER`].
fn truncate_output(text: &mut String, limit: usize) {
    if text.len() <= limit {
        return;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text.push_str(TRUNCATION_MARKER);
}

fn substitute(template: &str, values: &Map<String, Value>) -> String {
    values.iter().fold(template.to_owned(), |acc, (key, value)| {
        let replacement = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        acc.replace(&format!("${{{key}}}"), &replacement)
    })
}
