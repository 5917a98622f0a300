//! Failure taxonomy for the generation pipeline.
//!
//! Every layer converts its failures into one of these values instead of
//! aborting. Only the orchestrator decides whether a failure is retried or
//! terminal.

use thiserror::Error;

/// Failures talking to the text-generation backend.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The backend could not be reached or answered with a non-success status.
    #[error("backend unreachable at {endpoint}: {detail}")]
    BackendUnreachable { endpoint: String, detail: String },

    /// The backend answered but produced no usable text.
    #[error("backend returned an empty generation")]
    EmptyGeneration,
}

/// Failures running the final command.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The shell could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the child failed after it started.
    #[error("command terminated abnormally: {0}")]
    Abnormal(#[source] std::io::Error),
}

/// Terminal outcomes surfaced by the orchestrator.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Generation(#[from] GenerationError),

    #[error("lint rejected the command: {0}")]
    LintRejected(String),

    #[error("command timed out after {0} seconds")]
    ExecutionTimeout(u64),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("failed to produce a runnable command")]
    Exhausted,
}

/// Non-fatal configuration problems. Reported to the user, then defaults apply.
#[derive(Error, Debug)]
pub enum ConfigurationWarning {
    #[error("no configuration file at {0}, using built-in defaults")]
    Missing(String),

    #[error("could not parse {path}, using built-in defaults: {detail}")]
    Malformed { path: String, detail: String },

    #[error("could not read {path}, using built-in defaults: {detail}")]
    Unreadable { path: String, detail: String },
}
