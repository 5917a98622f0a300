//! psgen - plain-language requests to PowerShell commands.
//!
//! This library provides the pipeline behind the `psgen` binary. It supports:
//!
//! - **Command generation** via a local (`/api/generate`) or hosted
//!   (`/chat/completions`) text-generation backend
//! - **Self-validation** by asking the backend to double-check its answer
//! - **Static analysis** with PSScriptAnalyzer
//! - **Execution** with live output and a hard timeout
//!
//! # Architecture
//!
//! - [`config`] - Configuration file, environment overrides, secret masking
//! - [`backend`] - Backend variants and the [`backend::TextGenerator`] capability
//! - [`http_client`] - HTTP client abstraction
//! - [`normalizer`] - Code-fence stripping
//! - [`validator`] - Advisory second-opinion check
//! - [`linter`] - Scratch-file linting, fail-open
//! - [`executor`] - Streaming execution with timeout
//! - [`orchestrator`] - The two-attempt state machine
//! - [`activity_log`] - Append-only activity log
//! - [`prompts`] - Default prompt templates
//! - [`cli`] - Argument parsing
//! - [`error`] - Failure taxonomy
//!
//! # Example
//!
//! ```ignore
//! use psgen::activity_log::ActivityLog;
//! use psgen::backend::BackendClient;
//! use psgen::config::Config;
//! use psgen::executor::CommandExecutor;
//! use psgen::linter::StaticLinter;
//! use psgen::orchestrator::{Orchestrator, PipelineSettings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (config, _) = Config::load();
//!     let log = ActivityLog::disabled();
//!     let generator = BackendClient::new(config.backend(), log.clone());
//!     let linter = StaticLinter::new(log.clone());
//!     let executor = CommandExecutor::new(log.clone());
//!
//!     let orchestrator = Orchestrator::new(
//!         &generator,
//!         &linter,
//!         &executor,
//!         PipelineSettings::default(),
//!         &log,
//!     );
//!     let report = orchestrator
//!         .run("show the current date", &mut std::io::stdout(), &mut std::io::stderr())
//!         .await?;
//!     std::process::exit(report.exit_code);
//! }
//! ```

pub mod activity_log;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod http_client;
pub mod linter;
pub mod normalizer;
pub mod orchestrator;
pub mod prompts;
pub mod validator;
