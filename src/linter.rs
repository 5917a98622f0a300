//! Static analysis of candidate commands with PSScriptAnalyzer.
//!
//! The candidate is written to a scratch `.ps1` file, the analyzer is run
//! against it through `pwsh`, and its JSON findings are turned into a
//! [`LintVerdict`].
//!
//! # Fail-open
//!
//! If the analyzer cannot be run at all (no `pwsh`, module not installed,
//! scratch file cannot be written), the verdict is [`LintVerdict::Pass`]. A
//! missing linter must never block execution outright; only real findings do.

use crate::activity_log::ActivityLog;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit code the analyzer script uses to report that the module is missing.
const MODULE_MISSING_EXIT: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LintVerdict {
    Pass,
    Fail(Vec<String>),
}

impl LintVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, LintVerdict::Pass)
    }

    /// Findings joined with `"; "`, or `None` on a pass.
    pub fn summary(&self) -> Option<String> {
        match self {
            LintVerdict::Pass => None,
            LintVerdict::Fail(messages) => Some(messages.join("; ")),
        }
    }
}

/// Turns raw analyzer output into a verdict.
///
/// Empty output, `null`, `[]` and `{}` mean no findings. A JSON object or
/// array of objects fails when at least one `Message` is present. Output that
/// is not JSON is itself the error message.
pub fn parse_findings(output: &str) -> LintVerdict {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return LintVerdict::Pass;
    }

    let messages: Vec<String> = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Null) => Vec::new(),
        Ok(Value::Array(findings)) => findings.iter().filter_map(finding_message).collect(),
        Ok(finding @ Value::Object(_)) => finding_message(&finding).into_iter().collect(),
        Ok(_) | Err(_) => return LintVerdict::Fail(vec![trimmed.to_string()]),
    };

    if messages.is_empty() {
        LintVerdict::Pass
    } else {
        LintVerdict::Fail(messages)
    }
}

fn finding_message(finding: &Value) -> Option<String> {
    finding
        .get("Message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Runs the external analyzer against a script file.
#[async_trait]
pub trait AnalyzerRunner: Send + Sync {
    /// Returns the analyzer's combined stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns an error when the analyzer cannot be run at all.
    async fn analyze(&self, script: &Path) -> Result<String>;
}

/// PSScriptAnalyzer invoked through a non-interactive `pwsh`.
pub struct ScriptAnalyzer {
    program: String,
}

impl ScriptAnalyzer {
    pub fn new() -> Self {
        Self::with_program("pwsh")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn analyzer_script(script: &Path) -> String {
        let path = script.to_string_lossy().replace('\'', "''");
        format!(
            "if (-not (Get-Module -ListAvailable -Name PSScriptAnalyzer)) {{ exit {} }}; \
             Invoke-ScriptAnalyzer -Path '{}' | Select-Object RuleName,Severity,Message | ConvertTo-Json -Compress",
            MODULE_MISSING_EXIT, path
        )
    }
}

impl Default for ScriptAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalyzerRunner for ScriptAnalyzer {
    async fn analyze(&self, script: &Path) -> Result<String> {
        let output = Command::new(&self.program)
            .args(["-NoProfile", "-NonInteractive", "-Command"])
            .arg(Self::analyzer_script(script))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| anyhow!("could not run '{}': {}", self.program, e))?;

        if output.status.code() == Some(MODULE_MISSING_EXIT) {
            return Err(anyhow!("PSScriptAnalyzer module is not installed"));
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(combined)
    }
}

/// Whether the analyzer's host program is on `PATH`.
pub fn analyzer_available(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Anything that can judge a candidate.
#[async_trait]
pub trait Linter: Send + Sync {
    async fn lint(&self, candidate: &str) -> LintVerdict;
}

pub struct StaticLinter {
    runner: Box<dyn AnalyzerRunner>,
    log: ActivityLog,
}

impl StaticLinter {
    pub fn new(log: ActivityLog) -> Self {
        Self::with_runner(Box::new(ScriptAnalyzer::new()), log)
    }

    /// Creates a linter with an injected analyzer (for testing).
    pub fn with_runner(runner: Box<dyn AnalyzerRunner>, log: ActivityLog) -> Self {
        Self { runner, log }
    }

    async fn try_lint(&self, candidate: &str) -> Result<LintVerdict> {
        // Removed when dropped, whichever way this function exits.
        let mut scratch = tempfile::Builder::new()
            .prefix("psgen_lint_")
            .suffix(".ps1")
            .tempfile()?;
        scratch.write_all(candidate.as_bytes())?;
        scratch.flush()?;

        debug!("Linting {:?}", scratch.path());
        let output = self.runner.analyze(scratch.path()).await?;
        Ok(parse_findings(&output))
    }
}

#[async_trait]
impl Linter for StaticLinter {
    async fn lint(&self, candidate: &str) -> LintVerdict {
        let verdict = match self.try_lint(candidate).await {
            Ok(verdict) => verdict,
            Err(e) => {
                // Intentional: an unavailable analyzer lets the command through.
                warn!("Linter unavailable, treating as pass: {}", e);
                self.log.record(&format!("lint: analyzer unavailable ({}), pass", e));
                return LintVerdict::Pass;
            }
        };

        match verdict.summary() {
            None => self.log.record("lint: pass"),
            Some(summary) => self.log.record(&format!("lint: fail ({})", summary)),
        }
        verdict
    }
}
