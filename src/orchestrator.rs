//! The generate → validate → lint → execute pipeline.
//!
//! At most [`MAX_ATTEMPTS`] attempts run. Each attempt starts from scratch:
//!
//! 1. **Generate** a candidate from the request. Nothing usable means retry,
//!    or failure on the last attempt.
//! 2. **Validate** it with a second backend round trip. Advisory only: if
//!    validation yields nothing, the generated candidate is kept.
//! 3. **Lint** the working candidate. Findings mean retry, or failure on the
//!    last attempt. A pass ends the loop.
//!
//! The first candidate to pass linting is executed immediately. Candidates
//! from different attempts are never compared or merged.

use crate::activity_log::ActivityLog;
use crate::backend::TextGenerator;
use crate::error::{GenerationError, PipelineError};
use crate::executor::CommandRunner;
use crate::linter::Linter;
use crate::normalizer::normalize;
use crate::prompts::{self, SENTENCE};
use crate::validator::{CommandValidator, Validation};
use anyhow::Result;
use std::io::Write;
use tracing::{info, warn};

pub const MAX_ATTEMPTS: u8 = 2;

/// Exit code for every pipeline failure.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Prompt templates and display options for a run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub generation_prompt: String,
    pub validation_prompt: String,
    pub trace: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            generation_prompt: prompts::DEFAULT_GENERATION_PROMPT.to_string(),
            validation_prompt: prompts::DEFAULT_VALIDATION_PROMPT.to_string(),
            trace: false,
        }
    }
}

/// What happened during one attempt. Used for tracing only.
#[derive(Debug, Clone, Default)]
pub struct AttemptResult {
    pub attempt: u8,
    pub generation_prompt: String,
    pub generation_response: Option<String>,
    /// Candidate after validation, if generation produced one.
    pub candidate: Option<String>,
    pub validation: Option<Validation>,
    pub validation_altered: bool,
    pub lint_passed: bool,
    pub lint_errors: Option<String>,
}

/// Summary of a whole run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub exit_code: i32,
    pub attempts: Vec<AttemptResult>,
    /// The command that was executed, if any.
    pub executed: Option<String>,
}

pub struct Orchestrator<'a> {
    generator: &'a dyn TextGenerator,
    linter: &'a dyn Linter,
    runner: &'a dyn CommandRunner,
    settings: PipelineSettings,
    log: &'a ActivityLog,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        generator: &'a dyn TextGenerator,
        linter: &'a dyn Linter,
        runner: &'a dyn CommandRunner,
        settings: PipelineSettings,
        log: &'a ActivityLog,
    ) -> Self {
        Self {
            generator,
            linter,
            runner,
            settings,
            log,
        }
    }

    /// Runs the pipeline for `request`, writing progress to `out` and
    /// warnings and errors to `err`.
    ///
    /// # Errors
    ///
    /// Only fails when writing to `out` or `err` fails. Pipeline failures are
    /// reported through [`RunReport::exit_code`].
    pub async fn run<W1: Write, W2: Write>(
        &self,
        request: &str,
        out: &mut W1,
        err: &mut W2,
    ) -> Result<RunReport> {
        info!("Processing request: {}", request);
        self.log.record(&format!("request: {}", request));

        let mut attempts = Vec::new();
        let mut winner = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let last = attempt == MAX_ATTEMPTS;
            writeln!(out, "🤖 Generating command (attempt {}/{})...", attempt, MAX_ATTEMPTS)?;

            let (record, outcome) = self.run_attempt(attempt, request).await;
            attempts.push(record);

            match outcome {
                Ok(candidate) => {
                    winner = Some(candidate);
                    break;
                }
                Err(failure) => {
                    warn!("Attempt {} failed: {}", attempt, failure);
                    self.log.record(&format!("attempt {} failed: {}", attempt, failure));
                    if last {
                        writeln!(err, "❌ {}", failure)?;
                    } else {
                        writeln!(err, "⚠️  {}. Retrying...", failure)?;
                    }
                }
            }
        }

        if self.settings.trace {
            if let Some(record) = attempts.last() {
                Self::write_trace(record, out)?;
            }
        }

        let Some(command) = winner else {
            // The last attempt's failure was already printed as the terminal line.
            self.log.record(&PipelineError::Exhausted.to_string());
            return Ok(RunReport {
                exit_code: FAILURE_EXIT_CODE,
                attempts,
                executed: None,
            });
        };

        writeln!(out, "▶️  Executing: {}", command)?;
        out.flush()?;

        let exit_code = match self.runner.execute(&command).await {
            Ok(outcome) if outcome.timed_out => {
                let timeout = PipelineError::ExecutionTimeout(crate::executor::DEFAULT_TIMEOUT.as_secs());
                self.log.record(&timeout.to_string());
                outcome.exit_code
            }
            Ok(outcome) => outcome.exit_code,
            Err(e) => {
                let failure = PipelineError::from(e);
                self.log.record(&failure.to_string());
                writeln!(err, "❌ {}", failure)?;
                FAILURE_EXIT_CODE
            }
        };

        Ok(RunReport {
            exit_code,
            attempts,
            executed: Some(command),
        })
    }

    /// One generate → validate → lint pass. Returns the winning candidate or
    /// the reason this attempt failed.
    async fn run_attempt(
        &self,
        attempt: u8,
        request: &str,
    ) -> (AttemptResult, Result<String, PipelineError>) {
        let prompt = prompts::fill(&self.settings.generation_prompt, &[(SENTENCE, request)]);
        let mut record = AttemptResult {
            attempt,
            generation_prompt: prompt.clone(),
            ..Default::default()
        };

        let generated = match self.generator.generate(&prompt).await {
            Ok(Some(raw)) => {
                let candidate = normalize(&raw);
                record.generation_response = Some(raw);
                candidate
            }
            Ok(None) => String::new(),
            Err(e) => return (record, Err(e.into())),
        };
        if generated.is_empty() {
            return (record, Err(GenerationError::EmptyGeneration.into()));
        }

        let validation = CommandValidator::new(self.generator, self.log)
            .validate(&generated, request, &self.settings.validation_prompt)
            .await;
        let candidate = validation.command.clone().unwrap_or_else(|| generated.clone());
        record.validation_altered = candidate != generated;
        record.validation = Some(validation);
        record.candidate = Some(candidate.clone());

        let verdict = self.linter.lint(&candidate).await;
        record.lint_passed = verdict.is_pass();
        match verdict.summary() {
            None => (record, Ok(candidate)),
            Some(summary) => {
                record.lint_errors = Some(summary.clone());
                (record, Err(PipelineError::LintRejected(summary)))
            }
        }
    }

    fn write_trace<W: Write>(record: &AttemptResult, out: &mut W) -> Result<()> {
        writeln!(out, "--- trace (attempt {}) ---", record.attempt)?;
        writeln!(out, "[generation prompt]\n{}", record.generation_prompt)?;
        writeln!(
            out,
            "[generation response]\n{}",
            record.generation_response.as_deref().unwrap_or("(none)")
        )?;
        if let Some(validation) = &record.validation {
            writeln!(out, "[validation prompt]\n{}", validation.prompt)?;
            writeln!(
                out,
                "[validation response]\n{}",
                if validation.raw_response.is_empty() {
                    "(none)"
                } else {
                    validation.raw_response.as_str()
                }
            )?;
            writeln!(out, "[validation altered command] {}", record.validation_altered)?;
        }
        match &record.lint_errors {
            Some(errors) => writeln!(out, "[lint] fail: {}", errors)?,
            None if record.lint_passed => writeln!(out, "[lint] pass")?,
            None => {}
        }
        writeln!(out, "--- end trace ---")?;
        Ok(())
    }
}
