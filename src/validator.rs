//! Second-opinion check of a candidate command by the backend.
//!
//! Validation is advisory. A failed or empty answer yields no command and the
//! caller keeps the candidate it already had; this never ends an attempt.

use crate::activity_log::ActivityLog;
use crate::backend::TextGenerator;
use crate::normalizer::normalize;
use crate::prompts::{self, COMMAND, REQUIREMENTS};
use tracing::warn;

/// Outcome of one validation round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    /// The normalized corrected command, if the backend produced one.
    pub command: Option<String>,
    /// Prompt that was sent.
    pub prompt: String,
    /// Raw backend text, empty when the call failed.
    pub raw_response: String,
}

pub struct CommandValidator<'a> {
    generator: &'a dyn TextGenerator,
    log: &'a ActivityLog,
}

impl<'a> CommandValidator<'a> {
    pub fn new(generator: &'a dyn TextGenerator, log: &'a ActivityLog) -> Self {
        Self { generator, log }
    }

    pub async fn validate(&self, candidate: &str, request: &str, template: &str) -> Validation {
        let prompt = prompts::fill(template, &[(COMMAND, candidate), (REQUIREMENTS, request)]);

        let raw_response = match self.generator.generate(&prompt).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                warn!("Validation returned no text, keeping candidate");
                self.log.record("validation: empty response, keeping candidate");
                String::new()
            }
            Err(e) => {
                warn!("Validation failed, keeping candidate: {}", e);
                self.log.record(&format!("validation: failed ({}), keeping candidate", e));
                String::new()
            }
        };

        let command = Some(normalize(&raw_response)).filter(|c| !c.is_empty());
        if let Some(corrected) = &command {
            self.log.record(&format!("validation: {}", corrected));
        }

        Validation {
            command,
            prompt,
            raw_response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    enum Reply {
        Text(&'static str),
        Empty,
        Unreachable,
    }

    struct ScriptedGenerator {
        reply: Reply,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<Option<String>, GenerationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.reply {
                Reply::Text(text) => Ok(Some(text.to_string())),
                Reply::Empty => Ok(None),
                Reply::Unreachable => Err(GenerationError::BackendUnreachable {
                    endpoint: "http://localhost:11434/api/generate".to_string(),
                    detail: "refused".to_string(),
                }),
            }
        }
    }

    const TEMPLATE: &str = "Fix {command} so that it does: {requirements}";

    #[tokio::test]
    async fn test_substitutes_and_normalizes() {
        let generator = ScriptedGenerator::new(Reply::Text("```powershell\nGet-ChildItem -File\n```"));
        let log = ActivityLog::disabled();
        let validator = CommandValidator::new(&generator, &log);

        let result = validator.validate("Get-ChildItem", "list only files", TEMPLATE).await;

        assert_eq!(result.command.as_deref(), Some("Get-ChildItem -File"));
        assert_eq!(result.prompt, "Fix Get-ChildItem so that it does: list only files");
        assert_eq!(generator.prompts.lock().unwrap()[0], result.prompt);
        assert!(result.raw_response.starts_with("```powershell"));
    }

    #[tokio::test]
    async fn test_backend_failure_yields_no_command() {
        let generator = ScriptedGenerator::new(Reply::Unreachable);
        let log = ActivityLog::disabled();
        let validator = CommandValidator::new(&generator, &log);

        let result = validator.validate("Get-Date", "show date", TEMPLATE).await;
        assert_eq!(result.command, None);
        assert!(result.raw_response.is_empty());
    }

    #[tokio::test]
    async fn test_empty_generation_yields_no_command() {
        let generator = ScriptedGenerator::new(Reply::Empty);
        let log = ActivityLog::disabled();
        let validator = CommandValidator::new(&generator, &log);

        assert_eq!(validator.validate("Get-Date", "show date", TEMPLATE).await.command, None);
    }

    #[tokio::test]
    async fn test_fence_only_answer_yields_no_command() {
        let generator = ScriptedGenerator::new(Reply::Text("```\n```"));
        let log = ActivityLog::disabled();
        let validator = CommandValidator::new(&generator, &log);

        assert_eq!(validator.validate("Get-Date", "show date", TEMPLATE).await.command, None);
    }
}
