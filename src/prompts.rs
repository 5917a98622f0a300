//! Built-in prompt templates and placeholder substitution.

/// Placeholder for the user's request in the generation prompt.
pub const SENTENCE: &str = "sentence";
/// Placeholder for the candidate command in the validation prompt.
pub const COMMAND: &str = "command";
/// Placeholder for the user's request in the validation prompt.
pub const REQUIREMENTS: &str = "requirements";

pub const DEFAULT_GENERATION_PROMPT: &str = "You are a PowerShell expert. \
Translate the following request into a single-line PowerShell command.

Request: {sentence}

RULES:
- Respond with the command only, on ONE line
- No explanations, no markdown, no code fences
- Prefer built-in cmdlets over external tools
- Never prompt for interactive input";

pub const DEFAULT_VALIDATION_PROMPT: &str = "You are reviewing a PowerShell command.

Requirements: {requirements}
Proposed command: {command}

Check that the command is valid single-line PowerShell and that it satisfies the \
requirements. If it is correct, repeat it unchanged. If it is wrong, return a \
corrected version.

RULES:
- Respond with the command only, on ONE line
- No explanations, no markdown, no code fences";

/// Replaces each `{name}` in `template` with its value.
///
/// Substitution is purely textual. Placeholders the template does not contain
/// are ignored, and unknown `{...}` sequences are left as they are.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |text, (name, value)| {
        text.replace(&format!("{{{}}}", name), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_replaces_every_occurrence() {
        let filled = fill("{sentence} / {sentence}", &[(SENTENCE, "list files")]);
        assert_eq!(filled, "list files / list files");
    }

    #[test]
    fn test_fill_ignores_absent_placeholders() {
        let filled = fill("check {command}", &[(COMMAND, "Get-Date"), (REQUIREMENTS, "today")]);
        assert_eq!(filled, "check Get-Date");
    }

    #[test]
    fn test_fill_leaves_unknown_braces() {
        let filled = fill("{other} {sentence}", &[(SENTENCE, "x")]);
        assert_eq!(filled, "{other} x");
    }

    #[test]
    fn test_default_templates_carry_their_placeholders() {
        assert!(DEFAULT_GENERATION_PROMPT.contains("{sentence}"));
        assert!(DEFAULT_VALIDATION_PROMPT.contains("{command}"));
        assert!(DEFAULT_VALIDATION_PROMPT.contains("{requirements}"));
    }
}
