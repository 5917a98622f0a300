use crate::backend::Backend;
use crate::error::ConfigurationWarning;
use anyhow::{Result, anyhow};
use dirs::home_dir;
use serde::{Deserialize, Deserializer};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_LOCAL_URL: &str = "http://localhost:11434";
pub const DEFAULT_LOCAL_MODEL: &str = "llama3.2";
pub const DEFAULT_HOSTED_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_HOSTED_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_PROVIDER: &str = "openai";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub hosted: HostedSettings,
}

/// Options for the local backend and the prompts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    #[serde(deserialize_with = "tolerant_flag")]
    pub trace: bool,
    pub base_url: String,
    #[serde(deserialize_with = "tolerant_flag")]
    pub logging: bool,
    pub prompt: String,
    pub validation_prompt: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_LOCAL_MODEL.to_string(),
            trace: false,
            base_url: DEFAULT_LOCAL_URL.to_string(),
            logging: false,
            prompt: crate::prompts::DEFAULT_GENERATION_PROMPT.to_string(),
            validation_prompt: crate::prompts::DEFAULT_VALIDATION_PROMPT.to_string(),
        }
    }
}

/// Options for the hosted, chat-completions style backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HostedSettings {
    #[serde(deserialize_with = "tolerant_flag")]
    pub enabled: bool,
    pub provider: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    #[serde(deserialize_with = "tolerant_flag")]
    pub stream: bool,
}

impl Default for HostedSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: DEFAULT_PROVIDER.to_string(),
            api_key: None,
            base_url: DEFAULT_HOSTED_URL.to_string(),
            model: DEFAULT_HOSTED_MODEL.to_string(),
            stream: false,
        }
    }
}

/// Raw shape of a flag as it may appear in the file.
#[derive(Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Text(String),
    Other(toml::Value),
}

fn tolerant_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match FlagValue::deserialize(deserializer)? {
        FlagValue::Bool(value) => value,
        FlagValue::Text(text) => parse_flag(&text),
        FlagValue::Other(_) => false,
    })
}

/// `"true"` (any case, surrounding whitespace ignored) is true; anything else is false.
pub fn parse_flag(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("true")
}

/// Masks a secret for display as first four, asterisks, last four.
///
/// Secrets of eight characters or fewer are masked entirely.
///
/// ```
/// use psgen::config::mask_secret;
///
/// assert_eq!(mask_secret(Some("sk-abcdefgh1234")), "sk-a*******1234");
/// assert_eq!(mask_secret(Some("short")), "*****");
/// assert_eq!(mask_secret(None), "(not set)");
/// ```
pub fn mask_secret(secret: Option<&str>) -> String {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return "(not set)".to_string();
    };

    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
}

impl Config {
    /// Loads the configuration from the default location and applies
    /// environment overrides.
    ///
    /// Never fails: a missing or broken file yields defaults plus a warning
    /// for the caller to report.
    pub fn load() -> (Self, Option<ConfigurationWarning>) {
        let (mut config, warning) = match Self::get_config_path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => (
                Self::default(),
                Some(ConfigurationWarning::Unreadable {
                    path: "<config>".to_string(),
                    detail: e.to_string(),
                }),
            ),
        };

        // Environment variables override config file
        if let Ok(api_key) = std::env::var("PSGEN_API_KEY") {
            if !api_key.is_empty() {
                config.hosted.api_key = Some(api_key);
            }
        }

        (config, warning)
    }

    /// Loads from an explicit path without environment overrides.
    pub fn load_from(path: &Path) -> (Self, Option<ConfigurationWarning>) {
        let shown = path.display().to_string();

        if !path.exists() {
            info!("No config file found, using defaults");
            return (Self::default(), Some(ConfigurationWarning::Missing(shown)));
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                return (
                    Self::default(),
                    Some(ConfigurationWarning::Unreadable {
                        path: shown,
                        detail: e.to_string(),
                    }),
                );
            }
        };

        match Self::from_toml_str(&content) {
            Ok(config) => {
                info!("Loaded config from: {}", shown);
                (config, None)
            }
            Err(e) => (
                Self::default(),
                Some(ConfigurationWarning::Malformed {
                    path: shown,
                    detail: e.to_string(),
                }),
            ),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// `PSGEN_CONFIG` if set, else `~/.psgen/config.toml`.
    pub fn get_config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("PSGEN_CONFIG") {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".psgen"))
    }

    /// Where the activity log is written when logging is enabled.
    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("psgen.log"))
    }

    pub fn hosted_api_key(&self) -> Option<&str> {
        self.hosted.api_key.as_deref().filter(|key| !key.is_empty())
    }

    /// The backend for this run.
    ///
    /// The hosted backend is chosen only when it is enabled and has a key.
    pub fn backend(&self) -> Backend {
        match (self.hosted.enabled, self.hosted_api_key()) {
            (true, Some(api_key)) => {
                debug!("Using hosted backend '{}'", self.hosted.provider);
                Backend::Hosted {
                    endpoint: self.hosted.base_url.clone(),
                    api_key: api_key.to_string(),
                    model: self.hosted.model.clone(),
                    stream: self.hosted.stream,
                }
            }
            _ => Backend::Local {
                endpoint: self.generation.base_url.clone(),
                model: self.generation.model.clone(),
            },
        }
    }

    /// Human-readable dump for `--config`, with the key masked.
    pub fn render(&self, source: &Path, found: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Configuration file: {}", source.display());
        let _ = writeln!(
            out,
            "Status: {}",
            if found { "Found" } else { "Not found (using defaults)" }
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "[generation]");
        let _ = writeln!(out, "Model: {}", self.generation.model);
        let _ = writeln!(out, "Base URL: {}", self.generation.base_url);
        let _ = writeln!(out, "Trace: {}", self.generation.trace);
        let _ = writeln!(out, "Logging: {}", self.generation.logging);
        let _ = writeln!(out);
        let _ = writeln!(out, "[hosted]");
        let _ = writeln!(out, "Enabled: {}", self.hosted.enabled);
        let _ = writeln!(out, "Provider: {}", self.hosted.provider);
        let _ = writeln!(out, "API Key: {}", mask_secret(self.hosted_api_key()));
        let _ = writeln!(out, "Base URL: {}", self.hosted.base_url);
        let _ = writeln!(out, "Model: {}", self.hosted.model);
        let _ = writeln!(out, "Stream: {}", self.hosted.stream);
        let _ = writeln!(out);
        let _ = writeln!(out, "Active backend: {}", self.backend().describe());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_local_backend() {
        let config = Config::default();
        match config.backend() {
            Backend::Local { endpoint, model } => {
                assert_eq!(endpoint, DEFAULT_LOCAL_URL);
                assert_eq!(model, DEFAULT_LOCAL_MODEL);
            }
            other => panic!("expected local backend, got {:?}", other),
        }
        assert!(!config.generation.trace);
        assert!(config.generation.prompt.contains("{sentence}"));
    }

    #[test]
    fn test_hosted_backend_selected_when_enabled_with_key() {
        let config = Config::from_toml_str(
            r#"
            [hosted]
            enabled = "true"
            api_key = "sk-test-1234567890"
            model = "gpt-4o"
            stream = true
            "#,
        )
        .unwrap();

        match config.backend() {
            Backend::Hosted { endpoint, api_key, model, stream } => {
                assert_eq!(endpoint, DEFAULT_HOSTED_URL);
                assert_eq!(api_key, "sk-test-1234567890");
                assert_eq!(model, "gpt-4o");
                assert!(stream);
            }
            other => panic!("expected hosted backend, got {:?}", other),
        }
    }

    #[test]
    fn test_hosted_enabled_without_key_falls_back_to_local() {
        let config = Config::from_toml_str("[hosted]\nenabled = true\napi_key = \"\"\n").unwrap();
        assert!(matches!(config.backend(), Backend::Local { .. }));
    }

    #[test]
    fn test_flags_accept_bool_and_string_forms() {
        let config = Config::from_toml_str(
            r#"
            [generation]
            trace = true
            logging = "TRUE"

            [hosted]
            enabled = "false"
            stream = "yes"
            "#,
        )
        .unwrap();

        assert!(config.generation.trace);
        assert!(config.generation.logging);
        assert!(!config.hosted.enabled);
        assert!(!config.hosted.stream);
    }

    #[test]
    fn test_non_string_non_bool_flag_is_false() {
        let config = Config::from_toml_str("[generation]\ntrace = 1\n").unwrap();
        assert!(!config.generation.trace);
    }

    #[test]
    fn test_missing_fields_keep_defaults() {
        let config = Config::from_toml_str("[generation]\nmodel = \"qwen2.5\"\n").unwrap();
        assert_eq!(config.generation.model, "qwen2.5");
        assert_eq!(config.generation.base_url, DEFAULT_LOCAL_URL);
        assert_eq!(config.hosted.provider, DEFAULT_PROVIDER);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" True "));
        assert!(!parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(None), "(not set)");
        assert_eq!(mask_secret(Some("")), "(not set)");
        assert_eq!(mask_secret(Some("12345678")), "********");
        assert_eq!(mask_secret(Some("abc")), "***");
        assert_eq!(mask_secret(Some("123456789")), "1234*6789");
        assert_eq!(mask_secret(Some("sk-proj-abcdefXYZ9")), "sk-p**********XYZ9");
    }

    #[test]
    fn test_load_from_missing_file_warns() {
        let dir = tempfile::tempdir().unwrap();
        let (config, warning) = Config::load_from(&dir.path().join("absent.toml"));
        assert!(matches!(warning, Some(ConfigurationWarning::Missing(_))));
        assert_eq!(config.generation.model, DEFAULT_LOCAL_MODEL);
    }

    #[test]
    fn test_load_from_malformed_file_falls_back_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[generation]\nmodel = \"custom\"\nthis is not toml").unwrap();

        let (config, warning) = Config::load_from(&path);
        assert!(matches!(warning, Some(ConfigurationWarning::Malformed { .. })));
        assert_eq!(config.generation.model, DEFAULT_LOCAL_MODEL);
    }

    #[test]
    fn test_load_from_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[generation]\nmodel = \"custom\"\n").unwrap();

        let (config, warning) = Config::load_from(&path);
        assert!(warning.is_none());
        assert_eq!(config.generation.model, "custom");
    }

    #[test]
    fn test_render_masks_key() {
        let config = Config::from_toml_str(
            "[hosted]\nenabled = true\napi_key = \"sk-abcdefghijklmnop\"\n",
        )
        .unwrap();
        let rendered = config.render(Path::new("/tmp/config.toml"), true);

        assert!(rendered.contains("API Key: sk-a***********mnop"));
        assert!(!rendered.contains("sk-abcdefghijklmnop"));
        assert!(rendered.contains("Active backend: hosted"));
    }
}
