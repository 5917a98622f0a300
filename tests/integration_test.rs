use anyhow::Result;
use std::path::Path;
use std::process::{Command, Output};

/// Helper to run psgen with an isolated home and config file
fn run_psgen(args: &[&str], config: &Path, home: &Path) -> Result<Output> {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_psgen"));
    cmd.args(args);

    cmd.env("PSGEN_CONFIG", config);
    cmd.env("HOME", home);
    cmd.env_remove("PSGEN_API_KEY");
    cmd.env_remove("RUST_LOG");

    let output = cmd.output()?;
    Ok(output)
}

#[test]
fn test_version_flags_exit_zero() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.toml");

    for flag in ["-version", "--version", "-v"] {
        let output = run_psgen(&[flag], &config, dir.path())?;
        assert!(output.status.success(), "{} should succeed", flag);

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(
            stdout.contains(&format!("psgen {}", env!("CARGO_PKG_VERSION"))),
            "{} should print the version, got: {}",
            flag,
            stdout
        );
    }

    Ok(())
}

#[test]
fn test_no_arguments_prints_usage_and_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let output = run_psgen(&[], &dir.path().join("config.toml"), dir.path())?;

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Should print usage. Stdout: {}", stdout);

    Ok(())
}

#[test]
fn test_help_exits_zero() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let output = run_psgen(&["--help"], &dir.path().join("config.toml"), dir.path())?;

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("PowerShell"));

    Ok(())
}

#[test]
fn test_config_shows_hosted_backend_with_masked_key() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        r#"
[generation]
model = "llama3.2"
trace = "true"

[hosted]
enabled = "true"
provider = "openai"
api_key = "sk-live-0123456789abcdef"
model = "gpt-4o-mini"
"#,
    )?;

    for flag in ["-config", "--config", "-c"] {
        let output = run_psgen(&[flag], &config, dir.path())?;
        assert!(output.status.success(), "{} should succeed", flag);

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("API Key: sk-l****************cdef"), "Stdout: {}", stdout);
        assert!(!stdout.contains("sk-live-0123456789abcdef"));
        assert!(stdout.contains("Active backend: hosted"));
        assert!(stdout.contains("Trace: true"));
    }

    Ok(())
}

#[test]
fn test_config_without_file_shows_defaults() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let output = run_psgen(&["--config"], &dir.path().join("absent.toml"), dir.path())?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Not found (using defaults)"));
    assert!(stdout.contains("API Key: (not set)"));
    assert!(stdout.contains("Active backend: local (llama3.2 @ http://localhost:11434)"));

    Ok(())
}

#[test]
fn test_unreachable_backend_fails_after_retry() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.toml");
    // Port 9 (discard) is closed on test machines, so the connection is refused.
    std::fs::write(&config, "[generation]\nbase_url = \"http://127.0.0.1:9\"\n")?;

    let output = run_psgen(&["list", "files"], &config, dir.path())?;

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("attempt 1/2"));
    assert!(stdout.contains("attempt 2/2"));
    assert!(stderr.contains("backend unreachable"), "Stderr: {}", stderr);
    assert!(stderr.contains("Retrying"));
    assert!(!stdout.contains("Executing:"));

    Ok(())
}

#[test]
fn test_malformed_config_warns_and_uses_defaults() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[generation\nmodel = ")?;

    let output = run_psgen(&["--config"], &config, dir.path())?;

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stderr.contains("using built-in defaults"), "Stderr: {}", stderr);
    assert!(stdout.contains("Model: llama3.2"));

    Ok(())
}

#[test]
fn test_missing_config_warns_on_run() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let output = run_psgen(&["show", "the", "date"], &dir.path().join("absent.toml"), dir.path())?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no configuration file"), "Stderr: {}", stderr);

    Ok(())
}
