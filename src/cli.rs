//! Command-line surface.
//!
//! `psgen <word>...` joins the words into one request. The single-dash long
//! spellings `-version` and `-config` are accepted as the first argument in
//! addition to the usual `--version`/`-v` and `--config`/`-c`.

use clap::{Arg, ArgAction, Command};
use std::ffi::OsString;

/// What the invocation asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Version,
    ShowConfig,
    /// No request given.
    Usage,
    Run(String),
}

pub fn build_cli() -> Command {
    Command::new("psgen")
        .about("Turns a plain-language request into a PowerShell command and runs it")
        .long_about(
            "psgen asks a language model for a single-line PowerShell command, has it \
             double-check the result, lints it with PSScriptAnalyzer, and runs it with a \
             30 second time limit. Generation is retried once if it fails.",
        )
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('v')
                .long("version")
                .help("Print version information")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Show the resolved configuration")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("request")
                .help("What you want to do, in plain language")
                .num_args(1..)
                .trailing_var_arg(true),
        )
}

/// Rewrites `-version`/`-config` in first position to their `--` forms.
fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .enumerate()
        .map(|(i, arg)| {
            if i == 1 && arg.as_os_str() == "-version" {
                OsString::from("--version")
            } else if i == 1 && arg.as_os_str() == "-config" {
                OsString::from("--config")
            } else {
                arg
            }
        })
        .collect()
}

/// Parses the full argument list, program name included.
pub fn parse<I, T>(args: I) -> Result<CliAction, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let matches = build_cli().try_get_matches_from(normalize_args(args))?;

    if matches.get_flag("version") {
        return Ok(CliAction::Version);
    }
    if matches.get_flag("config") {
        return Ok(CliAction::ShowConfig);
    }

    let words: Vec<&str> = matches
        .get_many::<String>("request")
        .unwrap_or_default()
        .map(String::as_str)
        .collect();

    if words.is_empty() {
        Ok(CliAction::Usage)
    } else {
        Ok(CliAction::Run(words.join(" ")))
    }
}
