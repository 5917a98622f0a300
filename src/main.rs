use psgen::activity_log::ActivityLog;
use psgen::backend::BackendClient;
use psgen::cli::{self, CliAction};
use psgen::config::Config;
use psgen::executor::CommandExecutor;
use psgen::linter::{self, ScriptAnalyzer, StaticLinter};
use psgen::orchestrator::{FAILURE_EXIT_CODE, Orchestrator, PipelineSettings};
use std::io::{self, Write};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .with_writer(io::stderr)
        .init();

    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {}", e);
            FAILURE_EXIT_CODE
        }
    };

    let _ = io::stdout().flush();
    std::process::exit(code);
}

async fn run() -> anyhow::Result<i32> {
    let action = match cli::parse(std::env::args_os()) {
        Ok(action) => action,
        Err(e) => {
            let code = if e.use_stderr() { FAILURE_EXIT_CODE } else { 0 };
            let _ = e.print();
            return Ok(code);
        }
    };

    match action {
        CliAction::Version => {
            println!("psgen {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        CliAction::ShowConfig => {
            show_config()?;
            Ok(0)
        }
        CliAction::Usage => {
            println!("{}", cli::build_cli().render_usage());
            println!("Describe what you want to do, e.g.: psgen list the five largest files here");
            Ok(FAILURE_EXIT_CODE)
        }
        CliAction::Run(request) => run_request(&request).await,
    }
}

fn show_config() -> anyhow::Result<()> {
    let path = Config::get_config_path()?;
    let (config, warning) = Config::load();
    if let Some(warning) = warning.filter(|_| path.exists()) {
        eprintln!("⚠️  {}", warning);
    }
    print!("{}", config.render(&path, path.exists()));
    Ok(())
}

async fn run_request(request: &str) -> anyhow::Result<i32> {
    let (config, warning) = Config::load();
    if let Some(warning) = warning {
        eprintln!("⚠️  {}", warning);
    }

    let log = if config.generation.logging {
        Config::log_path()
            .map(ActivityLog::to_file)
            .unwrap_or_default()
    } else {
        ActivityLog::disabled()
    };

    let backend = config.backend();
    info!("Using backend {}", backend.describe());

    let analyzer = ScriptAnalyzer::new();
    if !linter::analyzer_available(analyzer.program()) {
        eprintln!(
            "⚠️  '{}' not found on PATH; commands will run without linting",
            analyzer.program()
        );
    }

    let generator = BackendClient::new(backend, log.clone());
    let linter = StaticLinter::with_runner(Box::new(analyzer), log.clone());
    let executor = CommandExecutor::new(log.clone());
    let settings = PipelineSettings {
        generation_prompt: config.generation.prompt.clone(),
        validation_prompt: config.generation.validation_prompt.clone(),
        trace: config.generation.trace,
    };

    let orchestrator = Orchestrator::new(&generator, &linter, &executor, settings, &log);
    let report = orchestrator
        .run(request, &mut io::stdout(), &mut io::stderr())
        .await?;

    Ok(report.exit_code)
}
