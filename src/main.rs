use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use env_logger::{Env, DEFAULT_FILTER_ENV};
use log::{info, LevelFilter};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use vnetsim::command::parse_line;
use vnetsim::config::Config;
use vnetsim::config_loader::load_config_or_default;
use vnetsim::engine::Engine;
use vnetsim::scenario::{load_scenario, run_scenario, write_report, StepResult};

/// Virtual computer network simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the engine configuration YAML file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Play a YAML scenario file against a fresh topology
    Run {
        /// Path to the scenario YAML file
        scenario: PathBuf,

        /// Write a JSON run report to this path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep executing after a command fails
        #[arg(long)]
        keep_going: bool,
    },
    /// Read commands from standard input, one per line
    Shell,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    let level_from_env = init_logging();

    info!("Starting vnetsim");
    let config = load_config_or_default(args.config.as_deref())?;
    if !level_from_env {
        if let Some(level) = config.log_level_filter() {
            log::set_max_level(level);
        }
    }

    match args.command {
        Mode::Run { scenario, output, keep_going } => {
            run(&config, &scenario, output.as_deref(), keep_going)
        }
        Mode::Shell => shell(&config),
    }
}

/// Start logging before the configuration is read.
///
/// Unless `RUST_LOG` is set, the logger accepts every record and
/// `log::max_level` does the filtering, so `general.log_level` can be applied
/// once it is known. Returns whether `RUST_LOG` chose the level.
fn init_logging() -> bool {
    let from_env = std::env::var_os(DEFAULT_FILTER_ENV).is_some();
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if !from_env {
        builder.filter_level(LevelFilter::Trace);
    }
    builder.init();
    if !from_env {
        log::set_max_level(LevelFilter::Info);
    }
    from_env
}

/// `quit` and `exit` end the shell, in any case
fn is_exit(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "quit" | "exit")
}

fn run(
    config: &Config,
    scenario_path: &Path,
    output: Option<&Path>,
    keep_going: bool,
) -> Result<()> {
    let scenario = load_scenario(scenario_path)?;
    let mut engine = Engine::new(config)?;

    let report = run_scenario(&mut engine, &scenario, keep_going);
    for step in &report.steps {
        match &step.result {
            StepResult::Ok { output } => println!("[{}] {}", step.index, output),
            StepResult::Error { error, .. } => println!("[{}] error: {}", step.index, error),
        }
    }

    if let Some(path) = output {
        write_report(&report, path)?;
    }

    if !report.succeeded() {
        bail!("{} command(s) failed", report.failed);
    }
    info!("Scenario completed successfully");
    Ok(())
}

fn shell(config: &Config) -> Result<()> {
    let mut engine = Engine::new(config)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("vnetsim shell on {}. Type 'quit' to exit.", engine.topology().subnet());
    loop {
        print!("> ");
        stdout.flush().wrap_err("Failed to flush stdout")?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).wrap_err("Failed to read from stdin")? == 0 {
            break;
        }
        if is_exit(&line) {
            break;
        }

        match parse_line(&line).and_then(|command| command.map(|c| engine.execute(c)).transpose()) {
            Ok(Some(output)) => println!("{}", output),
            Ok(None) => {}
            Err(e) => println!("error: {}", e),
        }
    }
    Ok(())
}
