use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use cryomill::config::MillConfig;
use cryomill::hardware::SimMicroscope;
use cryomill::logging::{init_logging, LoggingConfig};
use cryomill::milling::MillingRun;
use cryomill::selection::ConsoleOperator;
use cryomill::Error;

#[derive(Parser)]
#[command(name = "cryomill")]
#[command(about = "Cryo-FIB/SEM lamella milling with drift-corrected beam realignment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a milling session from a config file
    Run {
        /// Path to the milling config (TOML or JSON)
        config: PathBuf,

        /// Use the built-in simulated microscope instead of real hardware
        #[arg(long)]
        simulate: bool,

        /// Seed for the simulated sample
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Validate a config file and report every problem found
    Check {
        /// Path to the milling config (TOML or JSON)
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            simulate,
            seed,
        } => handle_run(config, simulate, seed, cli.verbose),
        Commands::Check { config } => handle_check(config),
    }
}

fn load_validated(path: &PathBuf) -> anyhow::Result<MillConfig> {
    let config = MillConfig::load_from_file(path)?;
    if let Err(errors) = config.validate() {
        return Err(Error::InvalidConfig(errors).into());
    }
    Ok(config)
}

fn handle_run(config_path: PathBuf, simulate: bool, seed: u64, verbose: u8) -> anyhow::Result<()> {
    // Configuration problems are fatal before any hardware is touched.
    let config = load_validated(&config_path)?;

    let output_dir = prompt_output_dir(&config.output_dir)?;
    let run_dir = output_dir.join(format!(
        "run_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("cannot create output directory {}", run_dir.display()))?;

    let mut logging = LoggingConfig::from_verbosity(verbose);
    logging.log_directory = Some(run_dir.clone());
    let _log_guard = init_logging(&logging)?;

    tracing::info!(config = %config_path.display(), output = %run_dir.display(), "starting run");

    let mut operator = ConsoleOperator::stdio();
    if !simulate {
        // The vendor microscope driver is an external collaborator and is
        // not linked into this build.
        anyhow::bail!("no microscope driver available in this build; rerun with --simulate");
    }
    let mut scope = SimMicroscope::new(seed);

    let report = MillingRun::new(&mut scope, &mut operator, &config, run_dir).execute()?;

    println!(
        "Run {} finished: {} lamellae milled, {} skipped.",
        report.run_id,
        report.completed.len(),
        report.skipped.len()
    );
    for (lamella, reason) in &report.skipped {
        println!("  lamella {lamella}: {reason}");
    }
    Ok(())
}

fn prompt_output_dir(default: &PathBuf) -> anyhow::Result<PathBuf> {
    print!("Output directory [{}]: ", default.display());
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Ok(default.clone())
    } else {
        Ok(PathBuf::from(trimmed))
    }
}

fn handle_check(config_path: PathBuf) -> anyhow::Result<()> {
    let config = MillConfig::load_from_file(&config_path)?;
    match config.validate() {
        Ok(()) => {
            println!(
                "{} is valid: {} milling stages, {} lamellae.",
                config_path.display(),
                config.stages.len(),
                config.lamella.count
            );
            Ok(())
        }
        Err(errors) => {
            eprintln!("{} has {} problem(s):", config_path.display(), errors.len());
            for error in &errors {
                eprintln!("  - {error}");
            }
            Err(Error::InvalidConfig(errors).into())
        }
    }
}
