//! dist-deploy - 前端构建产物一键发布
//!
//! Usage:
//! - Deploy: `dist-deploy -f deploy.json`
//! - Show the remote steps only: `dist-deploy -f deploy.json --dry-run`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use indicatif::MultiProgress;
use tracing_subscriber::EnvFilter;

use dist_deploy::config::env::constants::{EXIT_USAGE, VERSION};
use dist_deploy::{DeployOutcome, ProgressWriter, RunOptions, SessionTimeouts, SshConnector};

/// Compress a build output and publish it to a server over SSH
#[derive(Debug, Parser)]
#[command(name = "dist-deploy", version = VERSION, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short = 'f', long = "file")]
    file: PathBuf,

    /// Directory a relative outputDir is resolved against
    #[arg(short = 'C', long = "work-dir")]
    work_dir: Option<PathBuf>,

    /// Validate and print the remote steps without touching anything
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool, multi: &MultiProgress) {
    let default = if verbose {
        "dist_deploy=debug"
    } else {
        "dist_deploy=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(ProgressWriter::new(multi.clone()))
        .with_target(false)
        .init();
}

/// `--help`/`--version` 为 0，其余参数错误为 `EXIT_USAGE`
fn parse_error_code(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        EXIT_USAGE
    } else {
        0
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(parse_error_code(&e));
        }
    };
    let multi = MultiProgress::new();
    init_tracing(cli.verbose, &multi);

    let work_dir = match cli.work_dir.clone() {
        Some(dir) => dir,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("error: cannot determine working directory: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };
    let options = RunOptions {
        config_path: cli.file,
        work_dir,
        dry_run: cli.dry_run,
        progress: multi,
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let connector = SshConnector::new(SessionTimeouts::from_env());
    let result = rt.block_on(dist_deploy::run(&options, &connector));

    match result {
        Ok(DeployOutcome::Deployed(report)) => {
            println!("Deployed {} on {}", report.live_dir, report.target);
            if let Some(backup) = report.backup_dir {
                println!("Previous version kept at {}", backup);
            }
            ExitCode::SUCCESS
        }
        Ok(DeployOutcome::Planned(plan)) => {
            println!("{}", plan);
            ExitCode::SUCCESS
        }
        Err(failure) => {
            eprintln!("error: {}", failure);
            ExitCode::from(failure.exit_code())
        }
    }
}
