mod cli;
mod format;
mod signal;

use clap::Parser;

use offsite_core::commands::{run, status};
use offsite_core::config;

use cli::{Cli, Commands};
use format::format_bytes;
use signal::SHUTDOWN;

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = match config::resolve_config_path(cli.config.as_deref()) {
        Some(path) => path,
        None => {
            eprintln!("Error: no configuration file found.");
            eprintln!("Searched: --config flag, $OFFSITE_CONFIG, ./offsite.yaml");
            std::process::exit(1);
        }
    };

    tracing::info!("Using config: {}", config_path.display());

    let config = match config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    signal::install_signal_handlers();

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run::run(&config, &SHUTDOWN).map(|report| {
            println!(
                "scanned {} files ({} new, {} duplicates), uploaded {} ({}), reconciled {}",
                report.scan.files_seen,
                report.scan.registered,
                report.scan.duplicates,
                report.upload.uploaded,
                format_bytes(report.upload.bytes_sent),
                report.upload.reconciled,
            );
        }),
        Commands::Scan => run::scan_only(&config, &SHUTDOWN).map(|stats| {
            println!(
                "scanned {} files: {} new, {} duplicates, {} skipped",
                stats.files_seen,
                stats.registered,
                stats.duplicates,
                stats.hash_errors + stats.key_errors,
            );
        }),
        Commands::Upload => run::upload_only(&config, &SHUTDOWN).map(|stats| {
            println!(
                "uploaded {} ({}), reconciled {}",
                stats.uploaded,
                format_bytes(stats.bytes_sent),
                stats.reconciled,
            );
        }),
        Commands::Status => status::run(&config).map(|report| {
            println!(
                "{} files registered, {} uploaded, {} pending",
                report.total, report.uploaded, report.pending,
            );
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
