mod cli;

use clap::Parser;

use cloudseed_core::commands::migrate;
use cloudseed_core::migration::MigrationReport;

use cli::Cli;

const EXIT_SETUP: i32 = 1;

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
        .with_writer(std::io::stderr)
        .init();

    let config = match cloudseed_core::config::resolve_config(
        cli.config.as_deref(),
        cli.overrides(),
    ) {
        Ok((source, config)) => {
            if let Some(source) = source {
                tracing::info!("Using config: {source}");
            }
            config
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(EXIT_SETUP);
        }
    };

    let mut migration = match migrate::prepare(&config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(EXIT_SETUP);
        }
    };

    match migration.run() {
        Ok(report) => print_report(&report),
        Err(e) if e.is_aborted() => {
            eprintln!("Aborted: {e}");
            eprintln!("The destination already holds a cloud manifest; nothing was overwritten.");
            std::process::exit(e.exit_code());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

fn print_report(report: &MigrationReport) {
    println!("Local manifest: {}", report.local_manifest.display());
    println!(
        "Remote manifest: {}/{}",
        report.remote_bucket, report.remote_key
    );
    println!("Dbid: {}", report.dbid);
    println!("Registered for: {}", report.dest_data_path);
}
