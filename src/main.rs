use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tls_sweep_rs::config::ConfigArgs;
use tls_sweep_rs::cycle::Cycle;
use tls_sweep_rs::engine::ScanExecutor;
use tls_sweep_rs::error::ConfigError;
use tls_sweep_rs::registry::RegistryClient;
use tls_sweep_rs::types::CycleSummary;

/// tls-sweep-rs — grade the TLS setup of every active domain in the registry and write the results back.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tls-sweep-rs",
    version,
    about = "Grade the TLS setup of every active domain in the registry and write the results back.",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Write the cycle summary as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tls_sweep_rs=info")),
        )
        .init();

    let cli = Cli::parse();

    let presence = cli.config.presence_report();
    let config = match cli.config.resolve() {
        Ok(config) => config,
        Err(e @ ConfigError::Missing(_)) => {
            eprintln!("CRITICAL ERROR: Missing configuration.");
            for (name, ok) in presence {
                eprintln!("  {name:<13}: {}", if ok { "OK" } else { "MISSING" });
            }
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    println!("tls-sweep-rs configuration:");
    println!("  registry     : {}", config.records_url());
    println!("  engine       : {} {}", config.engine_shell.display(), config.engine_path.display());
    println!("  work_dir     : {}", config.work_dir.display());
    println!("  timeout_secs : {}", config.scan_timeout.as_secs());
    println!("  page_size    : {}", config.page_size);
    println!("  concurrency  : {}", config.concurrency);

    let registry = RegistryClient::new(&config)?;
    let executor = ScanExecutor::new(&config);
    let cycle = Cycle::new(&config, registry, executor);

    let summary = cycle
        .run()
        .await
        .context("could not load domains; no scans were run")?;

    print_summary_table(&summary);
    if let Some(path) = cli.output.as_deref() {
        if let Err(e) = write_summary_json(path, &summary) {
            eprintln!("Failed to write JSON to {}: {}", path.display(), e);
        } else {
            println!("Wrote JSON summary to {}", path.display());
        }
    }

    Ok(())
}

fn print_summary_table(summary: &CycleSummary) {
    let mut domain_w = "domain".len();
    let mut grade_w = "grade".len();
    for d in &summary.domains {
        domain_w = domain_w.max(d.domain.len());
        grade_w = grade_w.max(d.grade.len());
    }
    let updated_w = "updated".len();

    println!(
        "\nScanned: {} of {} active (skipped: {}, degraded: {}, update failures: {}, crashed: {})",
        summary.scanned,
        summary.fetched_active,
        summary.skipped,
        summary.degraded,
        summary.update_failed,
        summary.crashed
    );
    println!(
        "{:<domain_w$}  {:<grade_w$}  {:<updated_w$}  findings",
        "domain", "grade", "updated",
    );
    println!(
        "{:-<domain_w$}  {:-<grade_w$}  {:-<updated_w$}  {:-<8}",
        "", "", "", "",
    );
    for d in &summary.domains {
        let mut findings = d.findings_summary.clone();
        if findings.chars().count() > 80 {
            findings = findings.chars().take(77).collect::<String>() + "...";
        }
        println!(
            "{:<domain_w$}  {:<grade_w$}  {:<updated_w$}  {}",
            d.domain,
            d.grade,
            if d.updated { "yes" } else { "no" },
            findings,
        );
    }
}

fn write_summary_json(path: &std::path::Path, summary: &CycleSummary) -> anyhow::Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}
