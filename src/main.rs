use anyhow::Context;
use clap::{Parser, Subcommand};
use policy_splitter_lib::commands;
use policy_splitter_lib::config::{self, SplitterConfig};
use policy_splitter_lib::RunSummary;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "policy-splitter")]
#[command(version, about = "Split merged policy PDFs and route them for email or print", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output root (overrides POLICY_SPLITTER_OUTPUT_DIR)
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Detailed logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a merged PDF into per-policy documents
    Split {
        /// Merged source PDF
        pdf: PathBuf,
        /// Policy spreadsheet (.xlsx, .xls, .ods)
        dataset: PathBuf,
        /// Worksheet name (defaults to the first sheet)
        #[arg(long)]
        sheet: Option<String>,
        /// Write email-bound documents without password protection
        #[arg(long)]
        no_encrypt: bool,
        /// Keep PDFs from earlier runs in the output folders
        #[arg(long)]
        keep_existing: bool,
    },
    /// Merge the no-email documents into one PDF for printing
    Merge {
        /// Target file (defaults to <output>/policies_for_printing.pdf)
        #[arg(long)]
        to: Option<PathBuf>,
    },
    /// Zip each routing folder
    Bundle,
}

fn print_summary(summary: &RunSummary) {
    println!("Pages scanned:       {}", summary.total_pages);
    println!("Policies found:      {}", summary.total_groups);
    println!("  with email:        {}", summary.with_email);
    println!("  without email:     {}", summary.without_email);
    println!("  unmatched:         {}", summary.unmatched);
    println!("  unencrypted:       {}", summary.degraded);
    println!("  failed:            {}", summary.failed);
    if !summary.unclassified_pages.is_empty() {
        let pages: Vec<String> = summary
            .unclassified_pages
            .iter()
            .map(|p| (p + 1).to_string())
            .collect();
        println!("Pages without a policy number: {}", pages.join(", "));
    }
    for group in summary.groups.iter().filter(|g| g.is_failed() || g.encryption.is_degraded()) {
        println!("  {} ({}): {:?}", group.policy, group.encryption.label(), group.status);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    config::load_env_files();
    let mut config = SplitterConfig::from_env().context("invalid configuration")?;
    if let Some(output) = cli.output {
        config.output_dir = output;
    }

    match cli.command {
        Commands::Split {
            pdf,
            dataset,
            sheet,
            no_encrypt,
            keep_existing,
        } => {
            if sheet.is_some() {
                config.sheet = sheet;
            }
            if no_encrypt {
                config.encrypt = false;
            }
            if keep_existing {
                config.clean_output = false;
            }
            let summary = commands::split(&config, &pdf, &dataset)
                .with_context(|| format!("split of {} failed", pdf.display()))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Commands::Merge { to } => {
            let report = commands::merge_for_printing(&config, to.as_deref()).context("print merge failed")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Merged {} files ({} pages) into {}", report.merged, report.pages, report.output);
                for skipped in &report.skipped {
                    println!("  skipped {}: {}", skipped.file, skipped.reason);
                }
            }
        }
        Commands::Bundle => {
            let entries = commands::bundle(&config).context("bundling failed")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    println!("{}: {} files -> {}", entry.routing.label(), entry.files, entry.zip);
                }
            }
        }
    }
    Ok(())
}
