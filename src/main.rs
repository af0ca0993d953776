use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, eyre};
use std::path::PathBuf;
use bizstore::sync::{self, ImportMode};
use bizstore::Engine;

#[derive(Parser)]
#[command(name = "bizstore")]
#[command(about = "Local-first record store for clients, estimates, and invoices")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the store directory (default: the platform data directory)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show record counts
    Stats,

    /// Export the dataset as JSON (to stdout or a file)
    Export {
        /// Output file; stdout if omitted
        file: Option<PathBuf>,
    },

    /// Import a previously exported JSON file
    Import {
        file: PathBuf,

        /// merge (upsert by id) or replace (erase first)
        #[arg(long, default_value = "merge")]
        mode: String,
    },

    /// Print a shareable base64 backup string
    Backup,

    /// Restore from a shareable backup file ("-" reads stdin)
    Restore {
        file: PathBuf,

        /// merge (upsert by id) or replace (erase first)
        #[arg(long, default_value = "replace")]
        mode: String,
    },

    /// Erase all data in the store
    Reset {
        /// Required confirmation flag
        #[arg(long)]
        yes: bool,
    },
}

fn default_store_path() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|d| d.join("bizstore"))
        .ok_or_else(|| eyre!("could not determine the platform data directory"))
}

fn main() -> Result<()> {
    // Setup tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let store_path = match cli.store_path {
        Some(path) => path,
        None => default_store_path()?,
    };
    let mut engine = Engine::open(&store_path)?;

    match cli.command {
        Commands::Stats => {
            let stats = sync::get_stats(&engine)?;
            println!("{}", "Store statistics".bold());
            println!("  clients:   {}", stats.total_clients.to_string().cyan());
            println!("  estimates: {}", stats.total_estimates.to_string().cyan());
            println!("  invoices:  {}", stats.total_invoices.to_string().cyan());
            println!("  total:     {}", stats.total_records.to_string().green());
        }
        Commands::Export { file } => {
            let bundle = sync::export_all(&mut engine)?;
            let json = serde_json::to_string_pretty(&bundle)?;
            match file {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Exported {} records to {}", bundle.metadata.client_count
                        + bundle.metadata.estimate_count
                        + bundle.metadata.invoice_count, path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Import { file, mode } => {
            let mode = ImportMode::parse(&mode)?;
            let json = std::fs::read_to_string(&file)?;
            let bundle = serde_json::from_str(&json)?;
            let report = sync::import_all(&mut engine, &bundle, mode)?;
            print_report(&report);
        }
        Commands::Backup => {
            let encoded = sync::create_shareable_backup(&mut engine)?;
            println!("{encoded}");
        }
        Commands::Restore { file, mode } => {
            let mode = ImportMode::parse(&mode)?;
            let encoded = if file.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin())?
            } else {
                std::fs::read_to_string(&file)?
            };
            let report = sync::restore_from_shareable_backup(&mut engine, &encoded, mode)?;
            print_report(&report);
        }
        Commands::Reset { yes } => {
            if !yes {
                return Err(eyre!("refusing to erase the store without --yes"));
            }
            sync::clear_all_data(&mut engine)?;
            println!("{}", "Store erased".red());
        }
    }

    Ok(())
}

fn print_report(report: &bizstore::ImportReport) {
    for (name, tally) in [
        ("clients", report.clients),
        ("estimates", report.estimates),
        ("invoices", report.invoices),
    ] {
        println!(
            "  {name}: {} imported, {} skipped, {} errors",
            tally.imported.to_string().green(),
            tally.skipped.to_string().yellow(),
            tally.errors.to_string().red(),
        );
    }
}
