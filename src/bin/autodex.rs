//! Autodex CLI
//!
//! Checks a catalog file and answers unit questions against its header.

use std::path::PathBuf;

use anyhow::Context;
use autodex::{AutodexConfig, CatalogStore, Diagnostic};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "autodex")]
#[command(about = "Validate a storage catalog and convert between its units")]
struct Cli {
    /// Catalog file (defaults to the configured store path)
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Extra config file layered over the default locations
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the catalog and validate header and every record
    Check,

    /// Validate only the header
    Header,

    /// Convert a quantity such as "100psi" into another unit
    Convert {
        /// Number followed by a unit symbol
        quantity: String,
        /// Target unit symbol
        unit: String,
    },

    /// List every unit convertible to and from the given one
    Units {
        /// Unit symbol
        unit: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(Ok(())) => {}
        Ok(Err(diagnostic)) => {
            println!("[{}] {}", diagnostic.code(), diagnostic);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// Outer errors are setup failures; inner ones are catalog diagnostics
fn run(cli: Cli) -> anyhow::Result<Result<(), Diagnostic>> {
    let config = AutodexConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;
    let mut store = CatalogStore::from_config(&config);
    if let Some(path) = cli.catalog {
        store = CatalogStore::new(path)
            .with_validator(store.validator().clone())
            .with_format(config.store.output_format);
    }

    Ok(match cli.command {
        Commands::Check => store.check().map(|()| {
            println!("✅ {} is consistent", store.path().display());
        }),
        Commands::Header => store.read_header().map(|_| {
            println!("✅ header of {} is well-formed", store.path().display());
        }),
        Commands::Convert { quantity, unit } => store.read_header()
            .and_then(|header| header.units())
            .and_then(|units| units.convert_quantity(&quantity, &unit))
            .map(|value| println!("{value}{unit}")),
        Commands::Units { unit } => store.read_header()
            .and_then(|header| header.units())
            .and_then(|units| units.compatible_units(&unit, false))
            .map(|compatible| {
                for other in compatible {
                    println!("{other}");
                }
            }),
    })
}
