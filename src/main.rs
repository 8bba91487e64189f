//! rentdb CLI - inspect and maintain a rental data directory

use clap::{Parser, Subcommand};
use rentdb::entities::booking::{self, NewBooking};
use rentdb::overlap::find_conflict;
use rentdb::storage::persist;
use rentdb::{CollectionKind, DateRange, Store, StoreConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rentdb")]
#[command(about = "A JSON-file record store for a property-rental application", long_about = None)]
struct Cli {
    /// Data directory (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// Config file (defaults to <data-dir>/rentdb.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config into the data directory
    Init,

    /// Show every collection file and its record count
    Status,

    /// Print the records of one collection
    List {
        /// users, properties, bookings, complaints or notifications
        collection: CollectionKind,
    },

    /// Book a property
    Book {
        property: u64,
        user: u64,
        /// YYYY-MM-DD
        check_in: String,
        /// YYYY-MM-DD
        check_out: String,
    },

    /// Cancel a booking
    Cancel {
        booking: u64,

        /// Remove the record instead of marking it inactive
        #[arg(long)]
        hard: bool,
    },

    /// Check whether a stay is free without booking it
    Check {
        property: u64,
        check_in: String,
        check_out: String,
    },

    /// Remove temp files left behind by interrupted commits
    Sweep {
        /// Also remove temp files younger than ten minutes. Only safe when
        /// nothing else is writing to the data directory.
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::discover(&cli.data_dir)?,
    };

    let result = match cli.command {
        Commands::Init => init_store(&cli.data_dir, config).await,
        Commands::Status => show_status(config).await,
        Commands::List { collection } => list_records(config, collection).await,
        Commands::Book {
            property,
            user,
            check_in,
            check_out,
        } => book(config, property, user, &check_in, &check_out).await,
        Commands::Cancel { booking, hard } => cancel(config, booking, hard).await,
        Commands::Check {
            property,
            check_in,
            check_out,
        } => check(config, property, &check_in, &check_out).await,
        Commands::Sweep { all } => sweep(config, all),
    };

    if let Err(e) = &result {
        if let Some(rentdb_err) = e.downcast_ref::<rentdb::Error>() {
            if let Some(hint) = rentdb_err.suggestion() {
                eprintln!("hint: {}", hint);
            }
        }
    }
    result
}

async fn init_store(dir: &Path, config: StoreConfig) -> anyhow::Result<()> {
    println!("Initializing rentdb store at {:?}...", config.data_dir);
    let store = Store::open(config).await?;

    let config_path = dir.join(rentdb::config::CONFIG_FILE_NAME);
    if config_path.exists() {
        println!("Config already present at {:?}", config_path);
    } else {
        let yaml = serde_yaml::to_string(store.config())?;
        tokio::fs::write(&config_path, yaml).await?;
        println!("Wrote {:?}", config_path);
    }

    println!();
    println!("Collection files:");
    for kind in CollectionKind::ALL {
        println!("  {:<14} {:?}", kind.name(), store.path(kind));
    }
    println!();
    println!("Files are created on the first write to each collection.");
    Ok(())
}

async fn show_status(config: StoreConfig) -> anyhow::Result<()> {
    let store = Store::open(config).await?;

    println!("rentdb Store Status");
    println!("===================");
    println!("Data directory: {:?}", store.config().data_dir);
    println!();

    for status in store.status().await? {
        let state = if status.exists { "" } else { " (no file yet)" };
        println!("  {:<14} {:>6} record(s){}", status.kind.name(), status.records, state);
    }
    Ok(())
}

async fn list_records(config: StoreConfig, kind: CollectionKind) -> anyhow::Result<()> {
    let store = Store::open(config).await?;
    let collection = store.load(kind).await?;

    if collection.is_empty() {
        println!("No {} found.", kind);
        return Ok(());
    }

    for record in collection.records() {
        println!("--- {} {} ---", kind.id_field(), record.id);
        for (key, value) in &record.fields {
            println!("  {}: {}", key, value);
        }
    }
    println!("({} record(s))", collection.len());
    Ok(())
}

async fn book(
    config: StoreConfig,
    property: u64,
    user: u64,
    check_in: &str,
    check_out: &str,
) -> anyhow::Result<()> {
    let store = Store::open(config).await?;
    let request = NewBooking::parse(property, user, check_in, check_out)?;
    let record = booking::create_booking(&store, request).await?;
    println!("Booking {} created for property {}.", record.id, property);
    Ok(())
}

async fn cancel(config: StoreConfig, id: u64, hard: bool) -> anyhow::Result<()> {
    let store = Store::open(config).await?;
    if hard {
        if booking::cancel_booking(&store, id).await? {
            println!("Booking {} removed.", id);
        } else {
            println!("Booking {} does not exist.", id);
        }
    } else {
        booking::set_booking_status(&store, id, false).await?;
        println!("Booking {} cancelled.", id);
    }
    Ok(())
}

async fn check(config: StoreConfig, property: u64, check_in: &str, check_out: &str) -> anyhow::Result<()> {
    let store = Store::open(config).await?;
    let stay = DateRange::parse(check_in, check_out)?;
    let bookings = store.load(CollectionKind::Bookings).await?;

    match find_conflict(&bookings, property, &stay, None) {
        Some(existing) => println!(
            "Property {} is taken: conflicts with booking {}.",
            property, existing.id
        ),
        None => println!("Property {} is free from {} to {}.", property, check_in, check_out),
    }
    Ok(())
}

fn sweep(config: StoreConfig, all: bool) -> anyhow::Result<()> {
    let min_age = if all { Duration::ZERO } else { persist::STALE_TEMP_AGE };
    let mut removed = 0;
    for kind in CollectionKind::ALL {
        removed += persist::sweep_temp_files(&config.path_for(kind), min_age)?;
    }
    println!("Removed {} temp file(s).", removed);
    Ok(())
}
