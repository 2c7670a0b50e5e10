use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crimewatch::config::Settings;
use crimewatch::pipeline::RunOutcome;
use crimewatch::storage::{self, Store};

#[derive(Parser)]
#[command(
    name = "crimewatch",
    about = "Street-crime anomaly monitor for the data.police.uk open data API",
    version,
    long_about = None
)]
struct Cli {
    /// TOML config file (default: $CRIMEWATCH_CONFIG, then
    /// /etc/crimewatch/crimewatch.toml, then compiled-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (recurring polls, alerts to the log)
    Serve {
        #[command(flatten)]
        watch: WatchArgs,

        /// Seconds between polls
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Execute a single run now and print any alerts
    Run {
        #[command(flatten)]
        watch: WatchArgs,
    },

    /// Show the figures recorded by the most recent completed run
    Figures {
        /// Path to the SQLite state database
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Inspect or reset the update checkpoint
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,

        /// Path to the SQLite state database
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[derive(Args)]
struct WatchArgs {
    /// Latitude of the watched location
    #[arg(long)]
    lat: Option<f64>,

    /// Longitude of the watched location
    #[arg(long)]
    lng: Option<f64>,

    /// Months of history in the rolling baseline
    #[arg(long)]
    months: Option<u32>,

    /// Alert threshold as a percentage of the baseline
    #[arg(long)]
    threshold: Option<f64>,

    /// Path to the SQLite state database
    #[arg(long)]
    db: Option<PathBuf>,
}

impl WatchArgs {
    fn apply(self, settings: &mut Settings) {
        if let Some(lat) = self.lat {
            settings.watch.latitude = Some(lat);
        }
        if let Some(lng) = self.lng {
            settings.watch.longitude = Some(lng);
        }
        if let Some(months) = self.months {
            settings.watch.month_count = months;
        }
        if let Some(threshold) = self.threshold {
            settings.watch.threshold_percent = Some(threshold);
        }
        if let Some(db) = self.db {
            settings.storage.db_path = db;
        }
    }
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// Print the current checkpoint
    Show,

    /// Delete the checkpoint so the next run reprocesses the full window
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::load_or_default(),
    };

    match cli.command {
        Commands::Serve {
            watch,
            interval_secs,
        } => {
            watch.apply(&mut settings);
            if let Some(secs) = interval_secs {
                settings.scheduler.poll_interval_secs = secs;
            }
            tracing::info!("Starting crimewatch daemon");
            crimewatch::serve(&settings).await?;
        }
        Commands::Run { watch } => {
            watch.apply(&mut settings);
            match crimewatch::run_once(&settings).await? {
                RunOutcome::NoNewData {
                    upstream_last_updated,
                } => {
                    println!(
                        "No new data: upstream last updated {}",
                        upstream_last_updated.date_naive()
                    );
                }
                RunOutcome::Completed(report) => {
                    println!(
                        "\nRun {} (data as of {}, {} months)",
                        report.run_id,
                        report.data_as_of.date_naive(),
                        report.months.len()
                    );
                    if report.alerts.is_empty() {
                        println!(
                            "All {} categories within threshold.",
                            report.figures.len()
                        );
                    } else {
                        println!("{:<25} | {:<10} | Deviation", "Category", "Average");
                        println!("{:-<25}-|-{:-<10}-|-{:-<25}", "", "", "");
                        for (category, deviation) in &report.alerts {
                            let average = report
                                .figures
                                .get(category)
                                .map(|f| f.average)
                                .unwrap_or(0.0);
                            println!("{:<25} | {:<10.1} | {}", category, average, deviation);
                        }
                    }
                }
            }
        }
        Commands::Figures { db } => {
            if let Some(db) = db {
                settings.storage.db_path = db;
            }
            let pool = storage::open_pool(&settings.storage.db_path)?;
            let store = Store::new(pool);

            match store.read_figures()? {
                None => println!("No figures recorded yet."),
                Some(record) => {
                    println!(
                        "Run {} (data as of {}, {} months)",
                        record.run_id,
                        record.data_as_of.date_naive(),
                        record.months.len()
                    );
                    println!("{:<25} | {:<10} | Deviation", "Category", "Average");
                    println!("{:-<25}-|-{:-<10}-|-{:-<25}", "", "", "");
                    for (category, figure) in &record.figures {
                        println!(
                            "{:<25} | {:<10.1} | {}",
                            category, figure.average, figure.deviation
                        );
                    }
                }
            }
        }
        Commands::Checkpoint { action, db } => {
            if let Some(db) = db {
                settings.storage.db_path = db;
            }
            let pool = storage::open_pool(&settings.storage.db_path)?;
            let store = Store::new(pool);

            match action {
                CheckpointAction::Show => match store.read_checkpoint()? {
                    Some(ts) => println!("Checkpoint: {}", ts.to_rfc3339()),
                    None => {
                        println!("No checkpoint recorded (next run processes the full window).")
                    }
                },
                CheckpointAction::Reset => {
                    store.clear_checkpoint()?;
                    println!("Checkpoint cleared.");
                }
            }
        }
    }

    Ok(())
}
