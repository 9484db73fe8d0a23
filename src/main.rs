use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use invoicing_genius::cli::{
    handle_backup_command, handle_history_command, handle_sync_command, BackupCommands,
    SyncCommands,
};
use invoicing_genius::config::paths::DATA_DIR_ENV;
use invoicing_genius::config::{InvoicingPaths, Settings};
use invoicing_genius::models::OwnerId;
use invoicing_genius::storage::JsonFileBackend;

#[derive(Parser)]
#[command(
    name = "invoicing",
    version,
    about = "Backup, restore and sync for Invoicing Genius data",
    long_about = "Creates portable snapshots of one owner's invoices, estimates, \
                  clients, products, recurring schedules, profile and settings, \
                  and restores them by merging or overwriting."
)]
struct Cli {
    /// Data directory (overrides the platform default)
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Backup management commands
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Offline sync commands
    #[command(subcommand)]
    Sync(SyncCommands),

    /// Show recent backup, restore and sync activity
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Initialize the data directory and default owner
    Init {
        /// Owner ID to use by default (a new one is generated otherwise)
        #[arg(long)]
        owner: Option<String>,

        /// Device name stamped into backups
        #[arg(long)]
        device_name: Option<String>,
    },

    /// Show current configuration and paths
    Config,
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = match cli.data_dir {
        Some(dir) => InvoicingPaths::with_base_dir(dir),
        None => InvoicingPaths::new()?,
    };
    let mut settings = Settings::load_or_create(&paths)?;

    match cli.command {
        Some(Commands::Backup(cmd)) => {
            let backend = JsonFileBackend::open(paths)?;
            handle_backup_command(&backend, &settings, cmd)?;
        }
        Some(Commands::Sync(cmd)) => {
            let backend = JsonFileBackend::open(paths)?;
            handle_sync_command(&backend, &settings, cmd)?;
        }
        Some(Commands::History { limit }) => {
            let backend = JsonFileBackend::open(paths)?;
            handle_history_command(&backend, limit)?;
        }
        Some(Commands::Init { owner, device_name }) => {
            println!("Initializing Invoicing Genius at: {}", paths.base_dir().display());
            paths.ensure_directories()?;

            let owner = match owner {
                Some(raw) => raw.parse::<OwnerId>()?,
                None => settings.default_owner.unwrap_or_default(),
            };
            settings.default_owner = Some(owner);
            if device_name.is_some() {
                settings.device_name = device_name;
            }
            settings.save(&paths)?;

            println!("Initialization complete!");
            println!("Default owner: {}", owner);
        }
        Some(Commands::Config) => {
            println!("Invoicing Genius Configuration");
            println!("==============================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Data directory:   {}", paths.data_dir().display());
            println!("Download directory: {}", settings.download_dir(&paths).display());
            println!("Audit log:        {}", paths.audit_log().display());
            println!();
            println!("Settings:");
            match settings.default_owner {
                Some(owner) => println!("  Default owner: {}", owner),
                None => println!("  Default owner: (not set)"),
            }
            println!("  Device: {}", settings.device_info());
            println!(
                "  Backup before overwrite: {}",
                settings.backup_defaults.backup_before_overwrite
            );
            if !settings.backup_defaults.excluded.is_empty() {
                let excluded: Vec<String> = settings
                    .backup_defaults
                    .excluded
                    .iter()
                    .map(|c| c.to_string())
                    .collect();
                println!("  Excluded by default: {}", excluded.join(", "));
            }
        }
        None => {
            println!("Invoicing Genius - backup, restore and sync");
            println!();
            println!("Run 'invoicing --help' for usage information.");
            println!("Run 'invoicing init' to set up a default owner.");
        }
    }

    Ok(())
}
