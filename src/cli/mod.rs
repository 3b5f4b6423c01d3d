use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::ConfigLoader;
use crate::repository::FileSystemRepository;

pub mod commands;

use self::commands::ScanArgs;

#[derive(Parser, Debug)]
#[command(
    name = "notekiosk",
    version,
    about = "Hands-off terminal kiosk that cycles through your notes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over NOTEKIOSK_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the notes directory (takes precedence over NOTEKIOSK_NOTES)
    #[arg(long)]
    pub notes_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive kiosk (default)
    Kiosk,
    /// Scan the note tree and print what the kiosk would display
    Scan(ScanArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("NOTEKIOSK_CONFIG", path);
    }
    if let Some(path) = &cli.notes_dir {
        env::set_var("NOTEKIOSK_NOTES", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;

    let repository = FileSystemRepository::new(config.notes_path.clone(), config.new_first);

    let config = Arc::new(config);
    let command = cli.command.unwrap_or(Commands::Kiosk);
    match command {
        Commands::Kiosk => {
            let mut app = App::new(config, Box::new(repository));
            commands::run_kiosk(&mut app)
        }
        Commands::Scan(args) => commands::scan_notes(repository, args),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
