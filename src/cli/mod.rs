use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigLoader;

pub mod commands;

use self::commands::{EditArgs, SearchArgs, TagArgs};

#[derive(Parser, Debug)]
#[command(
    name = "chatdex",
    version,
    about = "Search, tag, and amend a conversation library"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file location (takes precedence over CHATDEX_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over CHATDEX_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Read the conversation library from this JSON file instead of the
    /// configured location
    #[arg(long)]
    pub library: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search conversations by text and structured filters
    Search(SearchArgs),
    /// List every tag in use with its count, color, and last-used time
    Tags,
    /// Add or remove a tag on a conversation
    Tag(TagArgs),
    /// Edit a message, optionally truncating the messages after it
    Edit(EditArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("CHATDEX_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("CHATDEX_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;

    let library_path = cli
        .library
        .unwrap_or_else(|| config.library.conversations_file.clone());

    match cli.command {
        Commands::Search(args) => commands::search(&library_path, &config, args),
        Commands::Tags => commands::list_tags(&library_path),
        Commands::Tag(args) => commands::handle_tag_command(&library_path, args),
        Commands::Edit(args) => commands::edit_message(&library_path, args),
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
