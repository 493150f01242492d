use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shopdesk_core::config::TOKEN_ENV_VAR;
use shopdesk_core::Config;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;

#[derive(Parser)]
#[command(name = "shopdesk")]
#[command(version, about = "Terminal chat assistant for e-commerce support questions")]
struct Cli {
    /// Inference endpoint base URL (overrides the config file)
    #[arg(long)]
    endpoint: Option<String>,

    /// Model identifier (overrides the config file)
    #[arg(short, long)]
    model: Option<String>,

    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write logs
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.clone())?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if cli.endpoint.is_some() {
        config.endpoint = cli.endpoint;
    }
    if cli.model.is_some() {
        config.model = cli.model;
    }

    let credential = Config::credential_from_env();
    let missing_credential = credential.is_none();
    info!("Starting with model {} at {}", config.model(), config.endpoint());

    let mut app = App::new(config.build_client(credential));
    if missing_credential {
        // stderr is about to become the alternate screen, so say it in the header
        app = app.with_startup_notice(format!("{} not set", TOKEN_ENV_VAR));
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::draw(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    info!("Exiting");
    Ok(())
}

fn init_logging(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => dirs::cache_dir()
            .ok_or_else(|| anyhow!("Could not determine cache directory"))?
            .join("shopdesk")
            .join("shopdesk.log"),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    // The terminal belongs to the UI, so logs go to a file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}
