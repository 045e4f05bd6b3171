use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod clipboard;
mod handler;
mod highlight;
mod markdown;
mod tui;
mod ui;

use app::App;
use assistant_core::Config;
use tui::{EventHandler, Tui};

/// Send logs to `<config dir>/assistant.log`; the terminal belongs to the UI.
fn init_logging() -> Result<()> {
    let dir = Config::config_dir()?;
    fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("assistant.log"))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = init_logging() {
        eprintln!("Logging disabled: {:#}", e);
    }

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not load config, using defaults");
        Config::new()
    });
    tracing::info!(chat_url = %config.chat_url, docstore_url = %config.docstore_url, "Starting assistant");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, &config).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut Tui, config: &Config) -> Result<()> {
    let mut events = EventHandler::new();
    let mut app = App::new(config, events.sender());
    let mut line_cache = ui::LineCache::new();
    app.check_health();

    while !app.should_quit {
        terminal.draw(|frame| {
            let layout = ui::render(&app.view(), &mut line_cache, frame);
            app.record_layout(layout);
        })?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event)?,
            None => break,
        }
    }

    tracing::info!("Shutting down");
    Ok(())
}
