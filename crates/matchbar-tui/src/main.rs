#![deny(unsafe_code)]

//! matchbar TUI: an interactive matcher bar in the terminal.

mod app;
mod demo;
mod keymap;
mod panels;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    ExecutableCommand,
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use matchbar_config::MatchbarConfig;
use matchbar_core::config::Config;
use matchbar_core::diagnostics::DiagnosticsLayer;
use ratatui::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::app::App;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = PathBuf::from("matchbar.toml");
    let (settings, load_error) = if config_path.exists() {
        match MatchbarConfig::load(&config_path).await {
            Ok(settings) => (settings, None),
            Err(e) => (MatchbarConfig::default(), Some(e)),
        }
    } else {
        (MatchbarConfig::default(), None)
    };

    // Engine events go to the diagnostics pane; stdout belongs to the terminal UI.
    let diagnostics = DiagnosticsLayer::new(500).with_target_prefix("matchbar");
    let reader = diagnostics.reader();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::registry()
        .with(diagnostics.with_filter(filter))
        .init();

    if let Some(error) = load_error {
        warn!(path = %config_path.display(), %error, "Config file invalid, using defaults");
    }

    let config = if settings.sources.is_empty() {
        info!("No sources configured, using the built-in demo set");
        Config::from_settings(&settings, demo::sources())?.with_functions(demo::functions())
    } else {
        Config::from_settings(&settings, Vec::new())?
    };

    info!(sources = config.sources.len(), "Starting matchbar TUI");

    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    io::stdout().execute(EnableBracketedPaste)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let mut app = App::new(Arc::new(config), reader);
    let result = run(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    io::stdout().execute(DisableBracketedPaste)?;
    io::stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    while !app.should_quit {
        app.tick();
        terminal.draw(|frame| app.render(frame)).context("drawing frame")?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    app.handle_action(keymap::resolve(key));
                }
                Event::Paste(text) => app.paste(&text).await,
                Event::FocusGained => app.controller.focus(),
                Event::FocusLost => app.controller.blur(),
                _ => {}
            }
        }
    }
    Ok(())
}
