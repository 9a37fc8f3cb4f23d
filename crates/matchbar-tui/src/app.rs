//! Core TUI application state and event handling.

use std::sync::Arc;

use matchbar_core::config::{Config, OperatorMode};
use matchbar_core::diagnostics::DiagnosticsReader;
use matchbar_core::matcher::{is_first, matcher_display};
use matchbar_core::sequence::{SequenceController, SequenceEvent};
use ratatui::{prelude::*, widgets::Paragraph};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

use crate::keymap::Action;
use crate::panels::{BarPanel, DiagnosticsPanel, OptionsPanel};

/// TUI application state.
pub struct App {
    pub should_quit: bool,

    pub controller: SequenceController,

    events: broadcast::Receiver<SequenceEvent>,

    /// Outcome of the last submission.
    pub status_message: String,

    pub show_diagnostics: bool,

    pub bar: BarPanel,

    pub options: OptionsPanel,

    pub diagnostics: DiagnosticsPanel,
}

impl App {
    pub fn new(config: Arc<Config>, reader: DiagnosticsReader) -> Self {
        let bar = BarPanel::new(config.mode == OperatorMode::Simple);
        let options = OptionsPanel::new(config.display.max_drop_down_height, config.display.min_drop_down_width);
        let mut controller = SequenceController::new(config);
        let events = controller.subscribe();
        controller.focus();

        Self {
            should_quit: false,
            controller,
            events,
            status_message: String::new(),
            show_diagnostics: true,
            bar,
            options,
            diagnostics: DiagnosticsPanel::new(reader),
        }
    }

    pub fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::ToggleDiagnostics => self.show_diagnostics = !self.show_diagnostics,
            Action::ScrollDiagnosticsUp => self.diagnostics.scroll_up(1),
            Action::ScrollDiagnosticsDown => self.diagnostics.scroll_down(1),
            Action::Engine(key) => {
                self.controller.handle_key(key);
            }
            Action::None => {}
        }
    }

    /// Bulk-parse pasted text into the sequence.
    pub async fn paste(&mut self, text: &str) {
        let outcome = self.controller.paste(text).await;
        if !outcome.unmatched.is_empty() {
            self.status_message = format!("Not matched: {}", outcome.unmatched.join(", "));
        }
    }

    /// Tick: apply arrived suggestions and drain sequence events.
    pub fn tick(&mut self) {
        self.controller.poll_responses();
        loop {
            match self.events.try_recv() {
                Ok(event) => self.on_event(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        self.diagnostics.refresh();
    }

    fn on_event(&mut self, event: SequenceEvent) {
        match event {
            SequenceEvent::MatchersChanged(_) => {}
            SequenceEvent::Complete { matchers, function } => {
                let terms: Vec<String> = matchers
                    .iter()
                    .enumerate()
                    .map(|(i, m)| matcher_display(m, is_first(&matchers, i), false))
                    .collect();
                self.status_message = match function {
                    Some(name) => format!("Submitted {name}: {}", terms.join(" ")),
                    None => format!("Submitted: {}", terms.join(" ")),
                };
            }
            SequenceEvent::CompleteError { function, missing } => {
                self.status_message = format!("{function} still needs {}", missing.join(", "));
            }
        }
    }

    pub fn render(&self, frame: &mut Frame) {
        let suggestions = self.controller.session().suggestions();
        let diagnostics_height = if self.show_diagnostics { 10 } else { 0 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),                  // bar
                Constraint::Length(1),                  // error
                Constraint::Min(0),                     // options
                Constraint::Length(diagnostics_height), // diagnostics
                Constraint::Length(1),                  // status
            ])
            .split(frame.area());

        self.bar.render(frame, chunks[0], &self.controller);

        if let Some(error) = self.controller.error() {
            frame.render_widget(
                Paragraph::new(error).style(Style::default().fg(Color::Red)),
                chunks[1],
            );
        }

        let options_area = Rect {
            height: self.options.height(suggestions).min(chunks[2].height),
            ..chunks[2]
        };
        self.options
            .render(frame, options_area, suggestions, self.controller.session().active_option());

        if self.show_diagnostics {
            self.diagnostics.render(frame, chunks[3]);
        }

        let status = Paragraph::new(self.status_line()).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(status, chunks[4]);
    }

    pub fn status_line(&self) -> String {
        let pending = self.controller.session().pending();
        let waiting = if pending > 0 { format!(" [{pending} pending]") } else { String::new() };
        format!(
            " ^Q:quit  F2:diagnostics  Enter:select/submit  S-Arrows:move  C-Arrows:reorder{waiting}  {}",
            self.status_message
        )
    }
}
