//! Diagnostics panel: scrollable view of captured engine events.

use matchbar_core::diagnostics::DiagnosticsReader;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, Paragraph},
};
use tracing::Level;

/// Engine event viewer with auto-follow.
pub struct DiagnosticsPanel {
    reader: DiagnosticsReader,
    /// Cached snapshot, refreshed on tick.
    lines: Vec<EventLine>,
    /// Scroll offset (0 = latest).
    scroll_offset: usize,
    auto_follow: bool,
}

struct EventLine {
    elapsed: String,
    level: Level,
    message: String,
    fields: String,
}

impl DiagnosticsPanel {
    pub fn new(reader: DiagnosticsReader) -> Self {
        Self {
            reader,
            lines: Vec::new(),
            scroll_offset: 0,
            auto_follow: true,
        }
    }

    pub fn refresh(&mut self) {
        self.lines = self
            .reader
            .entries()
            .into_iter()
            .map(|e| EventLine {
                elapsed: format!("{:>8.2}s", e.elapsed_secs),
                level: e.level,
                message: e.message,
                fields: e
                    .fields
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(" "),
            })
            .collect();

        if self.auto_follow {
            self.scroll_offset = 0;
        }
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.auto_follow = false;
        let max_offset = self.lines.len().saturating_sub(1);
        self.scroll_offset = (self.scroll_offset + n).min(max_offset);
    }

    pub fn scroll_down(&mut self, n: usize) {
        if self.scroll_offset >= n {
            self.scroll_offset -= n;
        } else {
            self.scroll_offset = 0;
            self.auto_follow = true;
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let visible_height = area.height.saturating_sub(2) as usize;

        if self.lines.is_empty() {
            let empty = Paragraph::new("  (no engine events yet)")
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().title(" Diagnostics (0) ").borders(Borders::ALL));
            frame.render_widget(empty, area);
            return;
        }

        let total = self.lines.len();
        let skip = total.saturating_sub(visible_height + self.scroll_offset);

        let items: Vec<ListItem> = self
            .lines
            .iter()
            .skip(skip)
            .take(visible_height)
            .map(|line| {
                let level_style = match line.level {
                    Level::ERROR => Style::default().fg(Color::Red),
                    Level::WARN => Style::default().fg(Color::Yellow),
                    Level::INFO => Style::default().fg(Color::Green),
                    Level::DEBUG => Style::default().fg(Color::Blue),
                    Level::TRACE => Style::default().fg(Color::DarkGray),
                };
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{} ", line.elapsed), Style::default().fg(Color::DarkGray)),
                    Span::styled(format!("{:>5} ", line.level), level_style),
                    Span::raw(format!("{} ", line.message)),
                    Span::styled(line.fields.as_str(), Style::default().fg(Color::DarkGray)),
                ]))
            })
            .collect();

        let follow = if self.auto_follow { " [follow]" } else { "" };
        let title = format!(" Diagnostics ({total}){follow} ");
        let list = List::new(items).block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(list, area);
    }
}
