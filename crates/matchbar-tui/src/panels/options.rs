//! Option drop-down: suggestions grouped by category.

use matchbar_core::aggregate::Suggestions;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState},
};

pub struct OptionsPanel {
    /// Visible rows, borders excluded.
    max_rows: u16,
    min_width: u16,
}

impl OptionsPanel {
    pub fn new(max_rows: Option<u16>, min_width: Option<u16>) -> Self {
        Self {
            max_rows: max_rows.unwrap_or(10).max(1),
            min_width: min_width.unwrap_or(20),
        }
    }

    /// Rows needed for `suggestions`, borders included; 0 when closed.
    pub fn height(&self, suggestions: &Suggestions) -> u16 {
        if suggestions.is_empty() {
            return 0;
        }
        let rows = suggestions.total() + suggestions.categories().len();
        (rows as u16).min(self.max_rows) + 2
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, suggestions: &Suggestions, active: Option<usize>) {
        if suggestions.is_empty() || area.height == 0 {
            return;
        }

        let header = Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD);
        let mut items = Vec::new();
        let mut selected_row = None;
        let mut option_index = 0;
        let mut longest = 0;
        for category in suggestions.categories() {
            items.push(ListItem::new(Line::styled(category.title.clone(), header)));
            longest = longest.max(category.title.len());
            for option in &category.options {
                if active == Some(option_index) {
                    selected_row = Some(items.len());
                }
                let text = if option.text == option.value.to_string() {
                    format!("  {}", option.text)
                } else {
                    format!("  {} ({})", option.text, option.value)
                };
                longest = longest.max(text.len());
                items.push(ListItem::new(text));
                option_index += 1;
            }
        }

        let width = (longest as u16 + 4).max(self.min_width).min(area.width);
        let area = Rect { width, ..area };
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan));
        let mut state = ListState::default().with_selected(selected_row);
        frame.render_stateful_widget(list, area, &mut state);
    }
}
