//! The matcher bar: committed matchers as chips plus the edit slot.

use matchbar_core::matcher::{matcher_display, matcher_tooltip};
use matchbar_core::sequence::SequenceController;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

pub struct BarPanel {
    /// Operators are not shown in simple mode.
    hide_operators: bool,
}

impl BarPanel {
    pub fn new(hide_operators: bool) -> Self {
        Self { hide_operators }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, controller: &SequenceController) {
        let session = controller.session();
        let edit_style = Style::default().fg(Color::Black).bg(Color::Yellow);
        let mut spans: Vec<Span> = Vec::new();
        let mut width: usize = 0;
        let mut cursor = None;

        if let Some(function) = controller.function() {
            let span = Span::styled(
                format!(" {} ", function.name),
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            );
            width += span.width() + 1;
            spans.push(span);
            spans.push(Span::raw(" "));
        }

        for (index, matcher) in controller.matchers().iter().enumerate() {
            let span = if controller.editing() == Some(index) {
                cursor = Some(width + 1 + prefix_width(session.text(), session.cursor()));
                Span::styled(format!(" {} ", session.text()), edit_style)
            } else {
                let style = if controller.mismatched().contains(&index) {
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
                } else if matcher.is_free_text() {
                    Style::default().fg(Color::Gray)
                } else {
                    Style::default().fg(Color::Cyan)
                };
                let label = matcher_display(matcher, controller.is_first(index), self.hide_operators);
                Span::styled(format!("[{label}]"), style)
            };
            width += span.width() + 1;
            spans.push(span);
            spans.push(Span::raw(" "));
        }

        if controller.editing().is_none() {
            spans.push(Span::styled("> ", Style::default().fg(Color::DarkGray)));
            cursor = Some(width + 2 + prefix_width(session.text(), session.cursor()));
            spans.push(Span::raw(session.text()));
        }

        let title = match controller.editing().and_then(|i| controller.matchers().get(i)) {
            Some(matcher) => format!(" Matchers: {} ", matcher_tooltip(matcher)),
            None => " Matchers ".to_string(),
        };
        let bar = Paragraph::new(Line::from(spans)).block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(bar, area);

        if controller.has_focus()
            && let Some(offset) = cursor
        {
            let x = area.x.saturating_add(1).saturating_add(offset as u16);
            frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(2)), area.y + 1));
        }
    }
}

/// Display width of the first `cursor` chars of `text`.
fn prefix_width(text: &str, cursor: usize) -> usize {
    let prefix: String = text.chars().take(cursor).collect();
    Span::raw(prefix).width()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_width_counts_chars() {
        assert_eq!(prefix_width("& =EUR", 3), 3);
        assert_eq!(prefix_width("é1", 1), 1);
        assert_eq!(prefix_width("ab", 10), 2);
    }
}
