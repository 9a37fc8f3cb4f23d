//! Terminal key bindings.
//!
//! Maps crossterm key events to host actions. Everything the host does not
//! claim is forwarded to the engine as a [`KeyInput`].

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use matchbar_core::keys::{Key, KeyInput, Modifiers};

/// An action the TUI can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleDiagnostics,
    ScrollDiagnosticsUp,
    ScrollDiagnosticsDown,
    /// A key for the matcher bar.
    Engine(KeyInput),
    None,
}

/// Resolve one key press.
pub fn resolve(event: KeyEvent) -> Action {
    let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
    let shift = event.modifiers.contains(KeyModifiers::SHIFT);

    match event.code {
        KeyCode::Char('c' | 'q') if ctrl => return Action::Quit,
        KeyCode::F(2) => return Action::ToggleDiagnostics,
        KeyCode::Up if ctrl => return Action::ScrollDiagnosticsUp,
        KeyCode::Down if ctrl => return Action::ScrollDiagnosticsDown,
        _ => {}
    }

    let key = match event.code {
        // Shift is already folded into the character.
        KeyCode::Char(c) => {
            return Action::Engine(KeyInput {
                key: Key::Char(c),
                modifiers: Modifiers { shift: false, ctrl },
            });
        }
        KeyCode::BackTab => {
            return Action::Engine(KeyInput::shift(Key::Tab));
        }
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::Enter => Key::Enter,
        KeyCode::Tab => Key::Tab,
        KeyCode::Esc => Key::Escape,
        KeyCode::Up => Key::ArrowUp,
        KeyCode::Down => Key::ArrowDown,
        KeyCode::Left => Key::ArrowLeft,
        KeyCode::Right => Key::ArrowRight,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        _ => return Action::None,
    };
    Action::Engine(KeyInput {
        key,
        modifiers: Modifiers { shift, ctrl },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Action {
        resolve(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn test_host_keys() {
        assert_eq!(press(KeyCode::Char('c'), KeyModifiers::CONTROL), Action::Quit);
        assert_eq!(press(KeyCode::Char('q'), KeyModifiers::CONTROL), Action::Quit);
        assert_eq!(press(KeyCode::F(2), KeyModifiers::NONE), Action::ToggleDiagnostics);
        assert_eq!(press(KeyCode::Up, KeyModifiers::CONTROL), Action::ScrollDiagnosticsUp);
    }

    #[test]
    fn test_plain_characters() {
        assert_eq!(press(KeyCode::Char('q'), KeyModifiers::NONE), Action::Engine(KeyInput::char('q')));
        assert_eq!(press(KeyCode::Char('Q'), KeyModifiers::SHIFT), Action::Engine(KeyInput::char('Q')));
    }

    #[test]
    fn test_modified_keys() {
        assert_eq!(
            press(KeyCode::Left, KeyModifiers::SHIFT),
            Action::Engine(KeyInput::shift(Key::ArrowLeft))
        );
        assert_eq!(
            press(KeyCode::Backspace, KeyModifiers::CONTROL),
            Action::Engine(KeyInput::ctrl(Key::Backspace))
        );
        assert_eq!(press(KeyCode::BackTab, KeyModifiers::SHIFT), Action::Engine(KeyInput::shift(Key::Tab)));
    }

    #[test]
    fn test_unmapped_key() {
        assert_eq!(press(KeyCode::Insert, KeyModifiers::NONE), Action::None);
    }
}
