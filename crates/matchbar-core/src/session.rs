//! The edit session: one matcher slot's text buffer, parsed prefix, option
//! list and active-option cursor.
//!
//! A session edits either the trailing append slot or one committed matcher
//! in place. Each key press mutates local state and yields at most one
//! owner-facing [`SessionEvent`] (plus a one-time [`SessionEvent::Changing`]
//! when an existing matcher's text is first edited). The owner passes a
//! [`Selection`] snapshot with every call; the session never reaches for
//! shared state.

use std::sync::Arc;

use matchbar_config::Nemonic;
use tracing::debug;

use crate::aggregate::{Aggregator, ParsedSearch, SearchRequest, SourceResponse, Suggestion, Suggestions};
use crate::config::Config;
use crate::keys::{EditBuffer, Key, KeyInput};
use crate::matcher::{Comparison, Matcher, Operator, is_first, new_key};
use crate::validate::{MatcherError, ValidationContext, validate_comparison, validate_matcher};

/// Coarse session state, derived from the buffer and options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No text.
    Empty,
    /// Text present; suggestions may still be pending.
    Typing,
    /// At least one suggestion and the session has focus.
    OptionsOpen,
}

/// Owner-facing outcome of a discrete action.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A matcher to append, or to replace the one being edited (same key).
    Committed(Matcher),
    /// A matcher to insert before the current slot.
    Inserted(Matcher),
    /// The matcher being edited should be removed.
    Deleted,
    FunctionActivated(String),
    FunctionDeactivated,
    /// The in-place edit was abandoned.
    Cancelled,
    /// Move editing to the previous matcher. `deleting` continues a
    /// backspace into it.
    EditPrevious { deleting: bool },
    EditNext,
    FocusGained,
    /// The matcher being edited has started changing. Sent once per edit.
    Changing,
}

/// Whether the session consumed a key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    /// Not for the session; the owner may act on it.
    Ignored,
    Handled(Vec<SessionEvent>),
}

impl KeyOutcome {
    fn quiet() -> Self {
        KeyOutcome::Handled(Vec::new())
    }

    fn event(event: SessionEvent) -> Self {
        KeyOutcome::Handled(vec![event])
    }
}

/// Snapshot of the owner's sequence state, passed with every call.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub matchers: &'a [Matcher],
    pub function: Option<&'a Nemonic>,
    /// Index of the matcher being edited; `None` for the append slot.
    pub editing: Option<usize>,
}

impl Selection<'_> {
    /// Whether the slot leads its run.
    pub fn first(&self) -> bool {
        match self.editing {
            Some(index) => is_first(self.matchers, index),
            None => self
                .matchers
                .last()
                .is_none_or(|m| m.comparison == Comparison::Open),
        }
    }

    /// A function may only be introduced at the start of an empty sequence.
    pub fn allow_functions(&self) -> bool {
        self.editing.is_none() && self.matchers.is_empty() && self.function.is_none()
    }
}

/// Text shown when a committed matcher is opened for editing.
pub fn edit_text(config: &Config, matcher: &Matcher, first: bool) -> String {
    let mut text = String::new();
    if !first && config.mode.allows_operators() && matcher.operator != Operator::Empty {
        text.push_str(config.operator_symbol(matcher.operator));
        text.push(' ');
    }
    text.push_str(matcher.comparison.symbol());
    text.push_str(&matcher.text);
    text
}

#[derive(Debug)]
pub struct EditSession {
    config: Arc<Config>,
    aggregator: Aggregator,
    buffer: EditBuffer,
    /// Append-slot text parked while another matcher is edited.
    parked: Option<EditBuffer>,
    parsed: ParsedSearch,
    active: Option<usize>,
    error: Option<String>,
    target: Option<Matcher>,
    changing_sent: bool,
    focused: bool,
}

impl EditSession {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            aggregator: Aggregator::new(Arc::clone(&config)),
            config,
            buffer: EditBuffer::default(),
            parked: None,
            parsed: ParsedSearch::default(),
            active: None,
            error: None,
            target: None,
            changing_sent: false,
            focused: false,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn text(&self) -> &str {
        self.buffer.text()
    }

    pub fn cursor(&self) -> usize {
        self.buffer.cursor()
    }

    pub fn parsed(&self) -> &ParsedSearch {
        &self.parsed
    }

    pub fn suggestions(&self) -> &Suggestions {
        self.aggregator.suggestions()
    }

    pub fn active_option(&self) -> Option<usize> {
        self.active
    }

    pub fn active_suggestion(&self) -> Option<&Suggestion> {
        self.active.and_then(|i| self.suggestions().get(i))
    }

    /// Inline error from the last rejected commit.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The matcher being edited in place, if any.
    pub fn target(&self) -> Option<&Matcher> {
        self.target.as_ref()
    }

    pub fn pending(&self) -> usize {
        self.aggregator.pending()
    }

    pub fn has_focus(&self) -> bool {
        self.focused
    }

    pub fn state(&self) -> SessionState {
        if self.buffer.is_empty() {
            SessionState::Empty
        } else if self.focused && !self.suggestions().is_empty() {
            SessionState::OptionsOpen
        } else {
            SessionState::Typing
        }
    }

    // ── Slot control ────────────────────────────────────────────────

    /// Switch to the append slot, restoring any parked text.
    pub fn begin_append(&mut self) {
        self.target = None;
        self.changing_sent = false;
        self.buffer = self.parked.take().unwrap_or_default();
        self.reset_options();
    }

    /// Switch to editing `matcher` in place.
    pub fn begin_edit(&mut self, matcher: &Matcher, first: bool, cursor_at_end: bool) {
        if self.target.is_none() && !self.buffer.is_empty() {
            self.parked = Some(std::mem::take(&mut self.buffer));
        }
        self.buffer.set(edit_text(&self.config, matcher, first), cursor_at_end);
        self.target = Some(matcher.clone());
        self.changing_sent = false;
        self.reset_options();
    }

    pub fn focus(&mut self) -> Vec<SessionEvent> {
        if self.focused {
            return Vec::new();
        }
        self.focused = true;
        vec![SessionEvent::FocusGained]
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    /// Replace the whole buffer, as a paste into the field would.
    pub fn set_text(&mut self, text: &str, selection: &Selection<'_>) -> Vec<SessionEvent> {
        self.buffer.set(text, true);
        self.text_changed(selection)
    }

    // ── Async answers ───────────────────────────────────────────────

    /// Apply async answers that have arrived. Returns whether options changed.
    pub fn poll(&mut self) -> bool {
        let changed = self.aggregator.poll();
        if changed {
            self.refresh_active();
        }
        changed
    }

    pub async fn next_response(&mut self) -> Option<SourceResponse> {
        self.aggregator.next_response().await
    }

    pub fn apply(&mut self, response: SourceResponse) -> bool {
        let changed = self.aggregator.apply(response);
        if changed {
            self.refresh_active();
        }
        changed
    }

    // ── Keys ────────────────────────────────────────────────────────

    pub fn handle_key(&mut self, input: KeyInput, selection: &Selection<'_>) -> KeyOutcome {
        let total = self.suggestions().total();
        match input.key {
            Key::Char(c) => {
                if input.modifiers.ctrl {
                    return KeyOutcome::Ignored;
                }
                self.error = None;
                self.buffer.insert(c);
                KeyOutcome::Handled(self.text_changed(selection))
            }
            Key::Backspace if !self.buffer.is_empty() => {
                if self.buffer.backspace() {
                    KeyOutcome::Handled(self.text_changed(selection))
                } else {
                    KeyOutcome::quiet()
                }
            }
            Key::Backspace => self.empty_backspace(input, selection),
            Key::Delete => {
                if self.buffer.delete() {
                    KeyOutcome::Handled(self.text_changed(selection))
                } else {
                    KeyOutcome::Ignored
                }
            }
            Key::ArrowLeft | Key::ArrowRight if !input.is_plain() => KeyOutcome::Ignored,
            Key::ArrowLeft => {
                if self.buffer.left() {
                    KeyOutcome::quiet()
                } else {
                    KeyOutcome::event(SessionEvent::EditPrevious { deleting: false })
                }
            }
            Key::ArrowRight => {
                if self.buffer.right() {
                    KeyOutcome::quiet()
                } else {
                    KeyOutcome::event(SessionEvent::EditNext)
                }
            }
            Key::ArrowUp | Key::ArrowDown | Key::PageUp | Key::PageDown if total == 0 => KeyOutcome::Ignored,
            Key::ArrowUp => {
                self.active = Some(match self.active {
                    Some(0) | None => total - 1,
                    Some(i) => i - 1,
                });
                KeyOutcome::quiet()
            }
            Key::ArrowDown => {
                self.active = Some(match self.active {
                    Some(i) if i + 1 < total => i + 1,
                    _ => 0,
                });
                KeyOutcome::quiet()
            }
            Key::PageUp => {
                self.active = Some(self.suggestions().category_jump(self.active.unwrap_or(0), false));
                KeyOutcome::quiet()
            }
            Key::PageDown => {
                self.active = Some(
                    self.suggestions()
                        .category_jump(self.active.unwrap_or(total - 1), true),
                );
                KeyOutcome::quiet()
            }
            Key::Home => {
                if total > 0 {
                    self.active = Some(0);
                } else {
                    self.buffer.home();
                }
                KeyOutcome::quiet()
            }
            Key::End => {
                if total > 0 {
                    self.active = Some(total - 1);
                } else {
                    self.buffer.end();
                }
                KeyOutcome::quiet()
            }
            Key::Enter | Key::Tab => self.enter(input, selection),
            Key::Escape => {
                if self.target.is_some() {
                    self.clear();
                    KeyOutcome::event(SessionEvent::Cancelled)
                } else if !self.buffer.is_empty() {
                    self.clear();
                    KeyOutcome::quiet()
                } else {
                    KeyOutcome::Ignored
                }
            }
        }
    }

    /// Continue a deleting backspace into this slot: drop the last char and
    /// search again.
    pub fn backspace_into(&mut self, selection: &Selection<'_>) -> Vec<SessionEvent> {
        self.buffer.end();
        if self.buffer.backspace() {
            self.text_changed(selection)
        } else {
            Vec::new()
        }
    }

    fn empty_backspace(&mut self, input: KeyInput, selection: &Selection<'_>) -> KeyOutcome {
        if self.target.is_some() {
            self.clear();
            return KeyOutcome::event(SessionEvent::Deleted);
        }
        if !input.is_plain() {
            return KeyOutcome::Ignored;
        }
        if selection.matchers.is_empty() && selection.function.is_some() {
            KeyOutcome::event(SessionEvent::FunctionDeactivated)
        } else {
            KeyOutcome::event(SessionEvent::EditPrevious { deleting: true })
        }
    }

    fn enter(&mut self, input: KeyInput, selection: &Selection<'_>) -> KeyOutcome {
        if let Some(option) = self.active_suggestion().cloned() {
            return self.select(option, input.modifiers.shift, selection);
        }
        if self.buffer.is_empty() {
            if self.target.is_some() {
                self.clear();
                return KeyOutcome::event(SessionEvent::Deleted);
            }
            return KeyOutcome::Ignored;
        }
        if self.target.is_some() {
            self.clear();
            return KeyOutcome::event(SessionEvent::Cancelled);
        }

        let free_text = selection.function.is_some_and(|f| f.allow_free_text);
        if free_text && !self.parsed.text.is_empty() {
            let operator = self.operator_for(selection);
            let matcher = Matcher::free_text(operator, self.parsed.text.clone());
            return self.finish(matcher, false, selection);
        }
        self.fail(MatcherError::NoMatch(self.parsed.text.clone()));
        KeyOutcome::quiet()
    }

    fn select(&mut self, option: Suggestion, insert: bool, selection: &Selection<'_>) -> KeyOutcome {
        if option.function {
            self.clear();
            debug!(function = %option.text, "function activated");
            return KeyOutcome::event(SessionEvent::FunctionActivated(option.text));
        }

        let comparison = self.parsed.comparison.unwrap_or(self.config.default_comparison);
        if let Some(source) = self.config.source(&option.source)
            && let Err(error) = validate_comparison(source, comparison)
        {
            self.fail(error);
            return KeyOutcome::quiet();
        }

        let key = match (&self.target, insert) {
            (Some(target), false) => target.key.clone(),
            _ => new_key(),
        };
        let matcher = Matcher {
            key,
            operator: self.operator_for(selection),
            comparison,
            source: option.source,
            value: option.value,
            text: option.text,
        };
        self.finish(matcher, insert, selection)
    }

    fn finish(&mut self, matcher: Matcher, insert: bool, selection: &Selection<'_>) -> KeyOutcome {
        let context = ValidationContext {
            matchers: selection.matchers,
            sources: &self.config.sources,
            editing: selection.editing,
            mode: self.config.mode,
            or_symbol: &self.config.or_symbol,
        };
        if let Err(error) = validate_matcher(&context, &matcher) {
            self.fail(error);
            return KeyOutcome::quiet();
        }
        debug!(key = %matcher.key, source = %matcher.source, insert, "matcher committed");
        self.clear();
        if insert {
            KeyOutcome::event(SessionEvent::Inserted(matcher))
        } else {
            KeyOutcome::event(SessionEvent::Committed(matcher))
        }
    }

    fn text_changed(&mut self, selection: &Selection<'_>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.target.is_some() && !self.changing_sent {
            self.changing_sent = true;
            events.push(SessionEvent::Changing);
        }
        self.error = None;

        let parsed = self.aggregator.search(SearchRequest {
            text: self.buffer.text(),
            matchers: selection.matchers,
            function: selection.function,
            allow_functions: selection.allow_functions(),
        });

        if let Some(bracket) = parsed.bracket() {
            self.parsed = parsed;
            let matcher = Matcher::bracket(bracket, self.operator_for(selection));
            debug!(key = %matcher.key, comparison = %bracket, "bracket committed");
            self.clear();
            events.push(if self.target.is_some() {
                SessionEvent::Inserted(matcher)
            } else {
                SessionEvent::Committed(matcher)
            });
            return events;
        }

        self.parsed = parsed;
        self.refresh_active();
        events
    }

    fn operator_for(&self, selection: &Selection<'_>) -> Operator {
        match self.parsed.operator {
            Some(operator) => operator,
            None if selection.first() => Operator::Empty,
            None => Operator::And,
        }
    }

    fn fail(&mut self, error: MatcherError) {
        debug!(%error, "commit rejected");
        self.error = Some(error.to_string());
    }

    fn refresh_active(&mut self) {
        let total = self.suggestions().total();
        self.active = match (total, self.active) {
            (0, _) => None,
            (_, None) => Some(0),
            (_, Some(i)) => Some(i.min(total - 1)),
        };
    }

    fn reset_options(&mut self) {
        self.aggregator.clear();
        self.parsed = ParsedSearch::default();
        self.active = None;
        self.error = None;
    }

    /// Empty the buffer and options after a discrete action.
    fn clear(&mut self) {
        self.buffer.clear();
        self.reset_options();
    }
}
