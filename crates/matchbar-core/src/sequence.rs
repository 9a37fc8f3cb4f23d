//! The sequence controller: owns the ordered matcher list, the active edit
//! slot and the active function, and layers sequence-level keyboard commands
//! over the [`EditSession`].
//!
//! Every committed mutation re-runs bracket validation and broadcasts
//! [`SequenceEvent::MatchersChanged`].

use std::sync::Arc;

use matchbar_config::Nemonic;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::aggregate::SourceResponse;
use crate::brackets::mismatched_brackets;
use crate::config::Config;
use crate::keys::{Key, KeyInput};
use crate::matcher::{Matcher, ReorderError, ReorderPayload, is_first};
use crate::paste::{PasteOutcome, parse_paste};
use crate::session::{EditSession, KeyOutcome, Selection, SessionEvent};
use crate::validate::{MatcherError, validate_function_requirements};

/// Owner-facing notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceEvent {
    /// The visible matcher list changed.
    MatchersChanged(Vec<Matcher>),
    /// The sequence was submitted.
    Complete {
        matchers: Vec<Matcher>,
        function: Option<String>,
    },
    /// Submission was refused: the active function's required sources are
    /// not all represented.
    CompleteError { function: String, missing: Vec<String> },
}

#[derive(Debug)]
pub struct SequenceController {
    config: Arc<Config>,
    matchers: Vec<Matcher>,
    /// Matcher in inline edit; `None` is the trailing append slot.
    editing: Option<usize>,
    function: Option<Nemonic>,
    mismatched: Vec<usize>,
    /// Key of an edited matcher hidden from owners while it changes.
    changing: Option<String>,
    error: Option<String>,
    session: EditSession,
    events: broadcast::Sender<SequenceEvent>,
}

impl SequenceController {
    pub fn new(config: Arc<Config>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            session: EditSession::new(Arc::clone(&config)),
            config,
            matchers: Vec::new(),
            editing: None,
            function: None,
            mismatched: Vec::new(),
            changing: None,
            error: None,
            events,
        }
    }

    /// Start from an initial matcher list.
    pub fn with_matchers(config: Arc<Config>, matchers: Vec<Matcher>) -> Self {
        let mut controller = Self::new(config);
        controller.mismatched = mismatched_brackets(&matchers);
        controller.matchers = matchers;
        controller
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SequenceEvent> {
        self.events.subscribe()
    }

    // ── State ───────────────────────────────────────────────────────

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    pub fn editing(&self) -> Option<usize> {
        self.editing
    }

    pub fn function(&self) -> Option<&Nemonic> {
        self.function.as_ref()
    }

    /// Indexes of unmatched brackets after the last mutation.
    pub fn mismatched(&self) -> &[usize] {
        &self.mismatched
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn has_focus(&self) -> bool {
        self.session.has_focus()
    }

    /// Inline error for the active slot: a rejected commit or completion.
    pub fn error(&self) -> Option<&str> {
        self.session.error().or(self.error.as_deref())
    }

    /// Whether the matcher at `index` leads its run.
    pub fn is_first(&self, index: usize) -> bool {
        is_first(&self.matchers, index)
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Append a matcher.
    pub fn commit(&mut self, matcher: Matcher) {
        debug!(key = %matcher.key, index = self.matchers.len(), "matcher appended");
        self.matchers.push(matcher);
        self.changed();
    }

    /// Replace the matcher with the same key. Returns false if absent.
    pub fn update(&mut self, matcher: Matcher) -> bool {
        let Some(slot) = self.matchers.iter_mut().find(|m| m.key == matcher.key) else {
            return false;
        };
        debug!(key = %matcher.key, "matcher updated");
        *slot = matcher;
        self.changed();
        true
    }

    /// Insert before `before`, or append when `before` is `None` or unknown.
    pub fn insert(&mut self, matcher: Matcher, before: Option<&str>) {
        let index = before
            .and_then(|key| self.position(key))
            .unwrap_or(self.matchers.len());
        debug!(key = %matcher.key, index, "matcher inserted");
        self.matchers.insert(index, matcher);
        if let Some(editing) = self.editing
            && index <= editing
        {
            self.editing = Some(editing + 1);
        }
        self.changed();
    }

    /// Remove by key. The edit slot falls back to the append slot when it
    /// now points past the end or `force_clear` is set. Returns false if absent.
    pub fn delete(&mut self, key: &str, force_clear: bool) -> bool {
        let Some(index) = self.position(key) else {
            return false;
        };
        self.matchers.remove(index);
        debug!(key, index, "matcher deleted");
        self.editing = match self.editing {
            Some(_) if force_clear => None,
            Some(editing) if editing >= self.matchers.len() => None,
            Some(editing) if index < editing => Some(editing - 1),
            other => other,
        };
        if self.editing.is_none() && self.session.target().is_some() {
            self.changing = None;
            self.session.begin_append();
        }
        self.changed();
        true
    }

    /// Exchange two matchers by key. No-op unless both exist.
    pub fn swap(&mut self, a: &str, b: &str) -> bool {
        let (Some(i), Some(j)) = (self.position(a), self.position(b)) else {
            return false;
        };
        self.matchers.swap(i, j);
        debug!(a, b, "matchers swapped");
        self.changed();
        true
    }

    /// Clear the list, the edit slot and the active function.
    pub fn delete_all(&mut self) {
        self.matchers.clear();
        self.editing = None;
        self.function = None;
        self.changing = None;
        self.session.begin_append();
        debug!("sequence cleared");
        self.changed();
    }

    /// Apply a reorder-by-key command: the carried matcher swaps places with
    /// the one under `onto`.
    pub fn reorder(&mut self, payload: &ReorderPayload, onto: &str) -> Result<bool, ReorderError> {
        let dragged = payload.matcher()?;
        if payload.carries(onto) {
            return Err(ReorderError::SelfDrop(dragged.key));
        }
        Ok(self.swap(&dragged.key, onto))
    }

    /// Submit the sequence. Fails, leaving everything in place, when the
    /// active function's required sources are missing.
    pub fn complete(&mut self) -> Result<Vec<Matcher>, MatcherError> {
        if let Some(function) = &self.function
            && let Err(error) = validate_function_requirements(function, &self.matchers)
        {
            if let MatcherError::MissingSources { function, missing } = &error {
                let _ = self.events.send(SequenceEvent::CompleteError {
                    function: function.clone(),
                    missing: missing.clone(),
                });
            }
            debug!(%error, "completion refused");
            self.error = Some(error.to_string());
            return Err(error);
        }

        let matchers = std::mem::take(&mut self.matchers);
        let function = self.function.take().map(|f| f.name);
        info!(matchers = matchers.len(), function = ?function, "sequence complete");
        let _ = self.events.send(SequenceEvent::Complete {
            matchers: matchers.clone(),
            function,
        });

        self.editing = None;
        self.changing = None;
        self.session.begin_append();
        self.changed();
        Ok(matchers)
    }

    /// Parse pasted text and append the result in one mutation.
    pub async fn paste(&mut self, text: &str) -> PasteOutcome {
        let outcome = parse_paste(&self.config, text, &self.matchers, self.function.as_ref()).await;
        if !outcome.matchers.is_empty() {
            self.matchers.extend(outcome.matchers.iter().cloned());
            self.changed();
        }
        outcome
    }

    // ── Focus and async ─────────────────────────────────────────────

    pub fn focus(&mut self) {
        for event in self.session.focus() {
            self.on_session_event(event);
        }
    }

    pub fn blur(&mut self) {
        self.session.blur();
    }

    /// Apply arrived suggestion answers. Returns whether options changed.
    pub fn poll_responses(&mut self) -> bool {
        self.session.poll()
    }

    /// Wait for the next suggestion answer and apply it.
    pub async fn next_response(&mut self) -> Option<bool> {
        let response: SourceResponse = self.session.next_response().await?;
        Some(self.session.apply(response))
    }

    /// Select a slot for editing; `None` is the append slot.
    pub fn select(&mut self, index: Option<usize>) {
        self.edit_slot(index, true);
    }

    /// Replace the active slot's text, as typing it would.
    pub fn set_text(&mut self, text: &str) {
        let selection = Selection {
            matchers: &self.matchers,
            function: self.function.as_ref(),
            editing: self.editing,
        };
        let events = self.session.set_text(text, &selection);
        for event in events {
            self.on_session_event(event);
        }
    }

    // ── Keys ────────────────────────────────────────────────────────

    /// Route one key press. Returns whether anything consumed it.
    pub fn handle_key(&mut self, input: KeyInput) -> bool {
        self.error = None;
        let empty = self.session.text().is_empty();
        match input.key {
            Key::Backspace if input.modifiers.ctrl && empty => {
                self.delete_all();
                return true;
            }
            Key::Backspace if input.modifiers.shift && empty && self.editing.is_none() => {
                match self.matchers.last().map(|m| m.key.clone()) {
                    Some(key) => {
                        self.delete(&key, false);
                    }
                    None => self.function = None,
                }
                return true;
            }
            Key::ArrowLeft | Key::ArrowRight if input.modifiers.shift => {
                self.shift_selection(input.key == Key::ArrowRight);
                return true;
            }
            Key::ArrowLeft | Key::ArrowRight if input.modifiers.ctrl => {
                return self.move_selected(input.key == Key::ArrowRight);
            }
            _ => {}
        }

        let selection = Selection {
            matchers: &self.matchers,
            function: self.function.as_ref(),
            editing: self.editing,
        };
        match self.session.handle_key(input, &selection) {
            KeyOutcome::Handled(events) => {
                for event in events {
                    self.on_session_event(event);
                }
                true
            }
            KeyOutcome::Ignored if input.key == Key::Enter && self.editing.is_none() => {
                let _ = self.complete();
                true
            }
            KeyOutcome::Ignored => false,
        }
    }

    fn shift_selection(&mut self, forward: bool) {
        let len = self.matchers.len();
        let next = match (self.editing, forward) {
            (None, _) if len == 0 => None,
            (None, false) => Some(len - 1),
            (None, true) => Some(0),
            (Some(0), false) => None,
            (Some(i), false) => Some(i - 1),
            (Some(i), true) if i + 1 < len => Some(i + 1),
            (Some(_), true) => None,
        };
        self.edit_slot(next, true);
    }

    /// Swap the selected matcher with its neighbour (wrapping) and follow it.
    fn move_selected(&mut self, forward: bool) -> bool {
        let len = self.matchers.len();
        let Some(current) = self.editing else {
            return false;
        };
        if len < 2 {
            return false;
        }
        let target = if forward { (current + 1) % len } else { (current + len - 1) % len };
        let (a, b) = (self.matchers[current].key.clone(), self.matchers[target].key.clone());
        self.swap(&a, &b);
        self.edit_slot(Some(target), true);
        true
    }

    fn edit_slot(&mut self, index: Option<usize>, cursor_at_end: bool) {
        if self.changing.take().is_some() {
            self.notify();
        }
        self.editing = index.filter(|i| *i < self.matchers.len());
        match self.editing {
            Some(i) => {
                let first = is_first(&self.matchers, i);
                self.session.begin_edit(&self.matchers[i], first, cursor_at_end);
            }
            None => self.session.begin_append(),
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Changing => {
                if let Some(key) = self.editing.map(|i| self.matchers[i].key.clone()) {
                    self.changing = Some(key);
                    self.notify();
                }
            }
            SessionEvent::Committed(matcher) => {
                let replacing = self
                    .editing
                    .is_some_and(|i| self.matchers[i].key == matcher.key);
                if replacing {
                    self.changing = None;
                    self.update(matcher);
                    self.edit_slot(None, true);
                } else {
                    self.commit(matcher);
                }
            }
            SessionEvent::Inserted(matcher) => {
                let before = self.editing.map(|i| self.matchers[i].key.clone());
                self.insert(matcher, before.as_deref());
                if self.editing.is_some() {
                    self.edit_slot(self.editing, true);
                }
            }
            SessionEvent::Deleted => match self.editing.map(|i| self.matchers[i].key.clone()) {
                // `delete` already moves the session back to the append slot.
                Some(key) => {
                    self.changing = None;
                    self.delete(&key, true);
                }
                None => self.edit_slot(None, true),
            },
            SessionEvent::FunctionActivated(name) => {
                self.function = self.config.function(&name).cloned();
                debug!(function = %name, "function active");
            }
            SessionEvent::FunctionDeactivated => {
                self.function = None;
                debug!("function cleared");
            }
            SessionEvent::Cancelled => self.edit_slot(None, true),
            SessionEvent::EditPrevious { deleting } => {
                let target = match self.editing {
                    None => self.matchers.len().checked_sub(1),
                    Some(0) => return,
                    Some(i) => Some(i - 1),
                };
                if target.is_none() {
                    return;
                }
                self.edit_slot(target, true);
                if deleting {
                    let selection = Selection {
                        matchers: &self.matchers,
                        function: self.function.as_ref(),
                        editing: self.editing,
                    };
                    let events = self.session.backspace_into(&selection);
                    for event in events {
                        self.on_session_event(event);
                    }
                }
            }
            SessionEvent::EditNext => {
                let next = match self.editing {
                    None => return,
                    Some(i) if i + 1 < self.matchers.len() => Some(i + 1),
                    Some(_) => None,
                };
                self.edit_slot(next, false);
            }
            SessionEvent::FocusGained => debug!("editor focused"),
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.matchers.iter().position(|m| m.key == key)
    }

    fn changed(&mut self) {
        self.mismatched = mismatched_brackets(&self.matchers);
        self.notify();
    }

    fn notify(&self) {
        let visible: Vec<Matcher> = match &self.changing {
            Some(key) => self.matchers.iter().filter(|m| &m.key != key).cloned().collect(),
            None => self.matchers.clone(),
        };
        let _ = self.events.send(SequenceEvent::MatchersChanged(visible));
    }
}
