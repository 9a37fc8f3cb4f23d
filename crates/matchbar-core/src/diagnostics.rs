//! In-memory engine diagnostics.
//!
//! [`DiagnosticsLayer`] captures `tracing` events (with their structured
//! fields) into a bounded ring buffer so a host can show what the engine is
//! doing: generations dispatched, stale answers dropped, commits rejected.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// One captured event.
#[derive(Debug, Clone)]
pub struct DiagnosticEntry {
    /// Seconds since the layer was created.
    pub elapsed_secs: f64,
    pub level: Level,
    pub target: String,
    pub message: String,
    /// Structured fields other than `message`, in record order.
    pub fields: Vec<(String, String)>,
}

impl fmt::Display for DiagnosticEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8.3} {:<5} {}", self.elapsed_secs, self.level, self.message)?;
        for (name, value) in &self.fields {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Ring {
    entries: VecDeque<DiagnosticEntry>,
    capacity: usize,
    start: Instant,
}

/// A `tracing` layer that keeps the most recent events.
#[derive(Debug, Clone)]
pub struct DiagnosticsLayer {
    ring: Arc<Mutex<Ring>>,
    /// Only events whose target starts with this prefix are kept.
    prefix: Option<String>,
}

impl DiagnosticsLayer {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Arc::new(Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                capacity,
                start: Instant::now(),
            })),
            prefix: None,
        }
    }

    /// Keep only events from targets starting with `prefix` (e.g. `matchbar_core`).
    pub fn with_target_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn reader(&self) -> DiagnosticsReader {
        DiagnosticsReader {
            ring: Arc::clone(&self.ring),
        }
    }
}

impl<S: Subscriber> Layer<S> for DiagnosticsLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if let Some(prefix) = &self.prefix
            && !metadata.target().starts_with(prefix.as_str())
        {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        if let Ok(mut ring) = self.ring.lock() {
            if ring.capacity == 0 {
                return;
            }
            if ring.entries.len() >= ring.capacity {
                ring.entries.pop_front();
            }
            let elapsed_secs = ring.start.elapsed().as_secs_f64();
            ring.entries.push_back(DiagnosticEntry {
                elapsed_secs,
                level: *metadata.level(),
                target: metadata.target().to_string(),
                message: visitor.message,
                fields: visitor.fields,
            });
        }
    }
}

/// Read handle for captured diagnostics.
#[derive(Debug, Clone)]
pub struct DiagnosticsReader {
    ring: Arc<Mutex<Ring>>,
}

impl DiagnosticsReader {
    /// Snapshot of every captured entry, oldest first.
    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.ring
            .lock()
            .map(|ring| ring.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The last `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<DiagnosticEntry> {
        self.ring
            .lock()
            .map(|ring| {
                let skip = ring.entries.len().saturating_sub(n);
                ring.entries.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().map(|ring| ring.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name().to_string(), format!("{value:?}")));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}
