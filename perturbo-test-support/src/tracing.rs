//! Recording layer for capturing tracing events in tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Recording layer installed during tests to capture emitted events for
/// later assertions.
///
/// # Examples
/// ```
/// use perturbo_test_support::tracing::RecordingLayer;
///
/// let layer = RecordingLayer::default();
/// assert!(layer.events().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct RecordingLayer {
    events: Arc<Mutex<Vec<EventRecord>>>,
}

impl RecordingLayer {
    /// Returns a snapshot of the recorded events in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().expect("lock poisoned").clone()
    }
}

/// Snapshot of an emitted tracing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Log level of the event.
    pub level: Level,
    /// Event target string.
    pub target: String,
    /// Structured fields rendered to strings.
    pub fields: HashMap<String, String>,
}

impl<S: Subscriber> Layer<S> for RecordingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events.lock().expect("lock poisoned").push(EventRecord {
            level: *event.metadata().level(),
            target: event.metadata().target().to_owned(),
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    fields: HashMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.fields
            .insert(field.name().to_owned(), format!("{value:?}"));
    }
}
