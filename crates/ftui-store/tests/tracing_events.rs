#![forbid(unsafe_code)]

//! Structured tracing events emitted by the store.

use std::sync::{Arc, Mutex};

use ftui_store::{Store, StoreConfig, SubscribeOptions, UpdateOptions};
use serde_json::json;
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

#[derive(Debug, Default, Clone)]
struct Captured {
    message: Option<String>,
    path: Option<String>,
    pending: Option<u64>,
    saw_elapsed: bool,
}

struct StoreTraceCapture {
    events: Arc<Mutex<Vec<Captured>>>,
}

impl tracing::field::Visit for Captured {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "path" => self.path = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        match field.name() {
            "elapsed_us" => self.saw_elapsed = true,
            "pending" => self.pending = Some(value),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let text = format!("{value:?}").trim_matches('"').to_string();
        match field.name() {
            "message" => self.message = Some(text),
            "path" => self.path = Some(text),
            _ => {}
        }
    }
}

impl<S> Layer<S> for StoreTraceCapture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut captured = Captured::default();
        event.record(&mut captured);
        self.events
            .lock()
            .expect("store trace lock")
            .push(captured);
    }
}

fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<Captured>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(StoreTraceCapture {
        events: Arc::clone(&events),
    });
    let result = {
        let _guard = tracing::subscriber::set_default(subscriber);
        f()
    };
    let events = events.lock().expect("store trace lock").clone();
    (result, events)
}

fn named<'a>(events: &'a [Captured], message: &str) -> Vec<&'a Captured> {
    events
        .iter()
        .filter(|e| e.message.as_deref() == Some(message))
        .collect()
}

#[test]
fn debug_update_emits_update_event() {
    let (_, events) = capture(|| {
        let store = Store::new(json!({"a": 1}));
        store
            .update_with_options("a", json!(2), UpdateOptions::new().debug())
            .unwrap();
    });
    let updates = named(&events, "store.update");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].path.as_deref(), Some("a"));
    assert!(updates[0].saw_elapsed, "expected elapsed_us on store.update");
}

#[test]
fn debug_listener_emits_deliver_and_subscribe_events() {
    let (_, events) = capture(|| {
        let store = Store::new(json!({"rows": {"1": 0}}));
        let _sub = store
            .subscribe_with_options("rows.*", SubscribeOptions::new().debug(), |_| {})
            .unwrap();
        store.update("rows.1", json!(5)).unwrap();
    });
    let delivered = named(&events, "store.deliver");
    assert_eq!(delivered.len(), 2, "replay plus one update");
    assert!(delivered.iter().all(|e| e.path.as_deref() == Some("rows.1")));
    assert_eq!(named(&events, "store.subscribe").len(), 1);
}

#[test]
fn quiet_store_emits_no_debug_events() {
    let (_, events) = capture(|| {
        let store = Store::new(json!({"a": 1}));
        let _sub = store.subscribe("a", |_| {}).unwrap();
        store.update("a", json!(2)).unwrap();
    });
    assert!(named(&events, "store.update").is_empty());
    assert!(named(&events, "store.deliver").is_empty());
}

#[test]
fn store_wide_debug_traces_every_write() {
    let (_, events) = capture(|| {
        let config = StoreConfig::default().with_debug(true);
        let store = Store::with_config(json!({}), config).unwrap();
        store.update("a", json!(1)).unwrap();
        store.update("b", json!(2)).unwrap();
    });
    let paths: Vec<_> = named(&events, "store.update")
        .iter()
        .filter_map(|e| e.path.clone())
        .collect();
    assert_eq!(paths, ["a", "b"]);
}

#[test]
fn dropped_multi_warns_with_pending_count() {
    let (_, events) = capture(|| {
        let store = Store::new(json!({"a": 0, "b": 0}));
        let mut multi = store.multi();
        multi.update("a", json!(1)).unwrap().update("b", json!(1)).unwrap();
    });
    let dropped = named(&events, "store.multi.dropped");
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].pending, Some(2));
}

#[test]
fn clearing_listeners_is_traced() {
    let (_, events) = capture(|| {
        let store = Store::new(json!({}));
        store.subscribe("a", |_| {}).unwrap().detach();
        store.clear_listeners();
    });
    assert_eq!(named(&events, "store.clear").len(), 1);
}
