#![forbid(unsafe_code)]

//! Store construction options and per-call option structs.

use std::fmt;
use std::rc::Rc;

use ftui_path::PathSyntax;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, StoreError};

/// Receives every debug message together with a JSON payload.
pub type LogHook = Rc<dyn Fn(&str, &Value)>;

/// Configuration supplied once when a [`Store`](crate::Store) is built.
///
/// Every field has a default, so a JSON document only needs the keys it
/// overrides:
///
/// ```
/// use ftui_store::StoreConfig;
///
/// let config = StoreConfig::from_json_str(r#"{ "delimiter": "/", "queue": true }"#).unwrap();
/// assert_eq!(config.syntax.delimiter, '/');
/// assert!(config.queue);
/// assert_eq!(config.max_simultaneous_jobs, 1000);
/// ```
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    #[serde(flatten)]
    pub syntax: PathSyntax,
    /// Queue every update issued while another operation is in flight.
    pub queue: bool,
    /// Maximum number of queued jobs.
    pub max_simultaneous_jobs: usize,
    /// Maximum drain rounds before the queue is declared runaway.
    pub max_queue_runs: usize,
    /// Log every update as if `UpdateOptions::debug` were set.
    pub debug: bool,
    #[serde(skip)]
    pub log: Option<LogHook>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            syntax: PathSyntax::new(),
            queue: false,
            max_simultaneous_jobs: 1000,
            max_queue_runs: 1000,
            debug: false,
            log: None,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("syntax", &self.syntax)
            .field("queue", &self.queue)
            .field("max_simultaneous_jobs", &self.max_simultaneous_jobs)
            .field("max_queue_runs", &self.max_queue_runs)
            .field("debug", &self.debug)
            .field("log", &self.log.is_some())
            .finish()
    }
}

impl StoreConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_syntax(mut self, syntax: PathSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    #[must_use]
    pub fn with_queue(mut self, queue: bool) -> Self {
        self.queue = queue;
        self
    }

    #[must_use]
    pub fn with_max_simultaneous_jobs(mut self, limit: usize) -> Self {
        self.max_simultaneous_jobs = limit;
        self
    }

    #[must_use]
    pub fn with_max_queue_runs(mut self, runs: usize) -> Self {
        self.max_queue_runs = runs;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Install a hook that receives debug messages.
    #[must_use]
    pub fn with_log(mut self, hook: impl Fn(&str, &Value) + 'static) -> Self {
        self.log = Some(Rc::new(hook));
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.syntax.validate()?;
        if self.max_simultaneous_jobs == 0 {
            return Err(StoreError::invalid_config(
                "max_simultaneous_jobs must be at least 1",
            ));
        }
        if self.max_queue_runs == 0 {
            return Err(StoreError::invalid_config(
                "max_queue_runs must be at least 1",
            ));
        }
        Ok(())
    }

    pub(crate) fn emit(&self, message: &str, payload: impl FnOnce() -> Value) {
        if let Some(hook) = &self.log {
            hook(message, &payload());
        }
    }
}

/// Options for [`Store::subscribe_with_options`](crate::Store::subscribe_with_options).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubscribeOptions {
    /// Deliver all matches of one pass as a single call.
    pub bulk: bool,
    /// Patterns whose subtrees never reach this listener.
    pub ignore: Vec<String>,
    /// Defer deliveries until the current store operation has finished.
    pub queue: bool,
    /// Log registration and every delivery.
    pub debug: bool,
}

impl SubscribeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bulk(mut self) -> Self {
        self.bulk = true;
        self
    }

    #[must_use]
    pub fn ignore(mut self, pattern: impl Into<String>) -> Self {
        self.ignore.push(pattern.into());
        self
    }

    #[must_use]
    pub fn queued(mut self) -> Self {
        self.queue = true;
        self
    }

    #[must_use]
    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }
}

/// Options for [`Store::update_with_options`](crate::Store::update_with_options).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpdateOptions {
    /// Notify only listeners of these sub-paths of the written value.
    pub only: Vec<String>,
    /// Queue the update if another operation is in flight.
    pub queue: bool,
    /// Log the value before and after the write.
    pub debug: bool,
    /// Opaque payload handed to every notification of this update.
    pub data: Option<Value>,
}

impl UpdateOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn only(mut self, pattern: impl Into<String>) -> Self {
        self.only.push(pattern.into());
        self
    }

    #[must_use]
    pub fn queued(mut self) -> Self {
        self.queue = true;
        self
    }

    #[must_use]
    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.syntax, PathSyntax::new());
        assert!(!config.queue);
        assert_eq!(config.max_simultaneous_jobs, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_overrides_only_given_keys() {
        let config =
            StoreConfig::from_json_str(r#"{"wildcard":"%","max_simultaneous_jobs":5}"#).unwrap();
        assert_eq!(config.syntax.wildcard, '%');
        assert_eq!(config.syntax.delimiter, '.');
        assert_eq!(config.max_simultaneous_jobs, 5);
        assert_eq!(config.max_queue_runs, 1000);
    }

    #[test]
    fn json_rejects_conflicting_glyphs() {
        let err = StoreConfig::from_json_str(r#"{"wildcard":"."}"#).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSyntax(_)));
    }

    #[test]
    fn json_rejects_zero_limits() {
        let err = StoreConfig::from_json_str(r#"{"max_queue_runs":0}"#).unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig { .. }));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = StoreConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }

    #[test]
    fn log_hook_receives_messages() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let config = StoreConfig::default().with_log(move |message, _| {
            sink.borrow_mut().push(message.to_owned());
        });
        config.emit("store.update", || Value::Null);
        assert_eq!(seen.borrow().as_slice(), ["store.update"]);
        assert!(format!("{config:?}").contains("log: true"));
    }

    #[test]
    fn option_builders() {
        let options = SubscribeOptions::new().bulk().ignore("a.b").queued();
        assert!(options.bulk && options.queue && !options.debug);
        assert_eq!(options.ignore, ["a.b"]);

        let options = UpdateOptions::new().only("x.*").with_data(Value::Bool(true));
        assert_eq!(options.only, ["x.*"]);
        assert_eq!(options.data, Some(Value::Bool(true)));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: SubscribeOptions = serde_json::from_str(r#"{"bulk":true}"#).unwrap();
        assert!(options.bulk);
        assert!(options.ignore.is_empty());
    }
}
