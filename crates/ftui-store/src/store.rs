#![forbid(unsafe_code)]

//! The path-addressed reactive store.
//!
//! # Design
//!
//! [`Store`] is a cheap handle around shared, reference-counted state. Each
//! operation follows the same shape:
//!
//! 1. Mutate the tree under a short `borrow_mut`.
//! 2. Plan deliveries under shared borrows of the tree, the registry and the
//!    mute table (see [`dispatch`](crate::dispatch)).
//! 3. Release every borrow, then run callbacks.
//!
//! Because no borrow is held while user code runs, callbacks may read,
//! write, subscribe and unsubscribe freely.
//!
//! # Invariants
//!
//! 1. `jobs_running` counts operations currently on the stack; it returns to
//!    zero when the outermost operation returns.
//! 2. Queued jobs run only when `jobs_running` is zero, in FIFO order.
//! 3. Writing a scalar equal to the stored scalar notifies nobody. Numbers
//!    compare by value, so `1.0` over `1` is unchanged.
//! 4. Map and list writes always notify, even if structurally unchanged.
//!
//! # Failure Modes
//!
//! - **Runaway cascades**: callbacks that keep queueing work hit
//!   [`StoreError::QueueOverflow`] or [`StoreError::QueueRunsExhausted`].
//!   Jobs not yet run stay queued for the next drain.
//! - **Unwritable paths**: writes through a scalar or past the end of a list
//!   report [`UpdateOutcome::Skipped`] and leave the tree untouched.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ftui_path::PathSyntax;
use serde_json::{Value, json};
use web_time::Instant;

use crate::config::{StoreConfig, SubscribeOptions, UpdateOptions};
use crate::dispatch::{Delivery, Mutes, Planner, Written};
use crate::error::{Result, StoreError};
use crate::listener::{Callback, CollectionKey, EventKind, Listener, ListenerId, Notification};
use crate::queue::{Job, JobQueue};
use crate::registry::Registry;
use crate::scan::scan;
use crate::subscription::Subscription;
use crate::transaction::Multi;
use crate::tree;
use crate::waiting::{WaitCallback, WaitId, WaitState, Waiting};

/// How to compute the new value of an update.
#[derive(Clone)]
pub enum Updater {
    /// Store this value.
    Set(Value),
    /// Derive the new value from the current one (`None` if missing).
    With(Rc<dyn Fn(Option<&Value>) -> Value>),
}

impl Updater {
    pub fn with(f: impl Fn(Option<&Value>) -> Value + 'static) -> Self {
        Self::With(Rc::new(f))
    }
}

impl From<Value> for Updater {
    fn from(value: Value) -> Self {
        Self::Set(value)
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(value) => f.debug_tuple("Set").field(value).finish(),
            Self::With(_) => f.write_str("With(..)"),
        }
    }
}

/// What an update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// At least one path was written and listeners were notified.
    Written,
    /// Every target already held an equal scalar; nobody was notified.
    Unchanged,
    /// The update was deferred to the job queue.
    Queued,
    /// Nothing could be written: a wildcard matched no path, or the path
    /// runs through a scalar or an out-of-range list index.
    Skipped,
}

pub(crate) struct StoreInner {
    pub(crate) config: StoreConfig,
    data: RefCell<Value>,
    pub(crate) registry: RefCell<Registry>,
    pub(crate) waiting: RefCell<Waiting>,
    queue: RefCell<JobQueue>,
    mutes: RefCell<Mutes>,
    jobs_running: Cell<usize>,
    draining: Cell<bool>,
    next_id: Cell<u64>,
}

/// Marks an operation as in flight for its lifetime.
struct JobGuard<'a> {
    inner: &'a StoreInner,
}

impl<'a> JobGuard<'a> {
    fn enter(inner: &'a StoreInner) -> Self {
        inner.jobs_running.set(inner.jobs_running.get() + 1);
        Self { inner }
    }
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        let running = self.inner.jobs_running.get();
        self.inner.jobs_running.set(running.saturating_sub(1));
    }
}

struct DrainGuard<'a> {
    inner: &'a StoreInner,
}

impl<'a> DrainGuard<'a> {
    fn enter(inner: &'a StoreInner) -> Self {
        inner.draining.set(true);
        Self { inner }
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.inner.draining.set(false);
    }
}

/// A reactive tree of JSON values addressed by delimited paths.
///
/// Cloning a `Store` creates a new handle to the **same** tree and
/// listeners. Callbacks that need the store should capture a [`WeakStore`]
/// so the store does not keep itself alive.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use ftui_store::Store;
/// use serde_json::json;
///
/// let store = Store::new(json!({"rows": {"1": {"height": 10}}}));
/// let seen = Rc::new(Cell::new(0));
/// let sink = Rc::clone(&seen);
/// let _sub = store
///     .subscribe("rows.:id.height", move |n| {
///         sink.set(n.value().and_then(|v| v.as_i64()).unwrap_or_default());
///     })
///     .unwrap();
/// assert_eq!(seen.get(), 10);
///
/// store.update("rows.1.height", json!(12)).unwrap();
/// assert_eq!(seen.get(), 12);
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

/// A non-owning handle to a [`Store`].
#[derive(Clone)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    #[must_use]
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.inner.config)
            .field("listeners", &self.listener_count())
            .field("jobs_running", &self.inner.jobs_running.get())
            .field("pending_jobs", &self.pending_jobs())
            .finish_non_exhaustive()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(Value::Object(Default::default()))
    }
}

impl Store {
    /// A store with the default configuration.
    #[must_use]
    pub fn new(initial: Value) -> Self {
        Self::build(initial, StoreConfig::default())
    }

    /// A store with a custom configuration, validated first.
    pub fn with_config(initial: Value, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(initial, config))
    }

    fn build(initial: Value, config: StoreConfig) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                queue: RefCell::new(JobQueue::new(config.max_simultaneous_jobs)),
                config,
                data: RefCell::new(initial),
                registry: RefCell::new(Registry::new()),
                waiting: RefCell::new(Waiting::default()),
                mutes: RefCell::new(Mutes::default()),
                jobs_running: Cell::new(0),
                draining: Cell::new(false),
                next_id: Cell::new(1),
            }),
        }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Rc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn syntax(&self) -> PathSyntax {
        self.inner.config.syntax
    }

    // ─── Reads ──────────────────────────────────────────────────────────

    /// Clone of the value at `path`; `None` if the path is missing.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        self.with(path, |value| value.cloned())
    }

    /// Borrow the value at `path` for the duration of `f`.
    ///
    /// `f` must not write to the store.
    pub fn with<R>(&self, path: &str, f: impl FnOnce(Option<&Value>) -> R) -> R {
        let syntax = self.syntax();
        let segments = syntax.split(path);
        let data = self.inner.data.borrow();
        f(tree::get(&data, &segments))
    }

    /// Every concrete path `pattern` resolves to, with its current value.
    #[must_use]
    pub fn get_matches(&self, pattern: &str) -> Vec<(String, Value)> {
        let syntax = self.syntax();
        let data = self.inner.data.borrow();
        scan(&data, &syntax.canonical(pattern), &syntax)
            .into_iter()
            .map(|(path, value)| (path, value.clone()))
            .collect()
    }

    // ─── Subscriptions ──────────────────────────────────────────────────

    /// Subscribe with default options. The callback runs with the current
    /// value before this returns.
    pub fn subscribe(
        &self,
        path: &str,
        callback: impl Fn(&Notification) + 'static,
    ) -> Result<Subscription> {
        self.subscribe_with_options(path, SubscribeOptions::default(), callback)
    }

    pub fn subscribe_with_options(
        &self,
        path: &str,
        options: SubscribeOptions,
        callback: impl Fn(&Notification) + 'static,
    ) -> Result<Subscription> {
        self.subscribe_paths(&[path], options, Rc::new(callback))
    }

    /// Subscribe one callback to several paths behind a single handle.
    pub fn subscribe_all(
        &self,
        paths: &[&str],
        options: SubscribeOptions,
        callback: impl Fn(&Notification) + 'static,
    ) -> Result<Subscription> {
        self.subscribe_paths(paths, options, Rc::new(callback))
    }

    fn subscribe_paths(
        &self,
        paths: &[&str],
        options: SubscribeOptions,
        callback: Callback,
    ) -> Result<Subscription> {
        let syntax = self.syntax();
        let mut listeners = Vec::with_capacity(paths.len());
        let mut entries = Vec::with_capacity(paths.len());
        {
            let mut registry = self.inner.registry.borrow_mut();
            for path in paths {
                let id = ListenerId(self.next_id());
                let key = CollectionKey::for_path(path, &syntax);
                let listener = Rc::new(Listener::new(
                    id,
                    path,
                    Rc::clone(&callback),
                    options.clone(),
                    &syntax,
                ));
                registry.insert(&key, Rc::clone(&listener), &syntax);
                listeners.push(listener);
                entries.push((key, id));
            }
        }
        // Built before replaying so a failed replay still unregisters.
        let subscription = Subscription::listeners(Rc::downgrade(&self.inner), entries);

        {
            let _job = JobGuard::enter(&self.inner);
            for listener in &listeners {
                let started = listener.options.debug.then(Instant::now);
                let deliveries = {
                    let data = self.inner.data.borrow();
                    let registry = self.inner.registry.borrow();
                    let mutes = self.inner.mutes.borrow();
                    let planner = Planner {
                        syntax: &syntax,
                        tree: &data,
                        registry: &registry,
                        mutes: &mutes,
                    };
                    planner
                        .replay(listener)
                        .into_deliveries(EventKind::Subscribe, &syntax)
                };
                self.deliver(deliveries)?;
                if let Some(started) = started {
                    let elapsed_us = elapsed_us(started);
                    tracing::debug!(
                        message = "store.subscribe",
                        path = %listener.path,
                        listener = %listener.id,
                        elapsed_us
                    );
                    self.inner.config.emit("store.subscribe", || {
                        json!({
                            "path": listener.path,
                            "listener": listener.id.get(),
                            "elapsed_us": elapsed_us,
                        })
                    });
                }
            }
        }
        self.drain_if_idle()?;
        Ok(subscription)
    }

    /// Run `callback` once now, then every time all `paths` have been
    /// written since its previous run.
    pub fn wait_for_all(
        &self,
        paths: &[&str],
        callback: impl Fn(&WaitState) + 'static,
    ) -> Subscription {
        let id = WaitId(self.next_id());
        let callback: WaitCallback = Rc::new(callback);
        let state = self.inner.waiting.borrow_mut().insert(
            id,
            paths,
            Rc::clone(&callback),
            &self.syntax(),
        );
        callback(&state);
        Subscription::barrier(Rc::downgrade(&self.inner), id)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.registry.borrow().listener_count()
    }

    #[must_use]
    pub fn collection_count(&self) -> usize {
        self.inner.registry.borrow().collection_count()
    }

    /// Whether any listener is subscribed to `path` or an equivalent
    /// pattern (`rows.:id` and `rows.*` are equivalent).
    #[must_use]
    pub fn has_listeners(&self, path: &str) -> bool {
        let key = CollectionKey::for_path(path, &self.syntax());
        self.inner.registry.borrow().get(&key).is_some()
    }

    #[must_use]
    pub fn barrier_count(&self) -> usize {
        self.inner.waiting.borrow().len()
    }

    /// Drop every listener and barrier. Outstanding handles become inert.
    pub fn clear_listeners(&self) {
        let listeners = self.inner.registry.borrow_mut().clear();
        let barriers = self.inner.waiting.borrow_mut().clear();
        tracing::debug!(
            message = "store.clear",
            listeners = listeners.len(),
            barriers = barriers.len()
        );
    }

    // ─── Muting ─────────────────────────────────────────────────────────

    /// Suppress deliveries for everything at or below `pattern` (only at
    /// it, if `pattern` carries the non-recursive suffix).
    pub fn mute(&self, pattern: &str) {
        self.inner.mutes.borrow_mut().mute(pattern);
    }

    pub fn unmute(&self, pattern: &str) {
        self.inner.mutes.borrow_mut().unmute(pattern);
    }

    #[must_use]
    pub fn is_muted(&self, path: &str) -> bool {
        self.inner.mutes.borrow().is_muted(path, &self.syntax())
    }

    pub fn mute_listener(&self, id: ListenerId) {
        self.inner.mutes.borrow_mut().mute_listener(id);
    }

    pub fn unmute_listener(&self, id: ListenerId) {
        self.inner.mutes.borrow_mut().unmute_listener(id);
    }

    // ─── Updates ────────────────────────────────────────────────────────

    pub fn update(&self, path: &str, updater: impl Into<Updater>) -> Result<UpdateOutcome> {
        self.update_with_options(path, updater, UpdateOptions::default())
    }

    /// Write at `path` and notify affected listeners.
    ///
    /// A wildcard `path` applies the updater to every current match and
    /// announces all writes in one deduplicated round.
    pub fn update_with_options(
        &self,
        path: &str,
        updater: impl Into<Updater>,
        options: UpdateOptions,
    ) -> Result<UpdateOutcome> {
        let updater = updater.into();
        if self.should_queue(options.queue) {
            self.enqueue(Job::Update {
                path: path.to_owned(),
                updater,
                options,
            })?;
            return Ok(UpdateOutcome::Queued);
        }

        let outcome = {
            let _job = JobGuard::enter(&self.inner);
            let (outcome, writes) = self.write(path, updater, &options);
            self.notify(writes)?;
            outcome
        };
        self.drain_if_idle()?;
        Ok(outcome)
    }

    /// Start a transaction. See [`Multi`].
    #[must_use]
    pub fn multi(&self) -> Multi {
        Multi::new(self.clone())
    }

    // ─── Queue ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    #[must_use]
    pub fn jobs_running(&self) -> usize {
        self.inner.jobs_running.get()
    }

    /// Drain queued jobs now. Returns how many ran; does nothing while an
    /// operation is in flight.
    pub fn run_queued(&self) -> Result<usize> {
        if self.inner.jobs_running.get() > 0 || self.inner.draining.get() {
            return Ok(0);
        }
        self.drain()
    }

    /// Drop every pending job without running it. Returns how many were
    /// dropped.
    pub fn discard_queued(&self) -> usize {
        let jobs = self.inner.queue.borrow_mut().take_all();
        tracing::debug!(message = "store.queue.discard", jobs = jobs.len());
        jobs.len()
    }

    pub(crate) fn should_queue(&self, requested: bool) -> bool {
        (requested || self.inner.config.queue) && self.inner.jobs_running.get() > 0
    }

    pub(crate) fn enqueue(&self, job: Job) -> Result<()> {
        if let Job::Update { path, .. } = &job {
            tracing::trace!(message = "store.queue", path = %path, pending = self.pending_jobs());
        }
        self.inner.queue.borrow_mut().push(job)
    }

    fn drain_if_idle(&self) -> Result<()> {
        if self.inner.jobs_running.get() > 0
            || self.inner.draining.get()
            || self.inner.queue.borrow().is_empty()
        {
            return Ok(());
        }
        self.drain().map(|_| ())
    }

    fn drain(&self) -> Result<usize> {
        let _draining = DrainGuard::enter(&self.inner);
        let runs = self.inner.config.max_queue_runs;
        let mut ran = 0;
        for _ in 0..runs {
            let round = self.inner.queue.borrow().len();
            if round == 0 {
                return Ok(ran);
            }
            for _ in 0..round {
                let next = self.inner.queue.borrow_mut().pop();
                let Some(job) = next else {
                    break;
                };
                self.run_job(job)?;
                ran += 1;
            }
        }
        if self.inner.queue.borrow().is_empty() {
            Ok(ran)
        } else {
            Err(StoreError::QueueRunsExhausted { runs })
        }
    }

    fn run_job(&self, job: Job) -> Result<()> {
        match job {
            Job::Update {
                path,
                updater,
                options,
            } => {
                self.update_with_options(&path, updater, options)?;
            }
            Job::Deliver(delivery) => {
                let _job = JobGuard::enter(&self.inner);
                if delivery.listener.is_active() {
                    self.invoke(&delivery);
                }
            }
        }
        Ok(())
    }

    // ─── Internals ──────────────────────────────────────────────────────

    fn next_id(&self) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        id
    }

    /// Apply an update to the tree without notifying anyone.
    pub(crate) fn write(
        &self,
        path: &str,
        updater: Updater,
        options: &UpdateOptions,
    ) -> (UpdateOutcome, Vec<Written>) {
        let syntax = self.syntax();
        let debug = options.debug || self.inner.config.debug;

        if !syntax.is_wildcard(path) {
            let value = match updater {
                Updater::Set(value) => value,
                with => self.compute(path, &with),
            };
            let outcome = self.store_value(path, value, debug);
            let writes = match outcome {
                UpdateOutcome::Written => vec![Written::new(path, options)],
                _ => Vec::new(),
            };
            return (outcome, writes);
        }

        let targets: Vec<String> = {
            let data = self.inner.data.borrow();
            scan(&data, path, &syntax)
                .into_iter()
                .map(|(target, _)| target)
                .collect()
        };
        if targets.is_empty() {
            return (UpdateOutcome::Skipped, Vec::new());
        }

        let mut writes = Vec::new();
        for target in &targets {
            let value = self.compute(target, &updater);
            if self.store_value(target, value, debug) == UpdateOutcome::Written {
                writes.push(Written::new(target.as_str(), options));
            }
        }
        let outcome = if writes.is_empty() {
            UpdateOutcome::Unchanged
        } else {
            UpdateOutcome::Written
        };
        (outcome, writes)
    }

    fn compute(&self, path: &str, updater: &Updater) -> Value {
        match updater {
            Updater::Set(value) => value.clone(),
            Updater::With(f) => {
                let current = self.get(path);
                f(current.as_ref())
            }
        }
    }

    fn store_value(&self, path: &str, value: Value, debug: bool) -> UpdateOutcome {
        let syntax = self.syntax();
        let segments = syntax.split(path);
        let started = debug.then(Instant::now);

        let (outcome, before, after) = {
            let mut data = self.inner.data.borrow_mut();
            let current = tree::get(&data, &segments);
            if tree::same_scalar(current, &value) {
                (UpdateOutcome::Unchanged, None, None)
            } else {
                let before = if debug { current.cloned() } else { None };
                if tree::set(&mut data, &segments, value, true) {
                    let after = if debug {
                        tree::get(&data, &segments).cloned()
                    } else {
                        None
                    };
                    (UpdateOutcome::Written, before, after)
                } else {
                    (UpdateOutcome::Skipped, before, None)
                }
            }
        };

        if let Some(started) = started {
            let elapsed_us = elapsed_us(started);
            tracing::debug!(
                message = "store.update",
                path,
                outcome = ?outcome,
                before = ?before,
                after = ?after,
                elapsed_us
            );
            self.inner.config.emit("store.update", || {
                json!({
                    "path": path,
                    "outcome": format!("{outcome:?}"),
                    "before": before,
                    "after": after,
                    "elapsed_us": elapsed_us,
                })
            });
        }
        outcome
    }

    /// Plan and deliver notifications for `writes`, then advance barriers.
    pub(crate) fn notify(&self, writes: Vec<Written>) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let syntax = self.syntax();
        let deliveries: Vec<Delivery> = {
            let data = self.inner.data.borrow();
            let registry = self.inner.registry.borrow();
            let mutes = self.inner.mutes.borrow();
            let planner = Planner {
                syntax: &syntax,
                tree: &data,
                registry: &registry,
                mutes: &mutes,
            };
            planner
                .plan(&writes)
                .into_iter()
                .flat_map(|pass| pass.into_deliveries(EventKind::Update, &syntax))
                .collect()
        };
        self.deliver(deliveries)?;

        let fired = self
            .inner
            .waiting
            .borrow_mut()
            .mark(writes.iter().map(|write| write.path.as_str()), &syntax);
        for (callback, state) in fired {
            callback(&state);
        }
        Ok(())
    }

    /// Deliver one round within a running transaction of [`Multi::done`].
    pub(crate) fn flush(&self, writes: Vec<Written>, grouped: bool) -> Result<()> {
        {
            let _job = JobGuard::enter(&self.inner);
            if grouped {
                self.notify(writes)?;
            } else {
                for write in writes {
                    self.notify(vec![write])?;
                }
            }
        }
        self.drain_if_idle()
    }

    /// Apply an update inside a transaction: the write happens now, the
    /// notification is returned for later.
    pub(crate) fn write_deferred(
        &self,
        path: &str,
        updater: Updater,
        options: &UpdateOptions,
    ) -> Vec<Written> {
        let _job = JobGuard::enter(&self.inner);
        self.write(path, updater, options).1
    }

    fn deliver(&self, deliveries: Vec<Delivery>) -> Result<()> {
        for delivery in deliveries {
            if !delivery.listener.is_active() {
                continue;
            }
            if delivery.listener.options.queue && self.inner.jobs_running.get() > 0 {
                self.enqueue(Job::Deliver(delivery))?;
                continue;
            }
            self.invoke(&delivery);
        }
        Ok(())
    }

    fn invoke(&self, delivery: &Delivery) {
        let listener = &delivery.listener;
        if !listener.options.debug {
            (listener.callback)(&delivery.notification);
            return;
        }
        let started = Instant::now();
        (listener.callback)(&delivery.notification);
        let elapsed_us = elapsed_us(started);
        let resolved = delivery.notification.resolved_path.as_deref().unwrap_or("");
        tracing::debug!(
            message = "store.deliver",
            path = resolved,
            listener = %listener.id,
            elapsed_us
        );
        self.inner.config.emit("store.deliver", || {
            json!({
                "path": resolved,
                "listener": listener.id.get(),
                "elapsed_us": elapsed_us,
            })
        });
    }
}

fn elapsed_us(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX)
}

impl StoreInner {
    /// Remove listeners on behalf of a [`Subscription`].
    pub(crate) fn remove_listeners(&self, entries: &[(CollectionKey, ListenerId)]) {
        let removed: Vec<_> = {
            let mut registry = self.registry.borrow_mut();
            entries
                .iter()
                .filter_map(|(key, id)| registry.remove(key, *id))
                .collect()
        };
        drop(removed);
    }

    pub(crate) fn remove_barrier(&self, id: WaitId) {
        let removed = self.waiting.borrow_mut().remove(id);
        drop(removed);
    }
}
