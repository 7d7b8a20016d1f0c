#![forbid(unsafe_code)]

//! Path-addressed reactive data store.
//!
//! A [`Store`] owns one tree of [`serde_json::Value`]s. Components read it
//! by dotted path, write it with [`Store::update`], and subscribe to path
//! patterns that may contain wildcards (`rows.*`), named parameters
//! (`rows.:id`) and a non-recursive suffix (`rows;`).
//!
//! - [`Store`]: reads, writes, subscriptions and the job queue.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`Multi`]: batched writes whose notifications wait for [`Multi::done`].
//! - [`Store::wait_for_all`]: barriers over several paths.
//!
//! # Architecture
//!
//! The store is single-threaded: state lives behind `Rc<RefCell<..>>` and
//! callbacks run synchronously on the calling thread. Writes go through
//! [`tree`]; wildcard expansion goes through [`scan`]; listener matching is
//! planned against an immutable snapshot before any callback runs.
//!
//! # Invariants
//!
//! 1. `subscribe` replays the current value before it returns: once for a
//!    literal path, once per match (or once in bulk) for a wildcard path.
//! 2. Within one round of notifications, a listener sees each resolved path
//!    at most once.
//! 3. Listeners reached in the subscribed pass are never reached again by
//!    the nested pass of the same round.
//! 4. Unsubscribing is idempotent.

pub mod config;
mod dispatch;
pub mod error;
mod listener;
mod queue;
mod registry;
pub mod scan;
mod store;
mod subscription;
mod transaction;
pub mod tree;
mod waiting;

pub use config::{LogHook, StoreConfig, SubscribeOptions, UpdateOptions};
pub use error::{Result, StoreError};
pub use ftui_path::{Params, PathSyntax};
pub use listener::{BulkEntry, Callback, EventKind, ListenerId, Notification, Payload};
pub use store::{Store, UpdateOutcome, Updater, WeakStore};
pub use subscription::Subscription;
pub use transaction::Multi;
pub use waiting::{WaitCallback, WaitState};
