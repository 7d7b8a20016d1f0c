#![forbid(unsafe_code)]

//! Batched writes with deferred notification.
//!
//! Every [`Multi::update`] writes to the tree immediately. Notifications are
//! held back until [`Multi::done`], so listeners only ever observe the tree
//! after the whole batch has been applied.

use std::mem;

use crate::config::UpdateOptions;
use crate::dispatch::Written;
use crate::error::Result;
use crate::queue::Job;
use crate::store::{Store, Updater};

/// A transaction started by [`Store::multi`].
///
/// ```
/// use ftui_store::Store;
/// use serde_json::json;
///
/// let store = Store::new(json!({"a": 0, "b": 0}));
/// let mut multi = store.multi();
/// multi.update("a", json!(1))?.update("b", json!(2))?;
/// multi.done()?;
/// assert_eq!(store.get("b"), Some(json!(2)));
/// # Ok::<(), ftui_store::StoreError>(())
/// ```
pub struct Multi {
    store: Store,
    pending: Vec<Written>,
    grouped: bool,
    finished: bool,
}

impl Multi {
    pub(crate) fn new(store: Store) -> Self {
        Self {
            store,
            pending: Vec::new(),
            grouped: false,
            finished: false,
        }
    }

    /// Announce all writes as one round: a listener reached by several
    /// writes is called once per resolved path instead of once per write.
    #[must_use]
    pub fn grouped(mut self) -> Self {
        self.grouped = true;
        self
    }

    pub fn update(&mut self, path: &str, updater: impl Into<Updater>) -> Result<&mut Self> {
        self.update_with_options(path, updater, UpdateOptions::default())
    }

    /// Write now, notify on [`done`](Self::done).
    ///
    /// With queueing engaged while another operation is in flight, the
    /// update leaves the transaction and joins the job queue instead.
    pub fn update_with_options(
        &mut self,
        path: &str,
        updater: impl Into<Updater>,
        options: UpdateOptions,
    ) -> Result<&mut Self> {
        let updater = updater.into();
        if self.store.should_queue(options.queue) {
            self.store.enqueue(Job::Update {
                path: path.to_owned(),
                updater,
                options,
            })?;
            return Ok(self);
        }
        let writes = self.store.write_deferred(path, updater, &options);
        self.pending.extend(writes);
        Ok(self)
    }

    /// Notifications waiting for [`done`](Self::done).
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Deliver every held-back notification in declaration order.
    pub fn done(mut self) -> Result<()> {
        self.finished = true;
        let pending = mem::take(&mut self.pending);
        self.store.flush(pending, self.grouped)
    }
}

impl Drop for Multi {
    fn drop(&mut self) {
        if !self.finished && !self.pending.is_empty() {
            tracing::warn!(
                message = "store.multi.dropped",
                pending = self.pending.len()
            );
        }
    }
}
