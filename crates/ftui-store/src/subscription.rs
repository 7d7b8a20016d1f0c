#![forbid(unsafe_code)]

//! RAII handles for listeners and barriers.

use std::cell::Cell;
use std::fmt;
use std::rc::Weak;

use crate::listener::{CollectionKey, ListenerId};
use crate::store::StoreInner;
use crate::waiting::WaitId;

enum Target {
    Listeners(Vec<(CollectionKey, ListenerId)>),
    Barrier(WaitId),
}

/// Keeps a subscription alive. Dropping it unsubscribes.
///
/// The handle holds the store weakly: it never keeps the store alive, and
/// unsubscribing after the store is gone is a no-op.
#[must_use = "dropping a Subscription unsubscribes it immediately"]
pub struct Subscription {
    store: Weak<StoreInner>,
    target: Target,
    active: Cell<bool>,
}

impl Subscription {
    pub(crate) fn listeners(
        store: Weak<StoreInner>,
        entries: Vec<(CollectionKey, ListenerId)>,
    ) -> Self {
        Self {
            store,
            target: Target::Listeners(entries),
            active: Cell::new(true),
        }
    }

    pub(crate) fn barrier(store: Weak<StoreInner>, id: WaitId) -> Self {
        Self {
            store,
            target: Target::Barrier(id),
            active: Cell::new(true),
        }
    }

    /// The first listener behind this handle; `None` for barriers.
    #[must_use]
    pub fn id(&self) -> Option<ListenerId> {
        self.ids().next()
    }

    /// Every listener behind this handle, one per subscribed path.
    pub fn ids(&self) -> impl Iterator<Item = ListenerId> + '_ {
        let entries: &[(CollectionKey, ListenerId)] = match &self.target {
            Target::Listeners(entries) => entries,
            Target::Barrier(_) => &[],
        };
        entries.iter().map(|(_, id)| *id)
    }

    /// Whether the handle still unsubscribes something when dropped.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get() && self.store.strong_count() > 0
    }

    /// Remove the listeners or barrier now. Calling this again is a no-op.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        match &self.target {
            Target::Listeners(entries) => inner.remove_listeners(entries),
            Target::Barrier(id) => inner.remove_barrier(*id),
        }
    }

    /// Keep the subscription for the rest of the store's life.
    pub fn detach(self) {
        self.active.set(false);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.target {
            Target::Listeners(_) => "listeners",
            Target::Barrier(_) => "barrier",
        };
        f.debug_struct("Subscription")
            .field("kind", &kind)
            .field("ids", &self.ids().collect::<Vec<_>>())
            .field("active", &self.active.get())
            .finish()
    }
}
