#![forbid(unsafe_code)]

//! Notification planning.
//!
//! Planning runs against an immutable view of the tree and the registry and
//! produces owned [`Delivery`] values. No callback runs while planning, so
//! callbacks are free to read and write the store once delivery starts.
//!
//! # Passes
//!
//! A write at `U` is planned in up to three passes:
//!
//! 1. **Subscribed**: every collection that [`resolves`] `U` receives the
//!    value at the resolved path.
//! 2. **Nested**: if the value now at `U` is a map or list, collections
//!    deeper than `U` whose prefix matches `U` are expanded by scanning the
//!    subtree with their remaining segments. Listeners already notified in
//!    pass 1 are skipped.
//! 3. **Only**: replaces passes 1 and 2 when the write lists `only`
//!    patterns and the value at `U` is composite. Each pattern is scanned
//!    under `U` and collections matching the resulting full path at equal
//!    depth are notified.
//!
//! Inside a pass, a listener receives each resolved path at most once and a
//! bulk listener receives a single call holding every entry.
//!
//! [`resolves`]: ListenerCollection::resolve

use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use ftui_path::PathSyntax;
use serde_json::Value;

use crate::config::UpdateOptions;
use crate::listener::{
    BulkEntry, EventKind, Listener, ListenerCollection, ListenerId, Notification, Payload, covers,
};
use crate::registry::Registry;
use crate::scan::scan;
use crate::tree;

/// A write waiting to be announced.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Written {
    pub path: String,
    pub only: Vec<String>,
    pub data: Option<Value>,
}

impl Written {
    pub fn new(path: impl Into<String>, options: &UpdateOptions) -> Self {
        Self {
            path: path.into(),
            only: options.only.clone(),
            data: options.data.clone(),
        }
    }
}

/// Paths and listeners currently silenced.
#[derive(Debug, Default)]
pub(crate) struct Mutes {
    patterns: Vec<String>,
    listeners: AHashSet<ListenerId>,
}

impl Mutes {
    pub fn mute(&mut self, pattern: &str) {
        if !self.patterns.iter().any(|p| p == pattern) {
            self.patterns.push(pattern.to_owned());
        }
    }

    pub fn unmute(&mut self, pattern: &str) {
        self.patterns.retain(|p| p != pattern);
    }

    pub fn mute_listener(&mut self, id: ListenerId) {
        self.listeners.insert(id);
    }

    pub fn unmute_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
    }

    pub fn is_muted(&self, path: &str, syntax: &PathSyntax) -> bool {
        self.patterns
            .iter()
            .any(|pattern| covers(pattern, path, syntax))
    }

    fn silences(&self, id: ListenerId, path: &str, syntax: &PathSyntax) -> bool {
        self.listeners.contains(&id) || self.is_muted(path, syntax)
    }
}

/// A notification bound to the listener that will receive it.
pub(crate) struct Delivery {
    pub listener: Rc<Listener>,
    pub notification: Notification,
}

struct Single {
    listener: Rc<Listener>,
    update_path: Option<String>,
    resolved: String,
    value: Option<Value>,
    data: Option<Value>,
}

struct Bulk {
    listener: Rc<Listener>,
    update_path: Option<String>,
    data: Option<Value>,
    entries: Vec<(String, Option<Value>)>,
}

enum Slot {
    Single(Single),
    Bulk(Bulk),
}

/// Ordered, deduplicated deliveries of one pass.
#[derive(Default)]
pub(crate) struct Pass {
    slots: Vec<Slot>,
    bulk_slots: AHashMap<ListenerId, usize>,
    seen: AHashSet<(ListenerId, String)>,
    notified: AHashSet<ListenerId>,
}

impl Pass {
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Listeners that received at least one entry in this pass.
    pub fn notified(&self) -> &AHashSet<ListenerId> {
        &self.notified
    }

    /// Make sure a bulk listener gets a call even if nothing matches.
    fn open_bulk(
        &mut self,
        listener: &Rc<Listener>,
        update_path: Option<&str>,
        data: Option<&Value>,
    ) {
        if self.bulk_slots.contains_key(&listener.id) {
            return;
        }
        self.bulk_slots.insert(listener.id, self.slots.len());
        self.slots.push(Slot::Bulk(Bulk {
            listener: Rc::clone(listener),
            update_path: update_path.map(str::to_owned),
            data: data.cloned(),
            entries: Vec::new(),
        }));
        self.notified.insert(listener.id);
    }

    fn push(
        &mut self,
        listener: &Rc<Listener>,
        update_path: Option<&str>,
        resolved: &str,
        value: Option<&Value>,
        data: Option<&Value>,
    ) {
        if !self.seen.insert((listener.id, resolved.to_owned())) {
            return;
        }
        self.notified.insert(listener.id);

        if !listener.bulk {
            self.slots.push(Slot::Single(Single {
                listener: Rc::clone(listener),
                update_path: update_path.map(str::to_owned),
                resolved: resolved.to_owned(),
                value: value.cloned(),
                data: data.cloned(),
            }));
            return;
        }

        self.open_bulk(listener, update_path, data);
        if let Some(Slot::Bulk(bulk)) = self
            .bulk_slots
            .get(&listener.id)
            .and_then(|index| self.slots.get_mut(*index))
        {
            bulk.entries.push((resolved.to_owned(), value.cloned()));
        }
    }

    pub fn into_deliveries(self, kind: EventKind, syntax: &PathSyntax) -> Vec<Delivery> {
        self.slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Single(single) => {
                    let params = single.listener.params(&single.resolved, syntax);
                    Delivery {
                        notification: Notification {
                            kind,
                            listener_id: single.listener.id,
                            listener_path: single.listener.path.clone(),
                            update_path: single.update_path,
                            resolved_path: Some(single.resolved),
                            params,
                            payload: Payload::Value(single.value),
                            data: single.data,
                        },
                        listener: single.listener,
                    }
                }
                Slot::Bulk(bulk) => {
                    let entries = bulk
                        .entries
                        .into_iter()
                        .map(|(path, value)| BulkEntry {
                            params: bulk.listener.params(&path, syntax),
                            path,
                            value,
                        })
                        .collect();
                    Delivery {
                        notification: Notification {
                            kind,
                            listener_id: bulk.listener.id,
                            listener_path: bulk.listener.path.clone(),
                            update_path: bulk.update_path,
                            resolved_path: None,
                            params: Default::default(),
                            payload: Payload::Bulk(entries),
                            data: bulk.data,
                        },
                        listener: bulk.listener,
                    }
                }
            })
            .collect()
    }
}

/// Read-only view used to plan one round of notifications.
pub(crate) struct Planner<'a> {
    pub syntax: &'a PathSyntax,
    pub tree: &'a Value,
    pub registry: &'a Registry,
    pub mutes: &'a Mutes,
}

impl Planner<'_> {
    /// Deliveries replaying the current state to a fresh listener.
    ///
    /// A literal path yields exactly one entry, even when the path is
    /// missing. A wildcard path yields one entry per current match.
    pub fn replay(&self, listener: &Rc<Listener>) -> Pass {
        let mut pass = Pass::default();
        let canonical = self.syntax.canonical(&listener.path);
        if listener.bulk {
            pass.open_bulk(listener, None, None);
        }

        if !self.syntax.is_wildcard(&canonical) {
            let segments = self.syntax.split(&canonical);
            if self.admits(listener, &canonical) {
                pass.push(listener, None, &canonical, tree::get(self.tree, &segments), None);
            }
            return pass;
        }

        for (path, value) in scan(self.tree, &canonical, self.syntax) {
            if self.admits(listener, &path) {
                pass.push(listener, None, &path, Some(value), None);
            }
        }
        pass
    }

    /// Plan every pass for a batch of writes; empty passes are dropped.
    pub fn plan(&self, writes: &[Written]) -> Vec<Pass> {
        let (only, default): (Vec<&Written>, Vec<&Written>) = writes
            .iter()
            .partition(|write| !write.only.is_empty() && self.is_composite_at(&write.path));

        let mut subscribed = Pass::default();
        for write in &default {
            self.subscribed(write, &mut subscribed);
        }

        let mut nested = Pass::default();
        for write in &default {
            self.nested(write, subscribed.notified(), &mut nested);
        }

        let mut targeted = Pass::default();
        for write in &only {
            self.only(write, &mut targeted);
        }

        [subscribed, nested, targeted]
            .into_iter()
            .filter(|pass| !pass.is_empty())
            .collect()
    }

    fn subscribed(&self, write: &Written, pass: &mut Pass) {
        for collection in self.registry.iter() {
            let Some(resolved) = collection.resolve(&write.path, self.syntax) else {
                continue;
            };
            let segments = self.syntax.split(resolved);
            let value = tree::get(self.tree, &segments);
            self.push_all(collection, write, resolved, value, pass);
        }
    }

    fn nested(&self, write: &Written, exclude: &AHashSet<ListenerId>, pass: &mut Pass) {
        let update_segments = self.syntax.split(&write.path);
        let Some(written) = tree::get(self.tree, &update_segments) else {
            return;
        };
        if !tree::is_composite(written) {
            return;
        }
        let depth = update_segments.len();

        for collection in self.registry.iter() {
            if collection.depth(self.syntax) <= depth {
                continue;
            }
            let prefix = self.syntax.cut(&collection.path, &write.path);
            if !self.syntax.match_path(prefix, &write.path) {
                continue;
            }
            let segments = self.syntax.split(&collection.path);
            let rest = self.syntax.join(segments[depth..].iter().copied());
            for (sub, value) in scan(written, &rest, self.syntax) {
                let resolved = self.syntax.child(&write.path, &sub);
                for listener in collection.listeners.values() {
                    if exclude.contains(&listener.id) {
                        continue;
                    }
                    if self.admits_change(listener, &write.path, &resolved) {
                        pass.push(
                            listener,
                            Some(&write.path),
                            &resolved,
                            Some(value),
                            write.data.as_ref(),
                        );
                    }
                }
            }
        }
    }

    fn only(&self, write: &Written, pass: &mut Pass) {
        let segments = self.syntax.split(&write.path);
        let Some(written) = tree::get(self.tree, &segments) else {
            return;
        };
        for pattern in &write.only {
            for (sub, value) in scan(written, pattern, self.syntax) {
                let full = self.syntax.child(&write.path, &sub);
                let depth = self.syntax.depth(&full);
                for collection in self.registry.iter() {
                    if collection.depth(self.syntax) == depth
                        && self.syntax.match_path(&collection.path, &full)
                    {
                        self.push_all(collection, write, &full, Some(value), pass);
                    }
                }
            }
        }
    }

    fn push_all(
        &self,
        collection: &ListenerCollection,
        write: &Written,
        resolved: &str,
        value: Option<&Value>,
        pass: &mut Pass,
    ) {
        for listener in collection.listeners.values() {
            if self.admits_change(listener, &write.path, resolved) {
                pass.push(
                    listener,
                    Some(&write.path),
                    resolved,
                    value,
                    write.data.as_ref(),
                );
            }
        }
    }

    fn is_composite_at(&self, path: &str) -> bool {
        let segments = self.syntax.split(path);
        tree::get(self.tree, &segments).is_some_and(tree::is_composite)
    }

    /// Ignore and mute filters look at the deeper of the written path and
    /// the resolved path: whatever actually changed for this listener.
    fn admits_change(&self, listener: &Listener, update_path: &str, resolved: &str) -> bool {
        let changed = if self.syntax.depth(resolved) > self.syntax.depth(update_path) {
            resolved
        } else {
            update_path
        };
        self.admits(listener, changed)
    }

    fn admits(&self, listener: &Listener, changed: &str) -> bool {
        !listener.is_ignored(changed, self.syntax)
            && !self.mutes.silences(listener.id, changed, self.syntax)
    }
}
