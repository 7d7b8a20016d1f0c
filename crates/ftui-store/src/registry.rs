#![forbid(unsafe_code)]

//! Listener collections in creation order.
//!
//! Collections are created on first subscribe to a canonical path and
//! dropped as soon as their last listener leaves. Iteration follows
//! creation order so that dispatch order is deterministic.

use std::collections::BTreeMap;
use std::rc::Rc;

use ahash::AHashMap;
use ftui_path::PathSyntax;

use crate::listener::{CollectionKey, Listener, ListenerCollection, ListenerId};

#[derive(Debug, Default)]
pub(crate) struct Registry {
    collections: BTreeMap<u64, ListenerCollection>,
    index: AHashMap<CollectionKey, u64>,
    next_seq: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` under `key`, creating the collection on demand.
    pub fn insert(&mut self, key: &CollectionKey, listener: Rc<Listener>, syntax: &PathSyntax) {
        let seq = match self.index.get(key) {
            Some(seq) => *seq,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.collections
                    .insert(seq, ListenerCollection::new(key, syntax));
                self.index.insert(key.clone(), seq);
                seq
            }
        };
        if let Some(collection) = self.collections.get_mut(&seq) {
            collection.listeners.insert(listener.id, listener);
        }
    }

    /// Remove one listener. Unknown keys and ids are ignored.
    ///
    /// The removed listener is handed back so the caller can drop it after
    /// releasing its borrow of the registry.
    pub fn remove(&mut self, key: &CollectionKey, id: ListenerId) -> Option<Rc<Listener>> {
        let seq = self.index.get(key).copied()?;
        let collection = self.collections.get_mut(&seq)?;
        let listener = collection.listeners.remove(&id)?;
        listener.deactivate();
        if collection.listeners.is_empty() {
            self.collections.remove(&seq);
            self.index.remove(key);
        }
        Some(listener)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ListenerCollection> {
        self.collections.values()
    }

    pub fn get(&self, key: &CollectionKey) -> Option<&ListenerCollection> {
        self.index
            .get(key)
            .and_then(|seq| self.collections.get(seq))
    }

    pub fn listener_count(&self) -> usize {
        self.collections
            .values()
            .map(|collection| collection.listeners.len())
            .sum()
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    /// Drop every collection, returning the listeners that were registered.
    pub fn clear(&mut self) -> Vec<Rc<Listener>> {
        self.index.clear();
        std::mem::take(&mut self.collections)
            .into_values()
            .flat_map(|collection| collection.listeners.into_values())
            .inspect(|listener| listener.deactivate())
            .collect()
    }
}
