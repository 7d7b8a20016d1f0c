#![forbid(unsafe_code)]

//! Listeners, the notifications they receive, and the collections that
//! group listeners by canonical path.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use ftui_path::{Params, ParamsInfo, PathSyntax};
use serde_json::Value;

use crate::config::SubscribeOptions;

/// Identifies one registered listener for the lifetime of its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a listener is being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Replay of the current value while subscribing.
    Subscribe,
    /// A write touched the listener's path.
    Update,
}

/// One match inside a bulk delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkEntry {
    pub path: String,
    pub params: Params,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The value at the resolved path; `None` if the path is missing.
    Value(Option<Value>),
    /// Every match of one dispatch pass, for bulk listeners.
    Bulk(Vec<BulkEntry>),
}

/// What a listener callback receives.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: EventKind,
    pub listener_id: ListenerId,
    /// The path as passed to `subscribe`.
    pub listener_path: String,
    /// The concrete path that was written. `None` during subscribe replay.
    /// For bulk deliveries this is the write that produced the first entry.
    pub update_path: Option<String>,
    /// The concrete path the listener matched. `None` for bulk deliveries.
    pub resolved_path: Option<String>,
    /// Parameter values captured from `resolved_path`.
    pub params: Params,
    pub payload: Payload,
    /// The `data` attached to the update, if any.
    pub data: Option<Value>,
}

impl Notification {
    /// The single delivered value; `None` for bulk payloads and missing paths.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Value(value) => value.as_ref(),
            Payload::Bulk(_) => None,
        }
    }

    /// The bulk entries; empty for single-value payloads.
    #[must_use]
    pub fn bulk(&self) -> &[BulkEntry] {
        match &self.payload {
            Payload::Bulk(entries) => entries,
            Payload::Value(_) => &[],
        }
    }
}

pub type Callback = Rc<dyn Fn(&Notification)>;

/// Memoized ignore decisions kept per listener before the cache is reset.
const IGNORE_CACHE_LIMIT: usize = 256;

/// A registered callback together with its options.
pub(crate) struct Listener {
    pub id: ListenerId,
    /// The path as subscribed, before canonicalization.
    pub path: String,
    pub callback: Callback,
    pub options: SubscribeOptions,
    pub params_info: Option<ParamsInfo>,
    /// Bulk delivery; only wildcard paths deliver in bulk.
    pub bulk: bool,
    active: Cell<bool>,
    ignore_cache: RefCell<AHashMap<String, bool>>,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("options", &self.options)
            .field("active", &self.active.get())
            .finish_non_exhaustive()
    }
}

impl Listener {
    pub fn new(
        id: ListenerId,
        path: &str,
        callback: Callback,
        options: SubscribeOptions,
        syntax: &PathSyntax,
    ) -> Self {
        Self {
            id,
            path: path.to_owned(),
            callback,
            params_info: syntax.params_info(syntax.clean_not_recursive(path)),
            bulk: options.bulk && syntax.is_wildcard(&syntax.canonical(path)),
            options,
            active: Cell::new(true),
            ignore_cache: RefCell::new(AHashMap::new()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Mark as removed so already planned deliveries are dropped.
    pub fn deactivate(&self) {
        self.active.set(false);
    }

    pub fn params(&self, resolved: &str, syntax: &PathSyntax) -> Params {
        self.params_info
            .as_ref()
            .map(|info| info.params(resolved, syntax))
            .unwrap_or_default()
    }

    /// Whether `changed` falls under one of this listener's ignore patterns.
    pub fn is_ignored(&self, changed: &str, syntax: &PathSyntax) -> bool {
        if self.options.ignore.is_empty() {
            return false;
        }
        if let Some(hit) = self.ignore_cache.borrow().get(changed) {
            return *hit;
        }
        let hit = self
            .options
            .ignore
            .iter()
            .any(|pattern| covers(pattern, changed, syntax));
        let mut cache = self.ignore_cache.borrow_mut();
        if cache.len() >= IGNORE_CACHE_LIMIT {
            cache.clear();
        }
        cache.insert(changed.to_owned(), hit);
        hit
    }
}

/// Whether `path` is at or below `pattern`. A pattern carrying the
/// non-recursive suffix only covers paths of its own depth.
pub(crate) fn covers(pattern: &str, path: &str, syntax: &PathSyntax) -> bool {
    let recursive = !syntax.is_not_recursive(pattern);
    let pattern = syntax.canonical(pattern);
    if recursive {
        syntax.depth(path) >= syntax.depth(&pattern)
            && syntax.match_path(&pattern, syntax.cut(path, &pattern))
    } else {
        syntax.match_path(&pattern, path)
    }
}

/// Registry key of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CollectionKey {
    pub path: String,
    pub recursive: bool,
}

impl CollectionKey {
    pub fn for_path(path: &str, syntax: &PathSyntax) -> Self {
        Self {
            path: syntax.canonical(path),
            recursive: !syntax.is_not_recursive(path),
        }
    }
}

/// Listeners sharing one canonical path and recursion mode.
#[derive(Debug)]
pub(crate) struct ListenerCollection {
    pub path: String,
    pub is_wildcard: bool,
    pub is_recursive: bool,
    pub listeners: BTreeMap<ListenerId, Rc<Listener>>,
}

impl ListenerCollection {
    pub fn new(key: &CollectionKey, syntax: &PathSyntax) -> Self {
        Self {
            path: key.path.clone(),
            is_wildcard: syntax.is_wildcard(&key.path),
            is_recursive: key.recursive,
            listeners: BTreeMap::new(),
        }
    }

    pub fn depth(&self, syntax: &PathSyntax) -> usize {
        syntax.depth(&self.path)
    }

    /// The path this collection resolves to for a write at `update_path`, or
    /// `None` if the write does not reach it.
    ///
    /// Recursive collections see writes anywhere below them and resolve to
    /// their own depth; non-recursive collections need an exact match.
    pub fn resolve<'u>(&self, update_path: &'u str, syntax: &PathSyntax) -> Option<&'u str> {
        let compared = if self.is_recursive {
            syntax.cut(update_path, &self.path)
        } else {
            update_path
        };
        let hit = if self.is_wildcard {
            syntax.match_path(&self.path, compared)
        } else {
            self.path == compared
        };
        hit.then_some(compared)
    }
}
