#![forbid(unsafe_code)]

//! Barriers that fire once every watched path has changed.
//!
//! A barrier runs its callback once at registration with every path clean.
//! After that, each write marks the watched paths it reaches as dirty; as
//! soon as all are dirty the callback runs and every flag is cleared again,
//! so the barrier re-arms for the next round.

use std::collections::BTreeMap;
use std::rc::Rc;

use ftui_path::PathSyntax;

/// Snapshot handed to a barrier callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitState {
    /// Watched paths as registered.
    pub paths: Vec<String>,
    /// Dirty flag per path, parallel to `paths`.
    pub dirty: Vec<bool>,
    /// How many times the barrier has fired before this call.
    pub firings: u64,
}

impl WaitState {
    #[must_use]
    pub fn all_dirty(&self) -> bool {
        self.dirty.iter().all(|dirty| *dirty)
    }

    #[must_use]
    pub fn is_dirty(&self, path: &str) -> bool {
        self.paths
            .iter()
            .zip(&self.dirty)
            .any(|(candidate, dirty)| candidate == path && *dirty)
    }
}

pub type WaitCallback = Rc<dyn Fn(&WaitState)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct WaitId(pub u64);

struct Watched {
    original: String,
    pattern: String,
    recursive: bool,
    dirty: bool,
}

struct Barrier {
    watched: Vec<Watched>,
    callback: WaitCallback,
    firings: u64,
}

impl Barrier {
    fn state(&self) -> WaitState {
        WaitState {
            paths: self.watched.iter().map(|w| w.original.clone()).collect(),
            dirty: self.watched.iter().map(|w| w.dirty).collect(),
            firings: self.firings,
        }
    }
}

#[derive(Default)]
pub(crate) struct Waiting {
    barriers: BTreeMap<WaitId, Barrier>,
}

impl Waiting {
    /// Register a barrier and return the state for its initial call.
    pub fn insert(
        &mut self,
        id: WaitId,
        paths: &[&str],
        callback: WaitCallback,
        syntax: &PathSyntax,
    ) -> WaitState {
        let barrier = Barrier {
            watched: paths
                .iter()
                .map(|path| Watched {
                    original: (*path).to_owned(),
                    pattern: syntax.canonical(path),
                    recursive: !syntax.is_not_recursive(path),
                    dirty: false,
                })
                .collect(),
            callback,
            firings: 0,
        };
        let state = barrier.state();
        self.barriers.insert(id, barrier);
        state
    }

    /// Remove a barrier, handing back its callback so the caller can drop
    /// it outside any borrow.
    pub fn remove(&mut self, id: WaitId) -> Option<WaitCallback> {
        self.barriers.remove(&id).map(|barrier| barrier.callback)
    }

    pub fn len(&self) -> usize {
        self.barriers.len()
    }

    pub fn clear(&mut self) -> Vec<WaitCallback> {
        std::mem::take(&mut self.barriers)
            .into_values()
            .map(|barrier| barrier.callback)
            .collect()
    }

    /// Mark watched paths reached by `written` and collect barriers that
    /// are now complete. Completed barriers are reset before returning.
    pub fn mark<'p>(
        &mut self,
        written: impl IntoIterator<Item = &'p str> + Clone,
        syntax: &PathSyntax,
    ) -> Vec<(WaitCallback, WaitState)> {
        let mut fired = Vec::new();
        for barrier in self.barriers.values_mut() {
            for watched in &mut barrier.watched {
                if written
                    .clone()
                    .into_iter()
                    .any(|path| reaches(watched, path, syntax))
                {
                    watched.dirty = true;
                }
            }
            if barrier.watched.iter().all(|w| w.dirty) {
                fired.push((Rc::clone(&barrier.callback), barrier.state()));
                barrier.firings += 1;
                for watched in &mut barrier.watched {
                    watched.dirty = false;
                }
            }
        }
        fired
    }
}

/// A write reaches a watched path when it lands on it, above it, or (for
/// recursive paths) anywhere below it.
fn reaches(watched: &Watched, written: &str, syntax: &PathSyntax) -> bool {
    let own = syntax.depth(&watched.pattern);
    let depth = syntax.depth(written);
    if depth <= own {
        return syntax.match_path(syntax.cut(&watched.pattern, written), written);
    }
    watched.recursive && syntax.match_path(&watched.pattern, syntax.cut(written, &watched.pattern))
}
