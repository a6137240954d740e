//! Shared memoized composed values.
//!
//! Every client whose selector set reduces to the same [`Signature`] shares
//! one `Accessor`. The accessor memoizes its composed value and only
//! recomputes when flagged stale by the cache's invalidation walk.

use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::atom::Atom;
use crate::ids::{next_accessor_id, AccessorId};
use crate::path::{Path, Seg, Signature};

/// How composed values address the slices they carry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ComposeMode {
    /// Key each slice by its canonical dotted path string:
    /// `{"a.b.2.c": value}`.
    #[default]
    Flat,
    /// Rebuild the nesting shape implied by each path:
    /// `{"a": {"b": [null, null, {"c": value}]}}`.
    Tree,
}

pub(crate) type AtomMap = HashMap<Path, Atom>;

/// One memoized composed value shared by every client with the same
/// signature.
#[derive(Debug)]
pub(crate) struct Accessor {
    id: AccessorId,
    signature: Signature,
    clients: HashSet<String>,
    value: Arc<Value>,
    refresh_due: bool,
}

impl Accessor {
    pub fn new(signature: Signature) -> Self {
        Self {
            id: next_accessor_id(),
            signature,
            clients: HashSet::new(),
            value: Arc::new(Value::Object(Map::new())),
            // fresh accessors always compute on first read
            refresh_due: true,
        }
    }

    #[inline]
    pub fn id(&self) -> AccessorId {
        self.id
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[inline]
    pub fn is_refresh_due(&self) -> bool {
        self.refresh_due
    }

    #[inline]
    pub fn mark_refresh_due(&mut self) {
        self.refresh_due = true;
    }

    pub fn add_client(&mut self, client_id: &str) {
        self.clients.insert(client_id.to_owned());
    }

    pub fn remove_client(&mut self, client_id: &str) -> bool {
        self.clients.remove(client_id)
    }

    pub fn has_client(&self, client_id: &str) -> bool {
        self.clients.contains(client_id)
    }

    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// Return the composed value, recomputing it first when stale.
    ///
    /// Recomputation pulls each tracked path from its atom, creating and
    /// connecting atoms on demand from the live source. Full-tree
    /// signatures snapshot the source directly, bypassing atoms. The result
    /// is stored as a fresh snapshot; repeat calls between refreshes hand
    /// back the same allocation.
    pub fn refresh_value(
        &mut self,
        source: &Map<String, Value>,
        atoms: &mut AtomMap,
        mode: ComposeMode,
    ) -> Arc<Value> {
        if !self.refresh_due {
            return Arc::clone(&self.value);
        }
        let composed = match &self.signature {
            Signature::Full => Value::Object(source.clone()),
            Signature::None => Value::Object(Map::new()),
            Signature::Paths(paths) => {
                let mut root = Value::Object(Map::new());
                for path in paths {
                    let atom = atoms.entry(path.clone()).or_insert_with(|| {
                        debug!(path = %path, "creating atom");
                        Atom::new(resolve_source(source, path))
                    });
                    if !atom.is_connected(self.id) {
                        atom.connect(self.id);
                    }
                    let slice = atom.value().as_ref().clone();
                    match mode {
                        ComposeMode::Flat => {
                            if let Value::Object(map) = &mut root {
                                map.insert(path.dotted(), slice);
                            }
                        }
                        ComposeMode::Tree => plant(&mut root, path.segments(), slice),
                    }
                }
                root
            }
        };
        self.value = Arc::new(composed);
        self.refresh_due = false;
        Arc::clone(&self.value)
    }
}

/// Snapshot of the live source at `path`; missing paths read as null.
pub(crate) fn resolve_source(source: &Map<String, Value>, path: &Path) -> Value {
    value_at(source, path).cloned().unwrap_or(Value::Null)
}

/// Walk `path` down the source tree.
///
/// Index segments address array slots, and fall back to same-spelled
/// object keys so `"a.0"` still reads `{"a": {"0": value}}`.
pub(crate) fn value_at<'a>(source: &'a Map<String, Value>, path: &Path) -> Option<&'a Value> {
    let mut segs = path.iter();
    let mut node = match segs.next()? {
        Seg::Key(k) => source.get(k.as_str()),
        Seg::Index(i) => source.get(&i.to_string()),
    }?;
    for seg in segs {
        node = match (seg, node) {
            (Seg::Key(k), Value::Object(map)) => map.get(k.as_str()),
            (Seg::Index(i), Value::Array(items)) => items.get(*i),
            (Seg::Index(i), Value::Object(map)) => map.get(&i.to_string()),
            _ => None,
        }?;
    }
    Some(node)
}

/// Graft `value` into `root` at `segs`, creating containers along the way.
fn plant(root: &mut Value, segs: &[Seg], value: Value) {
    let Some((seg, rest)) = segs.split_first() else {
        *root = value;
        return;
    };
    match seg {
        Seg::Key(k) => {
            if !root.is_object() {
                *root = Value::Object(Map::new());
            }
            if let Value::Object(map) = root {
                plant(map.entry(k.clone()).or_insert(Value::Null), rest, value);
            }
        }
        Seg::Index(i) => {
            if !root.is_array() {
                *root = Value::Array(Vec::new());
            }
            if let Value::Array(items) = root {
                if items.len() <= *i {
                    items.resize(i + 1, Value::Null);
                }
                plant(&mut items[*i], rest, value);
            }
        }
    }
}
