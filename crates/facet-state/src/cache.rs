//! Accessor directory, lifecycle, and invalidation.
//!
//! The cache owns every live [`Accessor`] keyed by its signature, plus the
//! atoms they draw from keyed by path. It reference-counts both layers:
//! clients hold accessors alive, accessors hold atoms alive.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::accessor::{resolve_source, Accessor, AtomMap, ComposeMode};
use crate::error::FacetResult;
use crate::path::{Path, Seg, Signature};

/// Directory of live accessors and the atoms they draw from.
#[derive(Debug)]
pub(crate) struct AccessorCache {
    accessors: HashMap<Signature, Accessor>,
    atoms: AtomMap,
    mode: ComposeMode,
}

impl AccessorCache {
    pub fn new(mode: ComposeMode) -> Self {
        Self {
            accessors: HashMap::new(),
            atoms: AtomMap::new(),
            mode,
        }
    }

    /// Fetch the composed value for `selectors`, creating the accessor and
    /// registering `client_id` on first use.
    pub fn get<S: AsRef<str>>(
        &mut self,
        source: &Map<String, Value>,
        client_id: &str,
        selectors: &[S],
    ) -> FacetResult<Arc<Value>> {
        let signature = Signature::resolve(selectors.iter().map(AsRef::as_ref))?;
        let accessor = self.accessors.entry(signature.clone()).or_insert_with(|| {
            debug!(?signature, "creating accessor");
            Accessor::new(signature.clone())
        });
        if !accessor.has_client(client_id) {
            accessor.add_client(client_id);
        }
        Ok(accessor.refresh_value(source, &mut self.atoms, self.mode))
    }

    /// Detach `client_id` everywhere, tearing down whatever it held alive.
    ///
    /// Accessors left clientless disconnect from their atoms and are
    /// deleted; atoms whose last connection goes with them are dropped too.
    /// Unknown client ids are a no-op.
    pub fn unlink_client(&mut self, client_id: &str) {
        let mut expired: Vec<Signature> = Vec::new();
        for (signature, accessor) in &mut self.accessors {
            if accessor.remove_client(client_id) && accessor.num_clients() == 0 {
                expired.push(signature.clone());
            }
        }
        for signature in expired {
            let Some(accessor) = self.accessors.remove(&signature) else {
                continue;
            };
            for path in accessor.signature().paths() {
                let remaining = match self.atoms.get_mut(path) {
                    Some(atom) => atom.disconnect(accessor.id()),
                    None => continue,
                };
                if remaining == 0 {
                    self.atoms.remove(path);
                    debug!(path = %path, "atom released");
                }
            }
            debug!(?signature, "accessor released");
        }
    }

    /// Propagate one applied mutation through the cache.
    ///
    /// Re-snapshots every atom whose path the `changed` diff touches, then
    /// flags dependent accessors for lazy recomputation. Values are never
    /// recomputed eagerly here.
    pub fn watch_source(&mut self, source: &Map<String, Value>, changed: &Value) {
        let mut updated: Vec<Path> = Vec::new();
        for (path, atom) in &mut self.atoms {
            if is_affected(changed, path) {
                atom.set_value(resolve_source(source, path));
                updated.push(path.clone());
            }
        }
        for accessor in self.accessors.values_mut() {
            if accessor.is_refresh_due() {
                continue;
            }
            let due = match accessor.signature() {
                Signature::Full => true,
                Signature::None => false,
                Signature::Paths(paths) => paths.iter().any(|p| updated.contains(p)),
            };
            if due {
                accessor.mark_refresh_due();
            }
        }
    }

    #[cfg(test)]
    fn atom_paths(&self) -> Vec<&Path> {
        self.atoms.keys().collect()
    }

    #[cfg(test)]
    fn num_accessors(&self) -> usize {
        self.accessors.len()
    }
}

/// Does the `changed` diff touch `path`?
///
/// True when the diff holds an entry at the path itself or anywhere below
/// it, and also when a strict ancestor of the path was wholesale-replaced:
/// the subtree is gone even though no entry exists at the path.
fn is_affected(changed: &Value, path: &Path) -> bool {
    let mut node = changed;
    for seg in path.iter() {
        let map = match node {
            Value::Object(map) => map,
            // an ancestor was replaced with a non-diff value
            _ => return true,
        };
        let child = match seg {
            Seg::Key(k) => map.get(k.as_str()),
            Seg::Index(i) => map.get(&i.to_string()),
        };
        node = match child {
            Some(child) => child,
            None => return false,
        };
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge_state;
    use crate::path;
    use serde_json::json;

    fn source() -> Map<String, Value> {
        match json!({
            "a": 1,
            "b": {"c": 2, "d": [3, 4]},
            "z": "zed"
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_identical_signatures_share_one_accessor() {
        let src = source();
        let mut cache = AccessorCache::new(ComposeMode::Flat);
        let first = cache.get(&src, "client-1", &["b.c", "a"]).unwrap();
        let second = cache.get(&src, "client-2", &["a", "b.c"]).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.num_accessors(), 1);
    }

    #[test]
    fn test_distinct_signatures_get_distinct_accessors() {
        let src = source();
        let mut cache = AccessorCache::new(ComposeMode::Flat);
        cache.get(&src, "client-1", &["a"]).unwrap();
        cache.get(&src, "client-1", &["b.c"]).unwrap();
        assert_eq!(cache.num_accessors(), 2);
    }

    #[test]
    fn test_unlink_client_tears_down_accessors_and_atoms() {
        let src = source();
        let mut cache = AccessorCache::new(ComposeMode::Flat);
        cache.get(&src, "client-1", &["a", "b.c"]).unwrap();
        cache.get(&src, "client-2", &["a"]).unwrap();

        cache.unlink_client("client-1");
        // "a" is still held by client-2's accessor; "b.c" must be gone
        assert_eq!(cache.num_accessors(), 1);
        assert_eq!(cache.atom_paths(), vec![&path!("a")]);

        cache.unlink_client("client-2");
        assert_eq!(cache.num_accessors(), 0);
        assert!(cache.atom_paths().is_empty());
    }

    #[test]
    fn test_unlink_unknown_client_is_noop() {
        let src = source();
        let mut cache = AccessorCache::new(ComposeMode::Flat);
        cache.get(&src, "client-1", &["a"]).unwrap();
        cache.unlink_client("ghost");
        assert_eq!(cache.num_accessors(), 1);
    }

    #[test]
    fn test_watch_source_refreshes_affected_atoms_only() {
        let mut src = source();
        let mut cache = AccessorCache::new(ComposeMode::Flat);
        let stale = cache.get(&src, "client-1", &["b.c"]).unwrap();
        let steady = cache.get(&src, "client-2", &["z"]).unwrap();

        let outcome = merge_state(
            &mut src,
            match json!({"b": {"c": 20}}) {
                Value::Object(map) => map,
                _ => unreachable!(),
            },
        );
        cache.watch_source(&src, &outcome.changed);

        let refreshed = cache.get(&src, "client-1", &["b.c"]).unwrap();
        assert!(!Arc::ptr_eq(&stale, &refreshed));
        assert_eq!(*refreshed, json!({"b.c": 20}));

        // untouched accessor keeps its allocation
        let same = cache.get(&src, "client-2", &["z"]).unwrap();
        assert!(Arc::ptr_eq(&steady, &same));
    }

    #[test]
    fn test_watch_source_ancestor_replacement_invalidates_descendants() {
        let mut src = source();
        let mut cache = AccessorCache::new(ComposeMode::Flat);
        cache.get(&src, "client-1", &["b.d[0]"]).unwrap();

        // replace the whole of "b" with a scalar; the diff holds no entry
        // at "b.d.0" but the subtree is gone
        let outcome = merge_state(
            &mut src,
            match json!({"b": 9}) {
                Value::Object(map) => map,
                _ => unreachable!(),
            },
        );
        cache.watch_source(&src, &outcome.changed);

        let refreshed = cache.get(&src, "client-1", &["b.d[0]"]).unwrap();
        assert_eq!(*refreshed, json!({"b.d.0": null}));
    }

    #[test]
    fn test_watch_source_after_teardown_flags_nothing() {
        let mut src = source();
        let mut cache = AccessorCache::new(ComposeMode::Flat);
        cache.get(&src, "client-1", &["b.c"]).unwrap();
        cache.unlink_client("client-1");

        let outcome = merge_state(
            &mut src,
            match json!({"b": {"c": 21}}) {
                Value::Object(map) => map,
                _ => unreachable!(),
            },
        );
        cache.watch_source(&src, &outcome.changed);
        assert_eq!(cache.num_accessors(), 0);
        assert!(cache.atom_paths().is_empty());
    }

    #[test]
    fn test_full_signature_flagged_on_any_change() {
        let mut src = source();
        let mut cache = AccessorCache::new(ComposeMode::Flat);
        let before = cache
            .get(&src, "client-1", &[crate::path::FULL_STATE_SELECTOR])
            .unwrap();

        let outcome = merge_state(
            &mut src,
            match json!({"z": "zulu"}) {
                Value::Object(map) => map,
                _ => unreachable!(),
            },
        );
        cache.watch_source(&src, &outcome.changed);

        let after = cache
            .get(&src, "client-1", &[crate::path::FULL_STATE_SELECTOR])
            .unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after["z"], json!("zulu"));
    }

    #[test]
    fn test_is_affected_walks_array_diff_keys() {
        let diff = json!({"list": {"2": {"x": 1}}});
        assert!(is_affected(&diff, &path!("list", 2usize)));
        assert!(is_affected(&diff, &path!("list", 2usize, "x")));
        assert!(is_affected(&diff, &path!("list")));
        assert!(!is_affected(&diff, &path!("list", 1usize)));
        assert!(!is_affected(&diff, &path!("other")));
    }
}
