//! Per-path snapshot cell.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::ids::AccessorId;

/// One entry per property path still in use by live accessors.
///
/// An atom holds the latest immutable snapshot of the state at its path and
/// the set of accessor ids connected to it. The cache drops an atom when its
/// last connection goes away.
#[derive(Debug)]
pub struct Atom {
    connections: HashSet<AccessorId>,
    value: Arc<Value>,
}

impl Atom {
    /// Create an atom holding `snapshot`.
    pub fn new(snapshot: Value) -> Self {
        Self {
            connections: HashSet::new(),
            value: Arc::new(snapshot),
        }
    }

    /// Latest snapshot at this atom's path.
    #[inline]
    pub fn value(&self) -> &Arc<Value> {
        &self.value
    }

    /// Replace the snapshot. The new value gets its own allocation, so
    /// snapshots already handed to consumers stay untouched.
    pub fn set_value(&mut self, value: Value) {
        self.value = Arc::new(value);
    }

    /// Register a dependent accessor. Returns the connection count.
    pub fn connect(&mut self, id: AccessorId) -> usize {
        self.connections.insert(id);
        self.connections.len()
    }

    /// Remove a dependent accessor. Returns the remaining connection count.
    pub fn disconnect(&mut self, id: AccessorId) -> usize {
        self.connections.remove(&id);
        self.connections.len()
    }

    /// Whether `id` is currently connected.
    #[inline]
    pub fn is_connected(&self, id: AccessorId) -> bool {
        self.connections.contains(&id)
    }

    /// Number of connected accessors.
    #[inline]
    pub fn num_connections(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdAllocator;
    use serde_json::json;

    #[test]
    fn test_connection_counting() {
        let allocator = IdAllocator::new();
        let a = allocator.allocate();
        let b = allocator.allocate();

        let mut atom = Atom::new(json!({"x": 1}));
        assert_eq!(atom.connect(a), 1);
        assert_eq!(atom.connect(b), 2);
        assert_eq!(atom.connect(a), 2); // already connected
        assert!(atom.is_connected(a));

        assert_eq!(atom.disconnect(a), 1);
        assert!(!atom.is_connected(a));
        assert_eq!(atom.disconnect(a), 1); // idempotent
        assert_eq!(atom.disconnect(b), 0);
    }

    #[test]
    fn test_set_value_keeps_old_snapshots_intact() {
        let mut atom = Atom::new(json!([1, 2]));
        let before = Arc::clone(atom.value());
        atom.set_value(json!([1, 2, 3]));
        assert_eq!(*before, json!([1, 2]));
        assert_eq!(**atom.value(), json!([1, 2, 3]));
        assert!(!Arc::ptr_eq(&before, atom.value()));
    }
}
