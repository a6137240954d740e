//! Store façade: construction, mutation, subscription, reset.
//!
//! A [`Store`] owns the canonical state tree, the accessor cache, the
//! listener registry, and a storage adapter holding the pristine snapshot
//! taken at construction. Every mutation funnels through one merge, and the
//! cache is always invalidated before any external listener runs, so a
//! listener reading state mid-notification sees post-mutation values.
//!
//! # Examples
//!
//! ```
//! use facet_state::{MutationOutcome, Store};
//! use serde_json::json;
//!
//! # fn main() -> facet_state::FacetResult<()> {
//! let store = Store::new(json!({"user": {"name": "ada"}, "count": 0}))?;
//!
//! let slice = store.get_state("client-1", &["user.name"])?;
//! assert_eq!(slice["user.name"], json!("ada"));
//!
//! match store.set_state(json!({"count": 1}))? {
//!     MutationOutcome::Applied { changed, .. } => {
//!         assert_eq!(changed, json!({"count": 1}));
//!     }
//!     outcome => panic!("unexpected outcome: {outcome:?}"),
//! }
//! # Ok(())
//! # }
//! ```

use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::accessor::ComposeMode;
use crate::cache::AccessorCache;
use crate::error::{value_type_name, FacetError, FacetResult};
use crate::merge::merge_state;
use crate::storage::{MemoryStorage, StorageAdapter};

/// Hook run against an incoming `set_state` payload before the merge.
///
/// May rewrite the payload in place. Returning `false` vetoes the mutation.
pub type SetStateHook = Box<dyn Fn(&mut Map<String, Value>) -> bool>;

/// Hook run before a reset, given `(current, pristine)` state snapshots.
/// Returning `false` vetoes the reset.
pub type ResetStateHook = Box<dyn Fn(&Value, &Value) -> bool>;

/// Optional mutation gates installed at construction.
#[derive(Default)]
pub struct Prehooks {
    set_state: Option<SetStateHook>,
    reset_state: Option<ResetStateHook>,
}

impl Prehooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a gate for [`Store::set_state`].
    pub fn on_set_state(mut self, hook: impl Fn(&mut Map<String, Value>) -> bool + 'static) -> Self {
        self.set_state = Some(Box::new(hook));
        self
    }

    /// Install a gate for [`Store::reset_state`].
    pub fn on_reset_state(mut self, hook: impl Fn(&Value, &Value) -> bool + 'static) -> Self {
        self.reset_state = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for Prehooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prehooks")
            .field("set_state", &self.set_state.is_some())
            .field("reset_state", &self.reset_state.is_some())
            .finish()
    }
}

/// What a mutating call did.
#[derive(Clone, Debug, PartialEq)]
pub enum MutationOutcome {
    /// The state changed; both diff trees mirror the touched subtree shape.
    Applied {
        /// Values applied during this call.
        changed: Value,
        /// Prior values the applied changes displaced.
        replaced: Value,
    },
    /// The payload was a deep no-op. No listener was notified.
    Unchanged,
    /// A prehook vetoed the mutation before the merge ran.
    Rejected,
}

/// Token returned by [`Store::subscribe`], redeemable for removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Listener = Rc<dyn Fn(&Value, &Value)>;

struct StoreInner {
    state: RefCell<Map<String, Value>>,
    cache: RefCell<AccessorCache>,
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
    prehooks: Prehooks,
    storage: RefCell<Box<dyn StorageAdapter>>,
    session_key: String,
    next_subscription: Cell<u64>,
}

impl fmt::Debug for StoreInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreInner")
            .field("session_key", &self.session_key)
            .field("listeners", &self.listeners.borrow().len())
            .finish_non_exhaustive()
    }
}

impl StoreInner {
    fn get_state<S: AsRef<str>>(&self, client_id: &str, selectors: &[S]) -> FacetResult<Arc<Value>> {
        let state = self.state.borrow();
        self.cache.borrow_mut().get(&state, client_id, selectors)
    }

    /// Merge `changes`, invalidate the cache, then notify listeners.
    ///
    /// All interior borrows are released before listeners run, so a
    /// listener may re-enter any store operation.
    fn apply(&self, changes: Map<String, Value>) -> MutationOutcome {
        let outcome = {
            let mut state = self.state.borrow_mut();
            let outcome = merge_state(&mut state, changes);
            if outcome.is_unchanged() {
                return MutationOutcome::Unchanged;
            }
            self.cache.borrow_mut().watch_source(&state, &outcome.changed);
            outcome
        };
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&outcome.changed, &outcome.replaced);
        }
        MutationOutcome::Applied {
            changed: outcome.changed,
            replaced: outcome.replaced,
        }
    }

    fn set_state(&self, changes: Value) -> FacetResult<MutationOutcome> {
        let Value::Object(mut changes) = changes else {
            return Err(FacetError::invalid_state_shape(value_type_name(&changes)));
        };
        if let Some(hook) = &self.prehooks.set_state {
            // rejection is a sanctioned outcome, not an error and not logged
            if !hook(&mut changes) {
                return Ok(MutationOutcome::Rejected);
            }
        }
        Ok(self.apply(changes))
    }

    fn reset_state(&self) -> FacetResult<MutationOutcome> {
        let snapshot = self.storage.borrow().get_item(&self.session_key);
        let pristine = match snapshot {
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(FacetError::invalid_state_shape(value_type_name(&other)));
            }
            None => {
                warn!(session_key = %self.session_key, "no pristine snapshot to reset to");
                return Ok(MutationOutcome::Unchanged);
            }
        };
        if let Some(hook) = &self.prehooks.reset_state {
            let current = Value::Object(self.state.borrow().clone());
            let original = Value::Object(pristine.clone());
            if !hook(&current, &original) {
                return Ok(MutationOutcome::Rejected);
            }
        }
        Ok(self.apply(pristine))
    }

    fn subscribe(&self, listener: impl Fn(&Value, &Value) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(held, _)| *held != id);
        listeners.len() != before
    }

    fn unlink_client(&self, client_id: &str) {
        self.cache.borrow_mut().unlink_client(client_id);
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        self.storage.borrow_mut().remove_item(&self.session_key);
    }
}

/// Observable state container addressed by property-path selectors.
///
/// Construct with [`Store::new`] for defaults or [`Store::builder`] to
/// install prehooks, pick a compose mode, or swap the storage adapter.
#[derive(Debug)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Store {
    /// Build a store over `initial` with default configuration.
    ///
    /// Fails with [`FacetError::InvalidStateShape`] unless `initial` is an
    /// object.
    pub fn new(initial: Value) -> FacetResult<Self> {
        Self::builder().build(initial)
    }

    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// Compose the slices selected by `selectors` for `client_id`.
    ///
    /// Identical selector sets share one memoized value; repeat calls
    /// between mutations hand back the same allocation.
    pub fn get_state<S: AsRef<str>>(
        &self,
        client_id: &str,
        selectors: &[S],
    ) -> FacetResult<Arc<Value>> {
        self.inner.get_state(client_id, selectors)
    }

    /// Deep-merge `changes` into the state.
    ///
    /// Updates and adds but never deletes. Listeners run only when the
    /// merge actually changed something, after the cache has been
    /// invalidated.
    pub fn set_state(&self, changes: Value) -> FacetResult<MutationOutcome> {
        self.inner.set_state(changes)
    }

    /// Merge the pristine construction-time snapshot back over the state.
    ///
    /// Keys added since construction survive; the reset is a merge, not a
    /// wholesale replacement.
    pub fn reset_state(&self) -> FacetResult<MutationOutcome> {
        self.inner.reset_state()
    }

    /// Register `listener` to run after every applied mutation with the
    /// `(changed, replaced)` diff pair.
    pub fn subscribe(&self, listener: impl Fn(&Value, &Value) + 'static) -> SubscriptionId {
        self.inner.subscribe(listener)
    }

    /// Remove a listener, reporting whether one was actually registered
    /// under `id`.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe(id)
    }

    /// Drop every accessor registration held by `client_id`, releasing
    /// cache entries nothing else keeps alive.
    pub fn unlink_client(&self, client_id: &str) {
        self.inner.unlink_client(client_id)
    }

    /// A weak handle usable after the store itself is dropped, at which
    /// point its operations fail with [`FacetError::DetachedStore`].
    pub fn handle(&self) -> StoreHandle {
        StoreHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// Configuration for [`Store`] construction.
#[derive(Debug, Default)]
pub struct StoreBuilder {
    prehooks: Prehooks,
    mode: ComposeMode,
    storage: Option<Box<dyn StorageAdapter>>,
}

impl StoreBuilder {
    pub fn prehooks(mut self, prehooks: Prehooks) -> Self {
        self.prehooks = prehooks;
        self
    }

    pub fn compose_mode(mut self, mode: ComposeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn storage(mut self, storage: impl StorageAdapter + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    /// Validate `initial`, snapshot it into storage under a fresh session
    /// key, and assemble the store.
    pub fn build(self, initial: Value) -> FacetResult<Store> {
        let Value::Object(state) = initial else {
            return Err(FacetError::invalid_state_shape(value_type_name(&initial)));
        };
        let mut storage = self
            .storage
            .unwrap_or_else(|| Box::new(MemoryStorage::new()));
        let session_key = format!("facet:{}", Uuid::new_v4());
        storage.set_item(&session_key, &Value::Object(state.clone()));
        debug!(session_key = %session_key, "store created");
        Ok(Store {
            inner: Rc::new(StoreInner {
                state: RefCell::new(state),
                cache: RefCell::new(AccessorCache::new(self.mode)),
                listeners: RefCell::new(Vec::new()),
                prehooks: self.prehooks,
                storage: RefCell::new(storage),
                session_key,
                next_subscription: Cell::new(0),
            }),
        })
    }
}

/// Weak reference to a [`Store`].
///
/// Handles are cheap to clone and hand out; they never keep the store
/// alive. Every operation upgrades first and fails with
/// [`FacetError::DetachedStore`] once the store is gone.
#[derive(Clone, Debug)]
pub struct StoreHandle {
    inner: Weak<StoreInner>,
}

impl StoreHandle {
    fn upgrade(&self) -> FacetResult<Rc<StoreInner>> {
        self.inner.upgrade().ok_or(FacetError::DetachedStore)
    }

    /// Whether the owning store is still alive.
    pub fn is_attached(&self) -> bool {
        self.inner.strong_count() > 0
    }

    pub fn get_state<S: AsRef<str>>(
        &self,
        client_id: &str,
        selectors: &[S],
    ) -> FacetResult<Arc<Value>> {
        self.upgrade()?.get_state(client_id, selectors)
    }

    pub fn set_state(&self, changes: Value) -> FacetResult<MutationOutcome> {
        self.upgrade()?.set_state(changes)
    }

    pub fn reset_state(&self) -> FacetResult<MutationOutcome> {
        self.upgrade()?.reset_state()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&Value, &Value) + 'static,
    ) -> FacetResult<SubscriptionId> {
        Ok(self.upgrade()?.subscribe(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> FacetResult<bool> {
        Ok(self.upgrade()?.unsubscribe(id))
    }

    pub fn unlink_client(&self, client_id: &str) -> FacetResult<()> {
        self.upgrade()?.unlink_client(client_id);
        Ok(())
    }
}
