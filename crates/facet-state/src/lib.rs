//! Fine-grained observable state container addressed by property paths.
//!
//! `facet-state` holds one JSON state tree and lets many clients observe
//! disjoint slices of it. Clients name the slices they care about with
//! dotted selector strings; the store memoizes each distinct selector set
//! and recomputes a composed value only when a mutation actually touches
//! one of its paths.
//!
//! # Core Concepts
//!
//! - **Store**: Owns the state tree, the cache, listeners, and the pristine
//!   snapshot used by reset
//! - **Selector**: Dotted path string (`"user.profile.name"`, `"items[2]"`)
//!   naming one slice; [`FULL_STATE_SELECTOR`] selects the whole tree
//! - **Signature**: A client's selector set, normalized so order, duplicates,
//!   and contained sub-paths don't matter
//! - **Accessor**: One memoized composed value shared by every client with
//!   the same signature
//! - **Atom**: Per-path snapshot cell the accessors draw slices from
//! - **MergeOutcome / MutationOutcome**: Minimal `(changed, replaced)` diff
//!   pair describing exactly what a mutation did
//!
//! # Slice Stability
//!
//! Composed values are [`std::sync::Arc`] snapshots: a client holding one
//! never sees it change underneath, and repeat reads between mutations hand
//! back the very same allocation. `Arc::ptr_eq` is therefore a sound
//! "did my slice change" check.
//!
//! # Quick Start
//!
//! ```
//! use facet_state::{MutationOutcome, Store};
//! use serde_json::json;
//!
//! # fn main() -> facet_state::FacetResult<()> {
//! let store = Store::new(json!({
//!     "user": {"name": "ada", "theme": "dark"},
//!     "cart": {"items": []}
//! }))?;
//!
//! // each client reads only the slices it selected
//! let slice = store.get_state("header", &["user.name"])?;
//! assert_eq!(*slice, json!({"user.name": "ada"}));
//!
//! // mutations are deep merges reporting a minimal diff
//! match store.set_state(json!({"user": {"theme": "light"}}))? {
//!     MutationOutcome::Applied { changed, replaced } => {
//!         assert_eq!(changed, json!({"user": {"theme": "light"}}));
//!         assert_eq!(replaced, json!({"user": {"theme": "dark"}}));
//!     }
//!     outcome => panic!("unexpected outcome: {outcome:?}"),
//! }
//!
//! // untouched slices keep their allocation
//! let again = store.get_state("header", &["user.name"])?;
//! assert!(std::sync::Arc::ptr_eq(&slice, &again));
//! # Ok(())
//! # }
//! ```

mod accessor;
mod atom;
mod cache;
mod error;
mod ids;
mod merge;
mod path;
mod storage;
mod store;

// Core types
pub use accessor::ComposeMode;
pub use atom::Atom;
pub use error::{value_type_name, FacetError, FacetResult};
pub use ids::{AccessorId, IdAllocator};
pub use merge::{merge_state, MergeOutcome};
pub use path::{Path, Seg, Signature, FULL_STATE_SELECTOR, NULL_STATE_SELECTOR};

// Store types
pub use storage::{MemoryStorage, SessionStorage, StorageAdapter};
pub use store::{
    MutationOutcome, Prehooks, ResetStateHook, SetStateHook, Store, StoreBuilder, StoreHandle,
    SubscriptionId,
};

// Re-export serde_json::Value for convenience
pub use serde_json::Value;
