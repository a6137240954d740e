//! Integration tests for mutation diff semantics through the store API.
//!
//! Every `set_state` reports exactly what it did as a `(changed, replaced)`
//! pair mirroring the touched subtree shape. These tests pin the shapes a
//! consumer can rely on.

use facet_state::{MutationOutcome, Store};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn applied(store: &Store, payload: Value) -> (Value, Value) {
    match store.set_state(payload).expect("object payload") {
        MutationOutcome::Applied { changed, replaced } => (changed, replaced),
        outcome => panic!("expected Applied, got {outcome:?}"),
    }
}

// ============================================================================
// Object merges
// ============================================================================

#[test]
fn test_partial_update_reports_only_touched_keys() {
    let store = Store::new(json!({"a": 1, "b": 2, "c": 3})).unwrap();
    let (changed, replaced) = applied(&store, json!({"a": 1, "b": 20}));
    assert_eq!(changed, json!({"b": 20}));
    assert_eq!(replaced, json!({"b": 2}));
}

#[test]
fn test_nested_update_mirrors_subtree_shape() {
    let store = Store::new(json!({
        "user": {"profile": {"name": "ada", "theme": "dark"}, "visits": 1}
    }))
    .unwrap();
    let (changed, replaced) = applied(&store, json!({"user": {"profile": {"theme": "light"}}}));
    assert_eq!(changed, json!({"user": {"profile": {"theme": "light"}}}));
    assert_eq!(replaced, json!({"user": {"profile": {"theme": "dark"}}}));
}

#[test]
fn test_new_key_appears_in_changed_only() {
    let store = Store::new(json!({"a": 1})).unwrap();
    let (changed, replaced) = applied(&store, json!({"b": {"c": true}}));
    assert_eq!(changed, json!({"b": {"c": true}}));
    assert_eq!(replaced, json!({}));
}

#[test]
fn test_merge_never_deletes_absent_keys() {
    let store = Store::new(json!({"keep": "me", "nested": {"keep": 1, "set": 2}})).unwrap();
    applied(&store, json!({"nested": {"set": 3}}));

    let slice = store.get_state("check", &["keep", "nested.keep"]).unwrap();
    assert_eq!(*slice, json!({"keep": "me", "nested.keep": 1}));
}

#[test]
fn test_deep_equal_payload_is_unchanged() {
    let store = Store::new(json!({"a": {"b": [1, 2]}, "c": "x"})).unwrap();
    let outcome = store.set_state(json!({"a": {"b": [1, 2]}})).unwrap();
    assert_eq!(outcome, MutationOutcome::Unchanged);
}

#[test]
fn test_type_change_replaces_wholesale() {
    let store = Store::new(json!({"value": {"deep": [1, 2]}})).unwrap();
    let (changed, replaced) = applied(&store, json!({"value": 9}));
    assert_eq!(changed, json!({"value": 9}));
    assert_eq!(replaced, json!({"value": {"deep": [1, 2]}}));
}

// ============================================================================
// Array merges
// ============================================================================

#[test]
fn test_shorter_array_truncates_and_captures_tail() {
    let store = Store::new(json!({"list": [{"id": 0}, {"id": 1}, {"id": 2}]})).unwrap();
    let (changed, replaced) = applied(&store, json!({"list": [{"id": 2}]}));
    assert_eq!(changed, json!({"list": {"0": {"id": 2}}}));
    assert_eq!(
        replaced,
        json!({"list": {"0": {"id": 0}, "1": {"id": 1}, "2": {"id": 2}}})
    );

    let slice = store.get_state("check", &["list"]).unwrap();
    assert_eq!(*slice, json!({"list": [{"id": 2}]}));
}

#[test]
fn test_pure_truncation_is_still_a_change() {
    let store = Store::new(json!({"list": [1, 2, 3]})).unwrap();
    let (changed, replaced) = applied(&store, json!({"list": [1, 2]}));
    // nothing surviving changed, but the call did mutate state
    assert_eq!(changed, json!({"list": {}}));
    assert_eq!(replaced, json!({"list": {"2": 3}}));
}

#[test]
fn test_longer_array_grows_without_replacements() {
    let store = Store::new(json!({"list": [1]})).unwrap();
    let (changed, replaced) = applied(&store, json!({"list": [1, 2, 3]}));
    assert_eq!(changed, json!({"list": {"1": 2, "2": 3}}));
    assert_eq!(replaced, json!({"list": {}}));
}

#[test]
fn test_index_map_patches_slots_in_place() {
    let store = Store::new(json!({"list": ["a", "b", "c"]})).unwrap();
    let (changed, replaced) = applied(&store, json!({"list": {"1": "B"}}));
    assert_eq!(changed, json!({"list": {"1": "B"}}));
    assert_eq!(replaced, json!({"list": {"1": "b"}}));

    let slice = store.get_state("check", &["list"]).unwrap();
    assert_eq!(*slice, json!({"list": ["a", "B", "c"]}));
}

#[test]
fn test_index_map_growth_pads_with_nulls() {
    let store = Store::new(json!({"list": ["a"]})).unwrap();
    let (changed, replaced) = applied(&store, json!({"list": {"3": "d"}}));
    assert_eq!(changed, json!({"list": {"1": null, "2": null, "3": "d"}}));
    assert_eq!(replaced, json!({}));

    let slice = store.get_state("check", &["list"]).unwrap();
    assert_eq!(*slice, json!({"list": ["a", null, null, "d"]}));
}

#[test]
fn test_index_map_noop_patch_is_unchanged() {
    let store = Store::new(json!({"list": ["a", "b"]})).unwrap();
    let outcome = store.set_state(json!({"list": {"0": "a"}})).unwrap();
    assert_eq!(outcome, MutationOutcome::Unchanged);
}

// ============================================================================
// Sequencing
// ============================================================================

#[test]
fn test_consecutive_mutations_report_independent_diffs() {
    let store = Store::new(json!({"count": 0})).unwrap();
    let (changed_a, replaced_a) = applied(&store, json!({"count": 1}));
    let (changed_b, replaced_b) = applied(&store, json!({"count": 2}));
    assert_eq!((changed_a, replaced_a), (json!({"count": 1}), json!({"count": 0})));
    assert_eq!((changed_b, replaced_b), (json!({"count": 2}), json!({"count": 1})));
}
