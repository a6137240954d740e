//! Deep-merge mutation engine with minimal diff capture.
//!
//! [`merge_state`] folds a partial update into the canonical state tree and
//! records two diff trees mirroring only the touched subtree shape:
//! `changed` holds the values applied during the call, `replaced` holds the
//! prior values they displaced. Array diffs are recorded as objects keyed by
//! decimal index strings (`{"0": ..., "3": ...}`).
//!
//! The engine updates and adds but never deletes: keys absent from the
//! incoming update are left alone.

use serde_json::{Map, Value};

/// Diff pair produced by one [`merge_state`] call.
///
/// Both trees are object roots; an empty `changed` object means the merge
/// was a no-op and nothing should be notified.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeOutcome {
    /// Values applied to the state during this call.
    pub changed: Value,
    /// Prior values displaced by the applied changes.
    pub replaced: Value,
}

impl MergeOutcome {
    /// True when the merge left the state untouched.
    #[inline]
    pub fn is_unchanged(&self) -> bool {
        self.changed.as_object().is_none_or(Map::is_empty)
    }
}

/// How an incoming value combines with the value already in its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MergeKind {
    /// Deep-equal; nothing to do.
    Equal,
    /// Array onto array: structural merge with truncation capture.
    ArrayOntoArray,
    /// Index-keyed object onto array: in-place slot patch.
    IndexMapOntoArray,
    /// Object onto object: key-wise recursion.
    ObjectOntoObject,
    /// Anything else: wholesale replacement.
    Replace,
}

fn classify(current: &Value, incoming: &Value) -> MergeKind {
    if current == incoming {
        return MergeKind::Equal;
    }
    match (current, incoming) {
        (Value::Array(_), Value::Array(_)) => MergeKind::ArrayOntoArray,
        (Value::Array(_), Value::Object(map)) if is_index_map(map) => MergeKind::IndexMapOntoArray,
        (Value::Object(_), Value::Object(_)) => MergeKind::ObjectOntoObject,
        _ => MergeKind::Replace,
    }
}

/// True when every key parses as a non-negative integer index. The empty
/// object qualifies and patches nothing.
fn is_index_map(map: &Map<String, Value>) -> bool {
    map.keys().all(|k| k.parse::<usize>().is_ok())
}

/// Per-slot result, telling the caller what to record under the slot's key.
enum SlotOutcome {
    Unchanged,
    Scalar {
        changed: Value,
        replaced: Option<Value>,
    },
    Nested {
        changed: Map<String, Value>,
        replaced: Map<String, Value>,
        prune_empty: bool,
    },
}

/// Merge `incoming` into a slot currently holding `current`, returning the
/// merged value and the diff to record.
///
/// `existed` is false when the slot was created by an array growth step
/// earlier in the same call; such slots never record a `replaced` entry.
fn merge_value(current: Value, incoming: Value, existed: bool) -> (Value, SlotOutcome) {
    match (classify(&current, &incoming), current, incoming) {
        (MergeKind::Equal, current, _) => (current, SlotOutcome::Unchanged),
        (MergeKind::ArrayOntoArray, Value::Array(mut cur), Value::Array(new)) => {
            let (changed, replaced) = merge_array(&mut cur, new);
            (
                Value::Array(cur),
                SlotOutcome::Nested {
                    changed,
                    replaced,
                    prune_empty: false,
                },
            )
        }
        (MergeKind::IndexMapOntoArray, Value::Array(mut cur), Value::Object(new)) => {
            let (changed, replaced) = merge_array_index(&mut cur, new);
            (
                Value::Array(cur),
                SlotOutcome::Nested {
                    changed,
                    replaced,
                    prune_empty: true,
                },
            )
        }
        (MergeKind::ObjectOntoObject, Value::Object(mut cur), Value::Object(new)) => {
            let (changed, replaced) = merge_object(&mut cur, new);
            (
                Value::Object(cur),
                SlotOutcome::Nested {
                    changed,
                    replaced,
                    prune_empty: false,
                },
            )
        }
        (_, current, incoming) => {
            let applied = incoming.clone();
            (
                incoming,
                SlotOutcome::Scalar {
                    changed: applied,
                    replaced: existed.then_some(current),
                },
            )
        }
    }
}

fn record(
    key: String,
    outcome: SlotOutcome,
    changed: &mut Map<String, Value>,
    replaced: &mut Map<String, Value>,
) {
    match outcome {
        SlotOutcome::Unchanged => {}
        SlotOutcome::Scalar {
            changed: applied,
            replaced: prior,
        } => {
            changed.insert(key.clone(), applied);
            if let Some(prior) = prior {
                replaced.insert(key, prior);
            }
        }
        SlotOutcome::Nested {
            changed: nested_changed,
            replaced: nested_replaced,
            prune_empty,
        } => {
            if !(prune_empty && nested_changed.is_empty()) {
                changed.insert(key.clone(), Value::Object(nested_changed));
            }
            if !(prune_empty && nested_replaced.is_empty()) {
                replaced.insert(key, Value::Object(nested_replaced));
            }
        }
    }
}

fn merge_object(
    state: &mut Map<String, Value>,
    incoming: Map<String, Value>,
) -> (Map<String, Value>, Map<String, Value>) {
    let mut changed = Map::new();
    let mut replaced = Map::new();
    for (key, value) in incoming {
        match state.get_mut(&key) {
            Some(slot) => {
                let current = std::mem::take(slot);
                let (merged, outcome) = merge_value(current, value, true);
                *slot = merged;
                record(key, outcome, &mut changed, &mut replaced);
            }
            None => {
                changed.insert(key.clone(), value.clone());
                state.insert(key, value);
            }
        }
    }
    (changed, replaced)
}

fn merge_array(
    state: &mut Vec<Value>,
    incoming: Vec<Value>,
) -> (Map<String, Value>, Map<String, Value>) {
    let mut changed = Map::new();
    let mut replaced = Map::new();
    let new_len = incoming.len();
    if state.len() > new_len {
        // capture removed trailing elements before truncation
        for (offset, prior) in state.drain(new_len..).enumerate() {
            replaced.insert((new_len + offset).to_string(), prior);
        }
    }
    for (index, value) in incoming.into_iter().enumerate() {
        if index < state.len() {
            let current = std::mem::take(&mut state[index]);
            let (merged, outcome) = merge_value(current, value, true);
            state[index] = merged;
            record(index.to_string(), outcome, &mut changed, &mut replaced);
        } else {
            // grown slot: no prior value to displace
            changed.insert(index.to_string(), value.clone());
            state.push(value);
        }
    }
    (changed, replaced)
}

fn merge_array_index(
    state: &mut Vec<Value>,
    incoming: Map<String, Value>,
) -> (Map<String, Value>, Map<String, Value>) {
    let mut changed = Map::new();
    let mut replaced = Map::new();
    let mut entries: Vec<(usize, Value)> = Vec::with_capacity(incoming.len());
    for (key, value) in incoming {
        if let Ok(index) = key.parse::<usize>() {
            entries.push((index, value));
        }
    }
    let prior_len = state.len();
    if let Some(max) = entries.iter().map(|(index, _)| *index).max() {
        // every slot created to reach the highest index is itself a change
        for index in prior_len..=max {
            state.push(Value::Null);
            changed.insert(index.to_string(), Value::Null);
        }
    }
    for (index, value) in entries {
        let existed = index < prior_len;
        let current = std::mem::take(&mut state[index]);
        let (merged, outcome) = merge_value(current, value, existed);
        state[index] = merged;
        record(index.to_string(), outcome, &mut changed, &mut replaced);
    }
    (changed, replaced)
}

/// Fold `new_state` into `state`, recording minimal diffs.
///
/// Per key of `new_state`: deep-equal values are skipped; arrays merge
/// structurally (shrinking records removed trailing elements into
/// `replaced`, growth extends with nulls); an index-keyed object onto an
/// array patches only the referenced slots in place; objects recurse
/// key-wise; everything else replaces wholesale, moving the old value into
/// `replaced`. Keys absent from `new_state` are never touched.
pub fn merge_state(state: &mut Map<String, Value>, new_state: Map<String, Value>) -> MergeOutcome {
    let (changed, replaced) = merge_object(state, new_state);
    MergeOutcome {
        changed: Value::Object(changed),
        replaced: Value::Object(replaced),
    }
}
