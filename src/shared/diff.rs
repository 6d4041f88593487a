/**
 * Structural Differ
 *
 * Recursive comparison of two JSON values producing an added / removed /
 * changed tree.
 *
 * # Rules
 *
 * - Objects are compared key by key over the union of both key sets.
 * - A key only in `current` is `Added`, a key only in `previous` is `Removed`.
 * - Keys present on both sides recurse when both values are objects;
 *   everything else (scalars, arrays, nulls, mixed kinds) is compared by deep
 *   equality and yields `Changed` on mismatch.
 * - Arrays are atomic: one differing element marks the whole array `Changed`.
 *
 * A `Nested` node is only ever built with at least one child. Two equal
 * inputs produce `None`, never an empty `Nested`.
 */
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One node of a structural diff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiffNode {
    /// Present in the current value only
    Added { value: Value },
    /// Present in the previous value only
    Removed { value: Value },
    /// Present on both sides with different leaf or array values
    Changed { previous: Value, current: Value },
    /// Object whose children differ; never empty
    Nested { children: BTreeMap<String, DiffNode> },
}

impl DiffNode {
    /// Children of a `Nested` node, if this is one
    pub fn children(&self) -> Option<&BTreeMap<String, DiffNode>> {
        match self {
            Self::Nested { children } => Some(children),
            _ => None,
        }
    }

    /// Look up the child diff for `key` in a `Nested` node
    pub fn get(&self, key: &str) -> Option<&DiffNode> {
        self.children().and_then(|children| children.get(key))
    }

    /// Serialize into the JSON shape used in emitted event properties
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Diff two JSON values.
///
/// Returns `None` when the values do not differ.
pub fn diff(previous: &Value, current: &Value) -> Option<DiffNode> {
    match (previous, current) {
        (Value::Object(previous), Value::Object(current)) => diff_objects(previous, current),
        _ if previous == current => None,
        _ => Some(DiffNode::Changed {
            previous: previous.clone(),
            current: current.clone(),
        }),
    }
}

/// Diff two optional payloads, treating absence as its own state.
///
/// `None -> Some` is `Added`, `Some -> None` is `Removed`.
pub fn diff_optional(previous: Option<&Value>, current: Option<&Value>) -> Option<DiffNode> {
    match (previous, current) {
        (None, None) => None,
        (None, Some(current)) => Some(DiffNode::Added {
            value: current.clone(),
        }),
        (Some(previous), None) => Some(DiffNode::Removed {
            value: previous.clone(),
        }),
        (Some(previous), Some(current)) => diff(previous, current),
    }
}

fn diff_objects(previous: &Map<String, Value>, current: &Map<String, Value>) -> Option<DiffNode> {
    let mut children = BTreeMap::new();

    for (key, previous_value) in previous {
        let node = match current.get(key) {
            Some(current_value) => diff(previous_value, current_value),
            None => Some(DiffNode::Removed {
                value: previous_value.clone(),
            }),
        };
        if let Some(node) = node {
            children.insert(key.clone(), node);
        }
    }

    for (key, current_value) in current {
        if !previous.contains_key(key) {
            children.insert(
                key.clone(),
                DiffNode::Added {
                    value: current_value.clone(),
                },
            );
        }
    }

    if children.is_empty() {
        None
    } else {
        Some(DiffNode::Nested { children })
    }
}
