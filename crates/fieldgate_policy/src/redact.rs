//! Field projection: keep only allowed keys of an instance.

use fieldgate_core::FieldSet;
use serde_json::{Map, Value};

/// Keep the allowed keys of `instance`, in the instance's own key order.
///
/// Keys outside `allowed` are dropped silently, and allowed fields the
/// instance lacks are not added. A non-object instance projects to `{}`.
#[must_use]
pub fn project(instance: Value, allowed: &FieldSet) -> Value {
    match instance {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| allowed.contains(key))
                .collect(),
        ),
        _ => Value::Object(Map::new()),
    }
}

/// Whether a projected value carries no fields
#[must_use]
pub fn is_empty_projection(value: &Value) -> bool {
    value.as_object().is_some_and(Map::is_empty)
}
