use serde_json::Value;

/// The operation slots a path item may carry, in specification order. A single
/// table instead of one match arm per method keeps every method-indexed lookup
/// in the crate on the same footing.
pub(crate) const METHOD_SLOTS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Looks up the operation for an HTTP method on a path item.
///
/// Returns `None` both for unknown methods and for methods the path item does
/// not declare; callers distinguish the two with [`is_known_method`].
pub(crate) fn operation_for_method<'a>(path_item: &'a Value, method: &str) -> Option<&'a Value> {
    let slot = method.to_lowercase();
    METHOD_SLOTS
        .iter()
        .find(|candidate| **candidate == slot)
        .and_then(|slot| path_item.get(*slot))
}

pub(crate) fn is_known_method(method: &str) -> bool {
    let slot = method.to_lowercase();
    METHOD_SLOTS.contains(&slot.as_str())
}
