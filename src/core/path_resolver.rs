//! Dotted-path lookup into a data context

use crate::types::Value;

/// Resolve a dot-separated `path` against `root`.
///
/// Returns `None` as soon as a segment cannot be followed: the current value
/// is not a container (null included) or the key is absent. A path that reaches
/// its last segment yields the value found there, which may itself be `Null`.
///
/// Sequences are traversable by numeric index (`items.0.name`).
///
/// ```
/// use royalbit_sheetfill::core::resolve;
/// use royalbit_sheetfill::Value;
///
/// let data = Value::from(serde_json::json!({"user": {"name": "Ana", "email": null}}));
/// assert_eq!(resolve(&data, "user.name"), Some(&Value::from("Ana")));
/// assert_eq!(resolve(&data, "user.email"), Some(&Value::Null));
/// assert_eq!(resolve(&data, "user.phone"), None);
/// ```
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, step)
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Mapping(map) => map.get(segment),
        Value::Sequence(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index)),
        _ => None,
    }
}
