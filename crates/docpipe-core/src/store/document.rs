//! Dotted-path access and value comparison on JSON documents.
//!
//! Paths traverse sub-documents; when a segment meets an array, the rest of the
//! path is applied to every element (a numeric segment also indexes the array).

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// Collect every value reachable at `path`.
///
/// An empty result means the path is missing.
pub fn get_path<'a>(doc: &'a Map<String, Value>, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    collect_in_map(doc, &segments, &mut out);
    out
}

fn collect_in_map<'a>(map: &'a Map<String, Value>, segments: &[&str], out: &mut Vec<&'a Value>) {
    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = map.get(*head) {
            collect_in_value(value, rest, out);
        }
    }
}

fn collect_in_value<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    if segments.is_empty() {
        out.push(value);
        return;
    }
    match value {
        Value::Object(map) => collect_in_map(map, segments, out),
        Value::Array(items) => {
            if let Ok(index) = segments[0].parse::<usize>() {
                if let Some(item) = items.get(index) {
                    collect_in_value(item, &segments[1..], out);
                }
            }
            for item in items {
                if let Value::Object(map) = item {
                    collect_in_map(map, segments, out);
                }
            }
        }
        _ => {}
    }
}

/// Remove the field at `path`, from every array element along the way.
pub fn unset_path(doc: &mut Map<String, Value>, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    unset_in_map(doc, &segments);
}

fn unset_in_map(map: &mut Map<String, Value>, segments: &[&str]) {
    match segments {
        [] => {}
        [last] => {
            map.remove(*last);
        }
        [head, rest @ ..] => {
            if let Some(child) = map.get_mut(*head) {
                unset_in_value(child, rest);
            }
        }
    }
}

fn unset_in_value(value: &mut Value, segments: &[&str]) {
    match value {
        Value::Object(map) => unset_in_map(map, segments),
        Value::Array(items) => {
            for item in items {
                unset_in_value(item, segments);
            }
        }
        _ => {}
    }
}

/// Set the field at `path`, creating intermediate sub-documents.
///
/// Arrays along the path receive the value in every element.
pub fn set_path(doc: &mut Map<String, Value>, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    set_in_map(doc, &segments, value);
}

fn set_in_map(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            map.insert(last.to_string(), value);
        }
        [head, rest @ ..] => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_in_value(child, rest, value);
        }
    }
}

fn set_in_value(target: &mut Value, segments: &[&str], value: Value) {
    match target {
        Value::Object(map) => set_in_map(map, segments, value),
        Value::Array(items) => {
            for item in items {
                set_in_value(item, segments, value.clone());
            }
        }
        other => {
            let mut map = Map::new();
            set_in_map(&mut map, segments, value);
            *other = Value::Object(map);
        }
    }
}

/// Check if a value is an extended-JSON ObjectId (`{"$oid": "<hex>"}`).
pub(crate) fn as_object_id(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get("$oid").and_then(Value::as_str),
        _ => None,
    }
}

/// Check two values for equality. Numbers compare by value regardless of representation.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            if let (Some(x), Some(y)) = (as_object_id(a), as_object_id(b)) {
                return x.eq_ignore_ascii_case(y);
            }
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map_or(false, |w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Order two values of the same kind. Values of different kinds are incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => match (as_object_id(a), as_object_id(b)) {
            (Some(x), Some(y)) => Some(x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase())),
            _ => None,
        },
    }
}

/// Rank of a value's kind in sort order.
fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) if as_object_id(value).is_some() => 5,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 6,
    }
}

/// Total order used by `$sort`. Missing values sort with null.
pub(crate) fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    kind_rank(a)
        .cmp(&kind_rank(b))
        .then_with(|| compare_values(a, b).unwrap_or(Ordering::Equal))
}

/// A hashable key under which equal values collide, used for join lookups.
pub(crate) fn join_key(value: &Value) -> String {
    if let Some(oid) = as_object_id(value) {
        return format!("oid:{}", oid.to_ascii_lowercase());
    }
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => format!("num:{}", i),
            None => format!("num:{}", n.as_f64().unwrap_or(f64::NAN)),
        },
        other => format!("json:{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_get_path_through_arrays() {
        let d = doc(json!({
            "a": {"b": 1},
            "items": [{"sku": "x"}, {"sku": "y"}, {"other": 1}],
            "tags": ["t1", "t2"],
        }));

        assert_eq!(get_path(&d, "a.b"), vec![&json!(1)]);
        assert_eq!(get_path(&d, "items.sku"), vec![&json!("x"), &json!("y")]);
        assert_eq!(get_path(&d, "items.1.sku"), vec![&json!("y")]);
        assert_eq!(get_path(&d, "tags"), vec![&json!(["t1", "t2"])]);
        assert!(get_path(&d, "a.c").is_empty());
        assert!(get_path(&d, "missing").is_empty());
    }

    #[test]
    fn test_unset_path_per_element() {
        let mut d = doc(json!({
            "secret": 1,
            "group": [{"name": "a", "code": 1}, {"name": "b", "code": 2}],
            "owner": {"name": "c", "code": 3},
        }));

        unset_path(&mut d, "secret");
        unset_path(&mut d, "group.code");
        unset_path(&mut d, "owner.code");
        unset_path(&mut d, "nothing.here");

        assert_eq!(
            Value::Object(d),
            json!({
                "group": [{"name": "a"}, {"name": "b"}],
                "owner": {"name": "c"},
            })
        );
    }

    #[test]
    fn test_set_path_creates_parents() {
        let mut d = doc(json!({"a": 1}));
        set_path(&mut d, "b.c", json!(true));
        set_path(&mut d, "a.x", json!(2));
        assert_eq!(Value::Object(d), json!({"a": {"x": 2}, "b": {"c": true}}));
    }

    #[test]
    fn test_values_equal() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!(1), &json!("1")));
        assert!(values_equal(
            &json!({"$oid": "65A1F0C2B3D4E5F601234567"}),
            &json!({"$oid": "65a1f0c2b3d4e5f601234567"})
        ));
        assert!(values_equal(&json!([1, {"a": 2}]), &json!([1.0, {"a": 2}])));
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!("1"), &json!(1)), None);
    }

    #[test]
    fn test_sort_order_missing_first() {
        assert_eq!(sort_order(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(sort_order(Some(&json!("a")), Some(&json!(1))), Ordering::Greater);
    }

    #[test]
    fn test_join_key() {
        assert_eq!(join_key(&json!(1)), join_key(&json!(1)));
        assert_eq!(
            join_key(&json!({"$oid": "AB"})),
            join_key(&json!({"$oid": "ab"}))
        );
        assert_ne!(join_key(&json!(1)), join_key(&json!("1")));
    }
}
