//! Key-case conversion at the HTTP boundary.
//!
//! Documents are stored with snake_case keys; clients speak camelCase. Incoming
//! bodies and query keys pass through [`keys_to_snake`] / [`snake_path`], outgoing
//! documents through [`keys_to_camel`].

use heck::{ToLowerCamelCase, ToSnakeCase};
use serde_json::{Map, Value};

/// Convert one key to snake_case.
///
/// `rating_average` is a common client typo for `ratings_average` and is corrected.
pub fn snake_key(key: &str) -> String {
    let converted = key.to_snake_case();
    if converted == "rating_average" {
        tracing::debug!(key, "correcting rating_average to ratings_average");
        return "ratings_average".to_string();
    }
    converted
}

/// Convert a dotted path (`startLocation.address`) segment by segment.
pub fn snake_path(path: &str) -> String {
    path.split('.').map(snake_key).collect::<Vec<_>>().join(".")
}

pub fn camel_key(key: &str) -> String {
    key.to_lower_camel_case()
}

/// Recursively rewrite object keys to snake_case.
pub fn keys_to_snake(value: Value) -> Value {
    rewrite_keys(value, &snake_key)
}

/// Recursively rewrite object keys to camelCase.
pub fn keys_to_camel(value: Value) -> Value {
    rewrite_keys(value, &camel_key)
}

fn rewrite_keys(value: Value, convert: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (convert(&k), rewrite_keys(v, convert)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| rewrite_keys(v, convert)).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_keys_become_snake_case() {
        let body = json!({
            "maxGroupSize": 10,
            "startLocation": { "coordinates": [1.0, 2.0] },
            "locations": [{ "day": 1, "description": "x" }],
        });
        let out = keys_to_snake(body);
        assert_eq!(out["max_group_size"], 10);
        assert!(out["start_location"]["coordinates"].is_array());
        assert_eq!(out["locations"][0]["day"], 1);
    }

    #[test]
    fn rating_average_is_corrected() {
        assert_eq!(snake_key("ratingAverage"), "ratings_average");
        assert_eq!(snake_key("ratingsAverage"), "ratings_average");
    }

    #[test]
    fn dotted_paths_keep_their_separators() {
        assert_eq!(snake_path("startLocation.address"), "start_location.address");
    }

    #[test]
    fn outgoing_keys_become_camel_case() {
        let doc = json!({ "ratings_quantity": 3, "image_cover": "a.jpg", "id": "x" });
        let out = keys_to_camel(doc);
        assert_eq!(out["ratingsQuantity"], 3);
        assert_eq!(out["imageCover"], "a.jpg");
        assert_eq!(out["id"], "x");
    }
}
