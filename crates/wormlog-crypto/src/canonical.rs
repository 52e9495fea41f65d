//! Canonical JSON rendering.
//!
//! The content hash is compared across independent verification runs, so
//! the byte form of an entry must not depend on field declaration order,
//! map iteration order, or number formatting quirks. Rules:
//!
//! 1. Object members are sorted by key (byte order).
//! 2. Absent members never reach this layer: `Option::None` fields are
//!    skipped during serialization, while an explicit JSON `null` is kept.
//! 3. Arrays preserve their order.
//! 4. No insignificant whitespace.
//! 5. Floats with no fractional part are rendered as integers.

use serde_json::{Number, Value};

/// Top-level member excluded from the signed payload.
const SIGNATURE_FIELD: &str = "sig";

/// Render `value` canonically.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Canonical payload of an entry: the entry without its `sig` member.
pub fn canonical_entry_payload(entry: &Value) -> String {
    match entry {
        Value::Object(map) if map.contains_key(SIGNATURE_FIELD) => {
            let mut unsigned = map.clone();
            unsigned.remove(SIGNATURE_FIELD);
            canonicalize(&Value::Object(unsigned))
        }
        other => canonicalize(other),
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => out.push_str(&value.to_string()),
        Value::Number(n) => out.push_str(&canonical_number(n)),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut members: Vec<(&String, &Value)> = map.iter().collect();
            members.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push('{');
            for (i, (key, member)) in members.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(member, out);
            }
            out.push('}');
        }
    }
}

// 2^53: beyond this an f64 no longer represents every integer exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

fn canonical_number(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn object_members_are_sorted() {
        let value = json!({"b": 1, "a": 2, "c": {"z": true, "y": null}});
        assert_eq!(canonicalize(&value), r#"{"a":2,"b":1,"c":{"y":null,"z":true}}"#);
    }

    #[test]
    fn arrays_keep_order() {
        let value = json!([3, {"b": 1, "a": 0}, "x"]);
        assert_eq!(canonicalize(&value), r#"[3,{"a":0,"b":1},"x"]"#);
    }

    #[test]
    fn strings_are_json_escaped() {
        let value = json!({"q": "say \"hi\"\n"});
        assert_eq!(canonicalize(&value), r#"{"q":"say \"hi\"\n"}"#);
    }

    #[test]
    fn integral_floats_render_as_integers() {
        let value = json!({"n": 3.0, "m": 2.5});
        assert_eq!(canonicalize(&value), r#"{"m":2.5,"n":3}"#);
    }

    #[test]
    fn entry_payload_drops_signature_only_at_top_level() {
        let value = json!({
            "actor": "a",
            "sig": {"prev_hash": null, "hmac": "x"},
            "nested": {"sig": 1}
        });
        assert_eq!(
            canonical_entry_payload(&value),
            r#"{"actor":"a","nested":{"sig":1}}"#
        );
    }

    proptest! {
        #[test]
        fn insertion_order_does_not_matter(
            pairs in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..16)
        ) {
            let mut forward = serde_json::Map::new();
            for (k, v) in pairs.iter() {
                forward.insert(k.clone(), json!(v));
            }
            let mut reverse = serde_json::Map::new();
            for (k, v) in pairs.iter().rev() {
                reverse.insert(k.clone(), json!(v));
            }
            prop_assert_eq!(
                canonicalize(&Value::Object(forward)),
                canonicalize(&Value::Object(reverse))
            );
        }
    }
}
