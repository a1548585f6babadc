//! Canonical content hashing for lockfile entries.
//!
//! Objects are serialized with keys sorted, arrays in order, no whitespace;
//! the SHA-256 of that string is written as `sha256-<hex>`. The hash does not
//! depend on key order but does depend on every value and on array order.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::definition::Definition;
use crate::error::Result;

pub const INTEGRITY_PREFIX: &str = "sha256-";

/// Serialize `value` canonically.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
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
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// `sha256-<hex>` of the canonical form of `value`.
pub fn integrity_of(value: &Value) -> String {
    let digest = Sha256::digest(canonicalize(value).as_bytes());
    format!("{INTEGRITY_PREFIX}{digest:x}")
}

pub fn calculate_integrity(definition: &Definition) -> Result<String> {
    Ok(integrity_of(&definition.to_value()?))
}

pub fn verify_integrity(definition: &Definition, expected: &str) -> Result<bool> {
    Ok(calculate_integrity(definition)?.eq_ignore_ascii_case(expected.trim()))
}
