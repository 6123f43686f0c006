//! Deterministic content fingerprints used as cache keys.
//!
//! A fingerprint is the SHA-256 of a canonical JSON rendering: object keys are
//! sorted at every depth, arrays keep their order, no insignificant
//! whitespace. Two inputs that differ only in key order share a fingerprint.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Fingerprint any serializable value.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    Ok(fingerprint_value(&value))
}

/// Fingerprint an already-built JSON value.
#[must_use]
pub fn fingerprint_value(value: &Value) -> String {
    let canonical = canonical_json(value);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Render a JSON value with recursively sorted object keys.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
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
