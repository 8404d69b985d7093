//! Canonical JSON writer
//!
//! Output is pretty-printed UTF-8 with object keys sorted byte-wise at every
//! nesting level, independent of struct field order or the map type serde_json
//! was built with. Two exports of equal values are byte-identical.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use crate::errors::Result;

/// Serializes a JSON tree with sorted object keys.
struct Sorted<'a>(&'a Value);

impl Serialize for Sorted<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &Sorted(value))?;
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(&Sorted(item))?;
                }
                out.end()
            }
            scalar => scalar.serialize(serializer),
        }
    }
}

/// Render `value` as canonical JSON with `indent` spaces per level and a
/// trailing newline.
pub fn to_canonical_vec<T: Serialize>(value: &T, indent: usize) -> Result<Vec<u8>> {
    // Going through text keeps `f32` fields at their shortest decimal form;
    // float_roundtrip parsing preserves every digit on the way back in.
    let compact = serde_json::to_vec(value)?;
    let tree: Value = serde_json::from_slice(&compact)?;

    let indent = vec![b' '; indent];
    let mut out = Vec::with_capacity(compact.len() * 2);
    {
        let formatter = PrettyFormatter::with_indent(&indent);
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        Sorted(&tree).serialize(&mut serializer)?;
    }
    out.push(b'\n');
    Ok(out)
}

pub fn to_canonical_string<T: Serialize>(value: &T, indent: usize) -> Result<String> {
    let bytes = to_canonical_vec(value, indent)?;
    // serde_json only ever emits UTF-8
    String::from_utf8(bytes).map_err(|e| {
        crate::errors::CalibrationError::Encoding(format!("non UTF-8 JSON output: {}", e))
    })
}
