//! Property list codec.
//!
//! Parses binary or XML property lists into [`plist::Value`] and writes them
//! back out as XML, optionally with every dictionary's keys sorted so two
//! documents can be compared line by line.

use crate::{Error, Result};
use plist::{Dictionary, Value};
use std::io::Cursor;

/// Parse a binary or XML property list.
///
/// The format is detected from the bytes themselves.
///
/// # Errors
///
/// Returns [`Error::MalformedPlist`] if the bytes are neither format.
pub fn parse(bytes: &[u8]) -> Result<Value> {
    Value::from_reader(Cursor::new(bytes)).map_err(|e| Error::MalformedPlist(e.to_string()))
}

/// Serialize a value as an XML property list.
///
/// With `sort_keys`, every nested dictionary is written in key order.
/// Otherwise dictionaries keep their insertion order.
pub fn serialize(value: &Value, sort_keys: bool) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    if sort_keys {
        self::sort_keys(value.clone()).to_writer_xml(&mut buf)?;
    } else {
        value.to_writer_xml(&mut buf)?;
    }
    buf.push(b'\n');
    Ok(buf)
}

/// Recursively reorder dictionary keys.
///
/// Arrays keep their element order; only the dictionaries inside them are
/// reordered.
pub fn sort_keys(value: Value) -> Value {
    match value {
        Value::Dictionary(dict) => Value::Dictionary(sort_dictionary(dict)),
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// [`sort_keys`] for a bare dictionary.
pub fn sort_dictionary(dict: Dictionary) -> Dictionary {
    let mut entries: Vec<(String, Value)> = dict.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    entries
        .into_iter()
        .map(|(key, value)| (key, sort_keys(value)))
        .collect()
}

/// Whether the bytes look like an XML plist rather than a binary one.
pub fn is_xml(bytes: &[u8]) -> bool {
    !bytes.starts_with(b"bplist")
}
