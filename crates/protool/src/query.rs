//! Reading and decoding single profiles.

use crate::profile::ProfileLoader;
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use plist::{Date, Dictionary, Value};
use serde_json::{Map, Number, Value as JsonValue};
use std::path::Path;
use std::time::SystemTime;

/// Value stored under a top-level `key`, or `None` if the key is absent.
pub fn value_for_key(profile_path: impl AsRef<Path>, key: &str) -> Result<Option<Value>> {
    value_for_key_with(&ProfileLoader::new(), profile_path.as_ref(), key)
}

/// [`value_for_key`] with an explicit loader.
pub fn value_for_key_with(loader: &ProfileLoader, profile_path: &Path, key: &str) -> Result<Option<Value>> {
    let profile = loader.load(profile_path)?;
    Ok(profile.contents().get(key).cloned())
}

/// Canonical, key-sorted XML of a profile.
pub fn decode(profile_path: impl AsRef<Path>) -> Result<String> {
    decode_with(&ProfileLoader::new(), profile_path.as_ref())
}

/// [`decode`] with an explicit loader.
pub fn decode_with(loader: &ProfileLoader, profile_path: &Path) -> Result<String> {
    let profile = loader.load(profile_path)?;
    Ok(String::from_utf8_lossy(profile.xml()).into_owned())
}

/// Top-level dictionary of a profile.
pub fn decode_contents(profile_path: impl AsRef<Path>) -> Result<Dictionary> {
    decode_contents_with(&ProfileLoader::new(), profile_path.as_ref())
}

/// [`decode_contents`] with an explicit loader.
pub fn decode_contents_with(loader: &ProfileLoader, profile_path: &Path) -> Result<Dictionary> {
    Ok(loader.load(profile_path)?.contents())
}

/// Render a value for display.
///
/// Strings and numbers print bare, dates as ISO-8601, and collections as
/// compact JSON.
///
/// # Errors
///
/// Returns [`Error::SerializationUnsupported`] for data blobs and UIDs,
/// including ones nested inside a collection.
pub fn render_value(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Date(date) => Ok(iso_8601(*date)),
        Value::Array(_) | Value::Dictionary(_) => {
            let json = to_json(value)?;
            serde_json::to_string(&json).map_err(|e| Error::SerializationUnsupported(e.to_string()))
        }
        other => Ok(to_json(other)?.to_string()),
    }
}

/// Convert a plist value to JSON.
///
/// Dates become ISO-8601 strings.
pub fn to_json(value: &Value) -> Result<JsonValue> {
    let json = match value {
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Integer(i) => match (i.as_signed(), i.as_unsigned()) {
            (Some(v), _) => JsonValue::from(v),
            (None, Some(v)) => JsonValue::from(v),
            (None, None) => return Err(Error::SerializationUnsupported(format!("integer {}", i))),
        },
        Value::Real(r) => Number::from_f64(*r)
            .map(JsonValue::Number)
            .ok_or_else(|| Error::SerializationUnsupported(format!("real {} is not finite", r)))?,
        Value::Date(date) => JsonValue::String(iso_8601(*date)),
        Value::Array(items) => JsonValue::Array(items.iter().map(to_json).collect::<Result<_>>()?),
        Value::Dictionary(dict) => {
            let mut map = Map::new();
            for (key, item) in dict {
                map.insert(key.clone(), to_json(item)?);
            }
            JsonValue::Object(map)
        }
        Value::Data(_) => {
            return Err(Error::SerializationUnsupported(
                "binary data has no JSON representation".into(),
            ))
        }
        _ => {
            return Err(Error::SerializationUnsupported(
                "value type has no JSON representation".into(),
            ))
        }
    };

    Ok(json)
}

fn iso_8601(date: Date) -> String {
    DateTime::<Utc>::from(SystemTime::from(date)).to_rfc3339_opts(SecondsFormat::Secs, true)
}
