//! Conversion between typed records and stored values.

use crate::error::{CoreError, CoreResult};
use ciborium::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Converts a record into a stored value.
///
/// # Errors
///
/// Returns [`CoreError::Record`] if the record cannot be serialized.
pub fn to_value<T: Serialize + ?Sized>(record: &T) -> CoreResult<Value> {
    Value::serialized(record).map_err(|e| CoreError::record(e.to_string()))
}

/// Converts a stored value back into a record.
///
/// # Errors
///
/// Returns [`CoreError::Record`] if the value does not match `T`.
pub fn from_value<T: DeserializeOwned>(value: &Value) -> CoreResult<T> {
    value
        .deserialized()
        .map_err(|e| CoreError::record(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<i64>,
        title: String,
    }

    #[test]
    fn absent_id_is_omitted() {
        let value = to_value(&Note {
            id: None,
            title: "hi".into(),
        })
        .unwrap();
        let Value::Map(entries) = &value else {
            panic!("expected a map");
        };
        assert_eq!(entries.len(), 1);

        let back: Note = from_value(&value).unwrap();
        assert_eq!(back.id, None);
    }

    #[test]
    fn mismatched_shape_is_a_record_error() {
        let value = Value::Text("not a note".into());
        let result: CoreResult<Note> = from_value(&value);
        assert!(matches!(result, Err(CoreError::Record { .. })));
    }
}
