pub mod curricula;
pub mod exams;
pub mod jobs;
pub mod lessons;
pub mod users;

use serde::Serialize;
use serde_json::{Map, Value};

use super::StoreError;

/// Serialize a domain value into a field map, dropping the `id` field:
/// the document id lives in the document name, not its fields.
pub(crate) fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, StoreError> {
    let mut json = serde_json::to_value(value)?;
    let Some(map) = json.as_object_mut() else {
        return Err(StoreError::Decode(serde::de::Error::custom(
            "expected an object document",
        )));
    };
    map.remove("id");
    Ok(map.clone())
}
