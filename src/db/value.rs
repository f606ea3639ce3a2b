//! Codec between plain JSON and Firestore's typed value objects.
//!
//! Firestore's REST surface wraps every field in a discriminated object
//! (`{"stringValue": ...}`, `{"integerValue": "42"}`, ...). Documents in
//! this crate are ordinary `serde_json::Value` maps; the two functions
//! here translate at the wire boundary so nothing above `db/` ever sees
//! Firestore's encoding.

use serde_json::{json, Map, Value};

/// Encode a JSON value into a Firestore value object.
pub fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // Integers travel as strings on the wire.
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": {
                "values": items.iter().map(to_firestore_value).collect::<Vec<_>>()
            }
        }),
        Value::Object(map) => json!({
            "mapValue": { "fields": encode_fields(map) }
        }),
    }
}

/// Decode a Firestore value object back into plain JSON. Unknown
/// discriminants decode to null rather than failing the whole document.
pub fn from_firestore_value(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };

    if obj.contains_key("nullValue") {
        return Value::Null;
    }
    if let Some(b) = obj.get("booleanValue").and_then(Value::as_bool) {
        return Value::Bool(b);
    }
    if let Some(raw) = obj.get("integerValue") {
        if let Some(i) = raw.as_str().and_then(|s| s.parse::<i64>().ok()) {
            return json!(i);
        }
        if let Some(i) = raw.as_i64() {
            return json!(i);
        }
    }
    if let Some(f) = obj.get("doubleValue").and_then(Value::as_f64) {
        return json!(f);
    }
    if let Some(s) = obj.get("stringValue").and_then(Value::as_str) {
        return Value::String(s.to_string());
    }
    if let Some(s) = obj.get("timestampValue").and_then(Value::as_str) {
        return Value::String(s.to_string());
    }
    if let Some(arr) = obj.get("arrayValue") {
        let values = arr
            .get("values")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(from_firestore_value).collect())
            .unwrap_or_default();
        return Value::Array(values);
    }
    if let Some(map) = obj.get("mapValue") {
        let fields = map
            .get("fields")
            .and_then(Value::as_object)
            .map(decode_fields)
            .unwrap_or_default();
        return Value::Object(fields);
    }

    Value::Null
}

pub fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), to_firestore_value(v)))
        .collect()
}

pub fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), from_firestore_value(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scalars_round_trip() {
        for value in [
            json!(null),
            json!(true),
            json!(false),
            json!(42),
            json!(-7),
            json!(2.5),
            json!("hello"),
        ] {
            assert_eq!(from_firestore_value(&to_firestore_value(&value)), value);
        }
    }

    #[test]
    fn integers_encode_as_strings() {
        let encoded = to_firestore_value(&json!(42));
        assert_eq!(encoded["integerValue"], "42");
    }

    #[test]
    fn nested_document_round_trips() {
        let doc = json!({
            "email": "kid@example.com",
            "isActive": true,
            "lessonCount": 3,
            "scores": [1.5, 2.0],
            "profile": { "firstName": "Sam", "studentIds": ["a", "b"] }
        });
        let encoded = to_firestore_value(&doc);
        assert_eq!(from_firestore_value(&encoded), doc);
    }

    #[test]
    fn timestamp_values_decode_to_strings() {
        let v = json!({ "timestampValue": "2024-01-01T00:00:00Z" });
        assert_eq!(from_firestore_value(&v), json!("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn unknown_discriminant_decodes_to_null() {
        let v = json!({ "geoPointValue": { "latitude": 1.0 } });
        assert_eq!(from_firestore_value(&v), Value::Null);
    }

    fn arb_json(depth: u32) -> BoxedStrategy<Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Z0-9 ]{0,16}".prop_map(Value::from),
        ];
        leaf.prop_recursive(depth, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..4).prop_map(|m| {
                    Value::Object(m.into_iter().collect())
                }),
            ]
        })
        .boxed()
    }

    proptest! {
        #[test]
        fn codec_round_trips_arbitrary_documents(doc in arb_json(3)) {
            let encoded = to_firestore_value(&doc);
            prop_assert_eq!(from_firestore_value(&encoded), doc);
        }
    }
}
