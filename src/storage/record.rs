//! Record representation
//!
//! A Record is one JSON object inside a collection file. The integer id is
//! held apart from the rest of the fields so that no mutation can touch it;
//! everything else is opaque payload that must round-trip unchanged.

use serde_json::{Map, Value};

/// A map of field names to JSON values, in file order
pub type Fields = Map<String, Value>;

/// A record in a collection
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Unique identifier within the collection (0 until assigned)
    pub id: u64,

    /// All other fields, including ones the store does not know about
    pub fields: Fields,
}

impl Record {
    /// Create an unsaved record; the id is assigned on insert
    pub fn new(fields: Fields) -> Self {
        Self { id: 0, fields }
    }

    /// Set a field value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Read a field holding another record's id (a foreign key)
    pub fn get_id(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(as_id)
    }

    /// Decode a record from a JSON object, pulling out the id field
    ///
    /// A missing or unusable id (not a positive integer) leaves the id at 0
    /// for the caller to assign. Anything that is not an object is handed
    /// back unchanged.
    pub(crate) fn from_json(value: Value, id_field: &str) -> Result<Self, Value> {
        let Value::Object(mut fields) = value else {
            return Err(value);
        };
        let id = fields
            .shift_remove(id_field)
            .as_ref()
            .and_then(as_id)
            .unwrap_or(0);
        Ok(Self { id, fields })
    }

    /// Encode back to a JSON object with the id field first
    pub(crate) fn to_json(&self, id_field: &str) -> Value {
        let mut object = Fields::with_capacity(self.fields.len() + 1);
        object.insert(id_field.to_string(), Value::from(self.id));
        for (key, value) in &self.fields {
            if key != id_field {
                object.insert(key.clone(), value.clone());
            }
        }
        Value::Object(object)
    }
}

/// Interpret a JSON value as a record id
///
/// Accepts positive integers and numeric strings such as `"7"`, which older
/// files contain.
pub fn as_id(value: &Value) -> Option<u64> {
    let id = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (id > 0).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_creation() {
        let mut record = Record::new(Fields::new());
        record.set("propertyName", "Sea View").set("noOfRooms", 3);

        assert_eq!(record.id, 0);
        assert_eq!(record.get_str("propertyName"), Some("Sea View"));
        assert_eq!(record.get("noOfRooms"), Some(&json!(3)));
    }

    #[test]
    fn test_from_json_extracts_id() {
        let value = json!({ "bookingId": 4, "propertyId": "2", "note": null });
        let record = Record::from_json(value, "bookingId").unwrap();

        assert_eq!(record.id, 4);
        assert!(record.get("bookingId").is_none());
        assert_eq!(record.get_id("propertyId"), Some(2));
        assert_eq!(record.get("note"), Some(&Value::Null));
    }

    #[test]
    fn test_from_json_leaves_bad_ids_unassigned() {
        for value in [json!({ "bookingId": 0 }), json!({ "bookingId": -3 }), json!({ "bookingId": "abc" })] {
            let record = Record::from_json(value, "bookingId").unwrap();
            assert_eq!(record.id, 0);
            assert!(record.fields.is_empty());
        }

        let record = Record::from_json(json!({ "other": 1 }), "bookingId").unwrap();
        assert_eq!(record.id, 0);
        assert_eq!(record.get("other"), Some(&json!(1)));

        assert_eq!(Record::from_json(json!([1, 2]), "bookingId"), Err(json!([1, 2])));
    }

    #[test]
    fn test_to_json_puts_id_first() {
        let mut record = Record::new(Fields::new());
        record.id = 9;
        record.set("zeta", 1).set("alpha", 2);

        let value = record.to_json("userId");
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["userId", "zeta", "alpha"]);
    }
}
