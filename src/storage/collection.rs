//! Collection - the ordered records of one entity type, backed by one file
//!
//! Collections are analogous to tables in a relational database. Each
//! collection is a single JSON file with one top-level key:
//!
//! ```text
//! {
//!   "bookings": [
//!     { "bookingId": 1, "propertyId": 2, "checkInDate": "2024-06-10", ... },
//!     ...
//!   ]
//! }
//! ```
//!
//! Other top-level keys, and array entries that are not objects, are kept
//! and written back untouched.
//!
//! A `Collection` value is a snapshot. Mutating it marks it dirty; the change
//! only becomes visible to anyone else once the snapshot is committed by the
//! write serializer.

use super::ids;
use super::record::{Fields, Record};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// The fixed set of collections the store manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Users,
    Properties,
    Bookings,
    Complaints,
    Notifications,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 5] = [
        CollectionKind::Users,
        CollectionKind::Properties,
        CollectionKind::Bookings,
        CollectionKind::Complaints,
        CollectionKind::Notifications,
    ];

    /// Position in [`CollectionKind::ALL`]
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Collection name, also the canonical top-level key in the file
    pub fn name(self) -> &'static str {
        match self {
            CollectionKind::Users => "users",
            CollectionKind::Properties => "properties",
            CollectionKind::Bookings => "bookings",
            CollectionKind::Complaints => "complaints",
            CollectionKind::Notifications => "notifications",
        }
    }

    /// Older spellings of the top-level key accepted on read
    fn legacy_keys(self) -> &'static [&'static str] {
        match self {
            CollectionKind::Users => &["Users"],
            CollectionKind::Notifications => &["notification"],
            _ => &[],
        }
    }

    /// Name of the id field inside each record
    pub fn id_field(self) -> &'static str {
        match self {
            CollectionKind::Users => "userId",
            CollectionKind::Properties => "propertyId",
            CollectionKind::Bookings => "bookingId",
            CollectionKind::Complaints => "complaintId",
            CollectionKind::Notifications => "notificationId",
        }
    }

    /// File name used when the config does not override it
    pub fn default_file_name(self) -> &'static str {
        match self {
            CollectionKind::Users => "UserStorage.json",
            CollectionKind::Properties => "PropertyStorage.json",
            CollectionKind::Bookings => "BookingStorage.json",
            CollectionKind::Complaints => "ComplaintsStorage.json",
            CollectionKind::Notifications => "NotificationStorage.json",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CollectionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        CollectionKind::ALL
            .into_iter()
            .find(|kind| kind.name() == lower || kind.name().trim_end_matches('s') == lower)
            .ok_or_else(|| format!("unknown collection '{}'", s))
    }
}

/// Why a snapshot could not be decoded
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum DecodeIssue {
    NotJson(String),
    MissingWrapper,
}

impl fmt::Display for DecodeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeIssue::NotJson(message) => write!(f, "not valid JSON: {}", message),
            DecodeIssue::MissingWrapper => f.write_str("missing top-level record array"),
        }
    }
}

/// A snapshot of one collection
#[derive(Debug, Clone)]
pub struct Collection {
    kind: CollectionKind,
    records: Vec<Record>,
    /// Top-level keys other than the record array
    extra: Fields,
    /// Array entries that are not objects, written after the records
    strays: Vec<Value>,
    dirty: bool,
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.records == other.records
            && self.extra == other.extra
            && self.strays == other.strays
    }
}

impl Collection {
    /// A fresh, empty collection
    pub fn empty(kind: CollectionKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
            extra: Fields::new(),
            strays: Vec::new(),
            dirty: false,
        }
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Records in insertion order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True once a mutation has been applied since load
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Look up a record by id
    pub fn get(&self, id: u64) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Append a record, assigning it the next id
    ///
    /// Any id already present on the record (or an id field in its payload)
    /// is replaced.
    pub fn insert(&mut self, mut record: Record) -> &Record {
        record.fields.shift_remove(self.kind.id_field());
        record.id = ids::next_id(&self.records);
        self.records.push(record);
        self.dirty = true;
        let last = self.records.len() - 1;
        &self.records[last]
    }

    /// Apply field-level changes to an existing record
    ///
    /// The id is preserved no matter what the mutator does, and fields it
    /// does not touch are kept as they were.
    pub fn update<F>(&mut self, id: u64, mutator: F) -> Result<&Record>
    where
        F: FnOnce(&mut Fields),
    {
        let kind = self.kind;
        let index = self.position(id)?;
        let record = &mut self.records[index];
        mutator(&mut record.fields);
        record.fields.shift_remove(kind.id_field());
        self.dirty = true;
        Ok(&self.records[index])
    }

    /// Soft transition: set a status field and keep the record
    pub fn mark_status(&mut self, id: u64, field: &str, value: impl Into<Value>) -> Result<&Record> {
        let value = value.into();
        self.update(id, |fields| {
            fields.insert(field.to_string(), value);
        })
    }

    /// Hard delete: physically remove the record
    ///
    /// Returns whether a record was removed. Removing a missing id leaves the
    /// collection clean, so nothing is written.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        let removed = self.records.len() != before;
        self.dirty |= removed;
        removed
    }

    /// Lazily filter the snapshot
    ///
    /// The iterator borrows the snapshot, so it can be recreated any number of
    /// times and always yields the same records.
    pub fn find_all<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = &'a Record> + 'a
    where
        P: Fn(&Record) -> bool + 'a,
    {
        self.records.iter().filter(move |r| predicate(r))
    }

    fn position(&self, id: u64) -> Result<usize> {
        self.records
            .iter()
            .position(|r| r.id == id)
            .ok_or(Error::NotFound {
                collection: self.kind.name(),
                id,
            })
    }

    /// Decode a snapshot from file contents
    ///
    /// Empty input is an empty collection. A record without a usable id, or
    /// repeating an id seen earlier in the file, is kept and given the next
    /// free id; the new id reaches the file with the next commit.
    pub(crate) fn decode(kind: CollectionKind, bytes: &[u8]) -> std::result::Result<Self, DecodeIssue> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::empty(kind));
        }

        let root: Value =
            serde_json::from_slice(bytes).map_err(|e| DecodeIssue::NotJson(e.to_string()))?;
        let Value::Object(mut root) = root else {
            return Err(DecodeIssue::MissingWrapper);
        };

        let key = std::iter::once(kind.name())
            .chain(kind.legacy_keys().iter().copied())
            .find(|key| matches!(root.get(*key), Some(Value::Array(_))))
            .ok_or(DecodeIssue::MissingWrapper)?;
        let Some(Value::Array(items)) = root.shift_remove(key) else {
            return Err(DecodeIssue::MissingWrapper);
        };

        let mut seen = HashSet::with_capacity(items.len());
        let mut records = Vec::with_capacity(items.len());
        let mut unassigned = Vec::new();
        let mut strays = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            match Record::from_json(item, kind.id_field()) {
                Ok(record) if record.id != 0 && seen.insert(record.id) => records.push(record),
                Ok(mut record) => {
                    if record.id == 0 {
                        tracing::warn!(collection = %kind, index, "record without a valid id gets a fresh one");
                    } else {
                        tracing::warn!(collection = %kind, id = record.id, "record with a duplicate id gets a fresh one");
                    }
                    record.id = 0;
                    unassigned.push(records.len());
                    records.push(record);
                }
                Err(item) => {
                    tracing::warn!(collection = %kind, index, "keeping non-object entry as is");
                    strays.push(item);
                }
            }
        }
        for index in unassigned {
            records[index].id = ids::next_id(&records);
        }

        Ok(Self {
            kind,
            records,
            extra: root,
            strays,
            dirty: false,
        })
    }

    /// Encode the snapshot as pretty-printed wrapped JSON
    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        let items: Vec<Value> = self
            .records
            .iter()
            .map(|r| r.to_json(self.kind.id_field()))
            .chain(self.strays.iter().cloned())
            .collect();
        let mut root = Fields::with_capacity(self.extra.len() + 1);
        root.insert(self.kind.name().to_string(), Value::Array(items));
        for (key, value) in &self.extra {
            root.entry(key.clone()).or_insert_with(|| value.clone());
        }

        let mut bytes =
            serde_json::to_vec_pretty(&Value::Object(root)).map_err(|e| Error::SerializeFailed {
                collection: self.kind.name(),
                message: e.to_string(),
            })?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_collection_crud() {
        let mut collection = Collection::empty(CollectionKind::Complaints);

        // Create
        let first = collection
            .insert(Record::new(fields(json!({ "complaintStatus": "active" }))))
            .id;
        let second = collection
            .insert(Record::new(fields(json!({ "complaintStatus": "active" }))))
            .id;
        assert_eq!((first, second), (1, 2));
        assert!(collection.is_dirty());

        // Update
        let updated = collection
            .update(first, |f| {
                f.insert("complaintStatus".into(), json!("closed"));
            })
            .unwrap();
        assert_eq!(updated.get_str("complaintStatus"), Some("closed"));

        // Soft delete
        collection.mark_status(second, "complaintStatus", "deleted").unwrap();
        assert_eq!(collection.len(), 2);

        // Hard delete
        assert!(collection.remove(first));
        assert!(!collection.remove(first));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_insert_ignores_caller_supplied_id() {
        let mut collection = Collection::empty(CollectionKind::Users);
        let mut record = Record::new(fields(json!({ "userId": 999, "username": "ana" })));
        record.id = 500;

        let inserted = collection.insert(record);
        assert_eq!(inserted.id, 1);
        assert!(inserted.get("userId").is_none());
    }

    #[test]
    fn test_update_cannot_change_id() {
        let mut collection = Collection::empty(CollectionKind::Bookings);
        let id = collection.insert(Record::new(Fields::new())).id;

        let record = collection
            .update(id, |f| {
                f.insert("bookingId".into(), json!(42));
                f.insert("bookingStatus".into(), json!(false));
            })
            .unwrap();
        assert_eq!(record.id, id);
        assert!(record.get("bookingId").is_none());
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let mut collection = Collection::empty(CollectionKind::Bookings);
        let err = collection.update(3, |_| {}).unwrap_err();
        assert!(matches!(err, Error::NotFound { id: 3, .. }));
        assert!(!collection.is_dirty());
    }

    #[test]
    fn test_remove_missing_stays_clean() {
        let mut collection = Collection::empty(CollectionKind::Bookings);
        assert!(!collection.remove(1));
        assert!(!collection.is_dirty());
    }

    #[test]
    fn test_find_all_is_restartable() {
        let mut collection = Collection::empty(CollectionKind::Properties);
        for owner in [1, 2, 1] {
            collection.insert(Record::new(fields(json!({ "userId": owner }))));
        }

        let owned_by_one = |r: &Record| r.get_id("userId") == Some(1);
        assert_eq!(collection.find_all(owned_by_one).count(), 2);
        assert_eq!(collection.find_all(owned_by_one).count(), 2);
        let ids: Vec<_> = collection.find_all(owned_by_one).map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_decode_self_heals() {
        let kind = CollectionKind::Bookings;
        assert!(Collection::decode(kind, b"").unwrap().is_empty());
        assert!(Collection::decode(kind, b"  \n").unwrap().is_empty());
        assert!(Collection::decode(kind, b"{ not json").is_err());
        assert_eq!(
            Collection::decode(kind, br#"{"users": []}"#),
            Err(DecodeIssue::MissingWrapper)
        );
        assert_eq!(
            Collection::decode(kind, br#"{"bookings": {}}"#),
            Err(DecodeIssue::MissingWrapper)
        );
    }

    #[test]
    fn test_decode_accepts_legacy_keys() {
        let users = Collection::decode(
            CollectionKind::Users,
            br#"{"Users": [{"userId": 3, "username": "ana"}]}"#,
        )
        .unwrap();
        assert_eq!(users.records()[0].id, 3);

        let notifications = Collection::decode(
            CollectionKind::Notifications,
            br#"{"notification": [{"notificationId": "2"}]}"#,
        )
        .unwrap();
        assert_eq!(notifications.records()[0].id, 2);
    }

    #[test]
    fn test_decode_keeps_bad_and_duplicate_ids() {
        let collection = Collection::decode(
            CollectionKind::Bookings,
            br#"{"bookings": [{"bookingId": 1, "guest": "a"}, {"bookingId": 1, "guest": "b"}, {"guest": "c"}, {"bookingId": 2}]}"#,
        )
        .unwrap();
        let ids: Vec<_> = collection.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3, 4, 2]);
        assert_eq!(collection.get(3).and_then(|r| r.get_str("guest")), Some("b"));
        assert_eq!(collection.get(4).and_then(|r| r.get_str("guest")), Some("c"));
        assert!(!collection.is_dirty());
    }

    #[test]
    fn test_encode_keeps_extra_keys_and_stray_entries() {
        let mut collection = Collection::decode(
            CollectionKind::Bookings,
            br#"{"meta": {"v": 2}, "bookings": [{"bookingId": 1}, "loose", 7]}"#,
        )
        .unwrap();
        assert_eq!(collection.len(), 1);
        collection.insert(Record::new(Fields::new()));

        let bytes = collection.encode().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({
                "bookings": [{"bookingId": 1}, {"bookingId": 2}, "loose", 7],
                "meta": {"v": 2}
            })
        );
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["bookings", "meta"]);
    }

    #[test]
    fn test_encode_decode_keeps_opaque_fields() {
        let mut collection = Collection::empty(CollectionKind::Properties);
        collection.insert(Record::new(fields(json!({
            "propertyName": "Loft",
            "address": { "city": "Pune", "postalCode": "411001" },
            "customFlag": [1, "two", null]
        }))));

        let bytes = collection.encode().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("{\n  \"properties\": ["));

        let decoded = Collection::decode(CollectionKind::Properties, &bytes).unwrap();
        assert_eq!(decoded, collection);
        assert!(!decoded.is_dirty());
    }

    #[test]
    fn test_kind_index_matches_all() {
        for (position, kind) in CollectionKind::ALL.into_iter().enumerate() {
            assert_eq!(kind.index(), position);
        }
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("bookings".parse(), Ok(CollectionKind::Bookings));
        assert_eq!("Booking".parse(), Ok(CollectionKind::Bookings));
        assert_eq!("PROPERTIES".parse(), Ok(CollectionKind::Properties));
        assert!("rooms".parse::<CollectionKind>().is_err());
    }
}
