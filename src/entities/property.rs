//! Properties
//!
//! Property payloads arrive with many spellings of the same field
//! (`pricePreDay`, `noOfBathroom`, a flat address...). They are normalized
//! to one canonical shape before anything is persisted, so the stored
//! representation is never ambiguous. Deleting a property is a soft status
//! flip to `DELETED`.

use super::booking;
use crate::error::{Error, Result};
use crate::storage::collection::CollectionKind;
use crate::storage::record::{as_id, Fields, Record};
use crate::validation::ValidationError;
use crate::Store;
use chrono::NaiveDate;
use serde_json::Value;

pub const OWNER_ID: &str = "userId";
pub const STATUS: &str = "propertyStatus";
pub const PRICE_PER_DAY: &str = "pricePerDay";
pub const ADDRESS: &str = "address";

/// Canonical field name and the aliases accepted for it
const ALIASES: &[(&str, &[&str])] = &[
    (OWNER_ID, &["hostId"]),
    ("propertyName", &["propertyTitle", "name"]),
    ("propertyDescription", &["description"]),
    ("noOfRooms", &["rooms"]),
    ("noOfBathrooms", &["noOfBathroom", "bathrooms"]),
    ("maxNoOfGuests", &["maxNumberOfGuest", "maxGuests"]),
    (PRICE_PER_DAY, &["pricePreDay", "priceDay"]),
    ("imageURL", &["imageUrl", "image"]),
    ("propertyAccountNumber", &["accountNumber"]),
    ("hasWifi", &["hasWIFI"]),
    ("hasAc", &["hasAC"]),
    ("propertyRate", &["propertyRating"]),
];

/// Fields stored as numbers even when sent as numeric strings
const NUMERIC_FIELDS: &[&str] = &[
    "noOfRooms",
    "noOfBathrooms",
    "maxNoOfGuests",
    PRICE_PER_DAY,
    "propertyAccountNumber",
    "propertyRate",
    "propertyRatingCount",
];

const ADDRESS_FIELDS: &[&str] = &["buildingNo", "street", "city", "state", "country", "postalCode"];
const POSTAL_CODE_ALIASES: &[&str] = &["pincode", "postal", "zip"];

/// Lifecycle state of a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyStatus {
    Available,
    Deleted,
    Other(String),
}

impl PropertyStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "AVAILABLE" => Self::Available,
            "DELETED" => Self::Deleted,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Deleted => "DELETED",
            Self::Other(s) => s,
        }
    }

    /// Status of a record; a missing status means available
    pub fn of(record: &Record) -> Self {
        record
            .get_str(STATUS)
            .map(Self::parse)
            .unwrap_or(Self::Available)
    }
}

fn canonical_name(key: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&key))
        .map(|(canonical, _)| *canonical)
}

/// Significant decimal digits an `f64` always reproduces exactly
const F64_EXACT_DIGITS: usize = 15;

/// Turn a numeric string into a JSON number when no digit is lost
///
/// Integers must fit `i64`/`u64`; decimals must have at most 15 digits.
/// Anything else, such as a 23-digit account number, stays a string.
fn coerce_number(value: Value) -> Value {
    let Value::String(s) = &value else {
        return value;
    };
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(u) = s.parse::<u64>() {
        return Value::from(u);
    }
    let digits = s.chars().filter(char::is_ascii_digit).count();
    let is_plain_decimal = s
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'));
    if !is_plain_decimal || digits > F64_EXACT_DIGITS {
        return value;
    }
    match s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        Some(n) => Value::Number(n),
        None => value,
    }
}

fn normalize_address(address: &mut Fields) {
    if !address.contains_key("postalCode") {
        if let Some(code) = POSTAL_CODE_ALIASES.iter().find_map(|k| address.get(*k).cloned()) {
            address.insert("postalCode".into(), code);
        }
    }
    for alias in POSTAL_CODE_ALIASES {
        address.shift_remove(*alias);
    }
}

/// Map every accepted spelling onto the canonical property schema
///
/// - aliases are renamed; when both spellings are present the canonical
///   one wins
/// - flat address fields are folded into a nested `address` object
/// - numeric fields sent as strings become numbers
/// - `propertyStatus` is upper-cased
/// - everything else passes through untouched
pub fn normalize_property(input: Fields) -> Fields {
    let mut out = Fields::with_capacity(input.len());
    let mut aliased: Vec<(&'static str, Value)> = Vec::new();
    let mut flat_address = Fields::new();

    for (key, value) in input {
        if let Some(canonical) = canonical_name(&key) {
            aliased.push((canonical, value));
        } else if ADDRESS_FIELDS.contains(&key.as_str()) || POSTAL_CODE_ALIASES.contains(&key.as_str()) {
            flat_address.insert(key, value);
        } else {
            out.insert(key, value);
        }
    }

    for (canonical, value) in aliased {
        if !out.contains_key(canonical) {
            out.insert(canonical.to_string(), value);
        }
    }

    let mut address = match out.shift_remove(ADDRESS) {
        Some(Value::Object(nested)) => nested,
        Some(other) => {
            // Not an object; keep it as opaque payload
            out.insert(ADDRESS.to_string(), other);
            Fields::new()
        }
        None => Fields::new(),
    };
    normalize_address(&mut flat_address);
    for (key, value) in flat_address {
        address.entry(key).or_insert(value);
    }
    normalize_address(&mut address);
    if !address.is_empty() {
        out.insert(ADDRESS.to_string(), Value::Object(address));
    }

    for field in NUMERIC_FIELDS {
        if let Some(value) = out.shift_remove(*field) {
            out.insert(field.to_string(), coerce_number(value));
        }
    }
    if let Some(owner) = out.get(OWNER_ID).and_then(as_id) {
        out.insert(OWNER_ID.to_string(), Value::from(owner));
    }
    if let Some(Value::String(status)) = out.get(STATUS) {
        let status = PropertyStatus::parse(status).as_str().to_string();
        out.insert(STATUS.to_string(), Value::String(status));
    }

    out
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn merge_address(fields: &mut Fields, changes: Fields) {
    match fields.get_mut(ADDRESS) {
        Some(Value::Object(current)) => {
            for (key, value) in changes {
                if !is_blank(&value) {
                    current.insert(key, value);
                }
            }
        }
        _ => {
            fields.insert(ADDRESS.to_string(), Value::Object(changes));
        }
    }
}

/// Add a property; the owner (`userId` or `hostId`) is required
pub async fn add_property(store: &Store, input: Fields) -> Result<Record> {
    let mut fields = normalize_property(input);
    if fields.get(OWNER_ID).and_then(as_id).is_none() {
        return Err(ValidationError::MissingField(OWNER_ID).into());
    }
    if !fields.contains_key(STATUS) {
        fields.insert(STATUS.to_string(), PropertyStatus::Available.as_str().into());
    }

    store.insert(CollectionKind::Properties, fields).await
}

/// Merge a normalized patch into a property
///
/// Blank values (null, empty strings) keep the stored value, and the nested
/// address is merged field by field. Refused while an active booking covers
/// `today`; the bookings snapshot is read without locking it.
pub async fn update_property(store: &Store, id: u64, patch: Fields, today: NaiveDate) -> Result<Record> {
    ensure_exists(store, id).await?;
    let bookings = store.load(CollectionKind::Bookings).await?;
    if booking::active_stay_matches(&bookings, id, |stay| stay.contains(today)) {
        return Err(Error::PropertyOccupied { property_id: id });
    }

    let patch = normalize_property(patch);
    store
        .update(CollectionKind::Properties, id, move |fields| {
            for (key, value) in patch {
                if is_blank(&value) {
                    continue;
                }
                match value {
                    Value::Object(changes) if key == ADDRESS => merge_address(fields, changes),
                    value => {
                        fields.insert(key, value);
                    }
                }
            }
        })
        .await
}

/// Soft delete a property
///
/// Refused while an active booking ends on or after `today`. The bookings
/// snapshot is read without locking it.
pub async fn delete_property(store: &Store, id: u64, today: NaiveDate) -> Result<Record> {
    ensure_exists(store, id).await?;
    let bookings = store.load(CollectionKind::Bookings).await?;
    if booking::active_stay_matches(&bookings, id, |stay| stay.check_out() >= today) {
        return Err(Error::PropertyHasBookings { property_id: id });
    }

    store
        .mark_status(CollectionKind::Properties, id, STATUS, PropertyStatus::Deleted.as_str())
        .await
}

async fn ensure_exists(store: &Store, id: u64) -> Result<()> {
    match store.get(CollectionKind::Properties, id).await? {
        Some(_) => Ok(()),
        None => Err(Error::NotFound {
            collection: CollectionKind::Properties.name(),
            id,
        }),
    }
}

/// Properties of one owner, either live or deleted ones
pub async fn list_properties(store: &Store, owner: u64, deleted: bool) -> Result<Vec<Record>> {
    store
        .find_all(CollectionKind::Properties, |p| {
            p.get_id(OWNER_ID) == Some(owner) && (PropertyStatus::of(p) == PropertyStatus::Deleted) == deleted
        })
        .await
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
    fn test_aliases_are_renamed() {
        let out = normalize_property(fields(json!({
            "hostId": "4",
            "pricePreDay": 1500,
            "noOfBathroom": "2",
            "maxNumberOfGuest": 6,
            "hasWIFI": true,
            "imageUrl": "a.png"
        })));

        assert_eq!(out.get("userId"), Some(&json!(4)));
        assert_eq!(out.get("pricePerDay"), Some(&json!(1500)));
        assert_eq!(out.get("noOfBathrooms"), Some(&json!(2)));
        assert_eq!(out.get("maxNoOfGuests"), Some(&json!(6)));
        assert_eq!(out.get("hasWifi"), Some(&json!(true)));
        assert_eq!(out.get("imageURL"), Some(&json!("a.png")));
        for alias in ["hostId", "pricePreDay", "noOfBathroom", "maxNumberOfGuest", "hasWIFI", "imageUrl"] {
            assert!(out.get(alias).is_none(), "alias {} left behind", alias);
        }
    }

    #[test]
    fn test_canonical_spelling_wins() {
        let out = normalize_property(fields(json!({ "pricePreDay": 100, "pricePerDay": 250 })));
        assert_eq!(out.get("pricePerDay"), Some(&json!(250)));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_flat_address_is_nested() {
        let out = normalize_property(fields(json!({
            "city": "Goa",
            "pincode": "403001",
            "address": { "street": "Beach Rd" }
        })));

        assert_eq!(
            out.get("address"),
            Some(&json!({ "street": "Beach Rd", "city": "Goa", "postalCode": "403001" }))
        );
        assert!(out.get("city").is_none());
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let out = normalize_property(fields(json!({ "petPolicy": { "dogs": true }, "propertyStatus": "available" })));
        assert_eq!(out.get("petPolicy"), Some(&json!({ "dogs": true })));
        assert_eq!(out.get("propertyStatus"), Some(&json!("AVAILABLE")));
    }

    #[test]
    fn test_numbers_coerce_only_when_exact() {
        assert_eq!(coerce_number(json!("42")), json!(42));
        assert_eq!(coerce_number(json!(" 1500.5 ")), json!(1500.5));
        assert_eq!(coerce_number(json!("18446744073709551615")), json!(18446744073709551615u64));
        assert_eq!(
            coerce_number(json!("12345678901234567890123")),
            json!("12345678901234567890123")
        );
        assert_eq!(coerce_number(json!("0.1234567890123456789")), json!("0.1234567890123456789"));
        assert_eq!(coerce_number(json!("1e3")), json!("1e3"));
        assert_eq!(coerce_number(json!("NaN")), json!("NaN"));
        assert_eq!(coerce_number(json!("two")), json!("two"));
        assert_eq!(coerce_number(json!(7)), json!(7));
    }

    #[test]
    fn test_long_account_number_is_kept_verbatim() {
        let out = normalize_property(fields(json!({ "accountNumber": "12345678901234567890123" })));
        assert_eq!(out.get("propertyAccountNumber"), Some(&json!("12345678901234567890123")));
    }

    #[test]
    fn test_status_of_record() {
        let mut record = Record::new(Fields::new());
        assert_eq!(PropertyStatus::of(&record), PropertyStatus::Available);
        record.set(STATUS, "deleted");
        assert_eq!(PropertyStatus::of(&record), PropertyStatus::Deleted);
        record.set(STATUS, "UNDER_MAINTENANCE");
        assert_eq!(
            PropertyStatus::of(&record),
            PropertyStatus::Other("UNDER_MAINTENANCE".into())
        );
    }
}
