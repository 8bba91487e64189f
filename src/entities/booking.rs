//! Bookings
//!
//! A booking is active while `bookingStatus` is `true`. Cancelling either
//! flips it to `false` (kept for audit) or removes the record entirely.
//! Every path that can make a stay active (create, reschedule, re-activate)
//! checks for overlaps inside the bookings write section.

use super::property::{self, PropertyStatus};
use crate::error::{Error, Result};
use crate::overlap::{find_conflict, DateRange};
use crate::storage::collection::{Collection, CollectionKind};
use crate::storage::record::{Fields, Record};
use crate::validation::{format_date, parse_stored_date, ValidationError};
use crate::Store;
use chrono::{Days, NaiveDate};
use serde_json::Value;
use std::collections::HashSet;

pub const PROPERTY_ID: &str = "propertyId";
pub const USER_ID: &str = "userId";
pub const HOST_ID: &str = "hostId";
pub const CHECK_IN: &str = "checkInDate";
pub const CHECK_OUT: &str = "checkOutDate";
pub const STATUS: &str = "bookingStatus";

/// Days after check-out during which a stay can still be complained about
pub const COMPLAINT_WINDOW_DAYS: u64 = 7;

/// Which side of a booking a user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Client,
    Host,
}

impl Party {
    pub fn as_str(self) -> &'static str {
        match self {
            Party::Client => "client",
            Party::Host => "host",
        }
    }

    /// Case-insensitive; unknown strings are `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "client" => Some(Party::Client),
            "host" => Some(Party::Host),
            _ => None,
        }
    }

    /// Field holding this party's user id on a booking
    fn field(self) -> &'static str {
        match self {
            Party::Client => USER_ID,
            Party::Host => HOST_ID,
        }
    }
}

/// Typed view of a booking record
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: u64,
    pub property_id: u64,
    pub user_id: Option<u64>,
    pub host_id: Option<u64>,
    pub stay: DateRange,
    pub active: bool,
}

impl Booking {
    pub fn from_record(record: &Record) -> std::result::Result<Self, ValidationError> {
        let property_id = record
            .get_id(PROPERTY_ID)
            .ok_or(ValidationError::MissingField(PROPERTY_ID))?;
        let check_in = record.get_str(CHECK_IN).ok_or(ValidationError::MissingField(CHECK_IN))?;
        let check_out = record
            .get_str(CHECK_OUT)
            .ok_or(ValidationError::MissingField(CHECK_OUT))?;

        Ok(Self {
            id: record.id,
            property_id,
            user_id: record.get_id(USER_ID),
            host_id: record.get_id(HOST_ID),
            stay: DateRange::new(parse_stored_date(check_in)?, parse_stored_date(check_out)?)?,
            active: record.get_bool(STATUS) == Some(true),
        })
    }
}

/// A booking request
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub property_id: u64,
    pub user_id: u64,
    pub stay: DateRange,
    /// Opaque payload stored alongside the booking (guest count, notes...)
    pub extra: Fields,
}

impl NewBooking {
    pub fn new(property_id: u64, user_id: u64, stay: DateRange) -> Self {
        Self {
            property_id,
            user_id,
            stay,
            extra: Fields::new(),
        }
    }

    /// Build from raw `YYYY-MM-DD` strings
    pub fn parse(property_id: u64, user_id: u64, check_in: &str, check_out: &str) -> Result<Self> {
        Ok(Self::new(property_id, user_id, DateRange::parse(check_in, check_out)?))
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

fn conflict(property_id: u64, stay: &DateRange, existing: &Record) -> Error {
    Error::BookingConflict {
        property_id,
        check_in: stay.check_in(),
        check_out: stay.check_out(),
        existing: existing.id,
    }
}

fn not_found(id: u64) -> Error {
    Error::NotFound {
        collection: CollectionKind::Bookings.name(),
        id,
    }
}

/// Reject `stay` if another active booking of the same property overlaps it
fn ensure_free(bookings: &Collection, property_id: u64, stay: &DateRange, exclude: Option<u64>) -> Result<()> {
    match find_conflict(bookings, property_id, stay, exclude) {
        Some(existing) => Err(conflict(property_id, stay, existing)),
        None => Ok(()),
    }
}

/// Create an active booking
///
/// The property must exist and not be deleted; that lookup reads the latest
/// properties snapshot without locking it. The overlap check and the insert
/// run in one bookings write section, so of two concurrent requests for
/// overlapping stays exactly one succeeds.
pub async fn create_booking(store: &Store, request: NewBooking) -> Result<Record> {
    let properties = store.load(CollectionKind::Properties).await?;
    let listing = properties.get(request.property_id).ok_or(Error::NotFound {
        collection: CollectionKind::Properties.name(),
        id: request.property_id,
    })?;
    if PropertyStatus::of(listing) == PropertyStatus::Deleted {
        return Err(Error::PropertyUnavailable {
            property_id: request.property_id,
        });
    }
    let host_id = listing.get_id(property::OWNER_ID);

    let NewBooking {
        property_id,
        user_id,
        stay,
        extra,
    } = request;

    let record = store
        .with_exclusive_write(CollectionKind::Bookings, move |bookings| {
            ensure_free(bookings, property_id, &stay, None)?;

            let mut record = Record::new(extra);
            record
                .set(PROPERTY_ID, property_id)
                .set(USER_ID, user_id)
                .set(CHECK_IN, format_date(stay.check_in()))
                .set(CHECK_OUT, format_date(stay.check_out()))
                .set(STATUS, true);
            if let Some(host_id) = host_id {
                record.set(HOST_ID, host_id);
            }
            Ok(bookings.insert(record).clone())
        })
        .await?;

    tracing::info!(booking = record.id, property = property_id, "booking created");
    Ok(record)
}

/// Move a booking to new dates
pub async fn reschedule_booking(store: &Store, id: u64, stay: DateRange) -> Result<Record> {
    store
        .with_exclusive_write(CollectionKind::Bookings, |bookings| {
            let current = bookings.get(id).ok_or_else(|| not_found(id))?;
            let property_id = current
                .get_id(PROPERTY_ID)
                .ok_or(ValidationError::MissingField(PROPERTY_ID))?;
            if current.get_bool(STATUS) == Some(true) {
                ensure_free(bookings, property_id, &stay, Some(id))?;
            }

            bookings
                .update(id, |fields| {
                    fields.insert(CHECK_IN.into(), format_date(stay.check_in()).into());
                    fields.insert(CHECK_OUT.into(), format_date(stay.check_out()).into());
                })
                .cloned()
        })
        .await
}

/// Soft cancel (`false`) or re-activate (`true`) a booking
///
/// Re-activation is refused if the stay now overlaps another active booking.
pub async fn set_booking_status(store: &Store, id: u64, active: bool) -> Result<Record> {
    store
        .with_exclusive_write(CollectionKind::Bookings, |bookings| {
            let current = bookings.get(id).ok_or_else(|| not_found(id))?;
            if active {
                let booking = Booking::from_record(current)?;
                ensure_free(bookings, booking.property_id, &booking.stay, Some(id))?;
            }
            bookings.mark_status(id, STATUS, active).cloned()
        })
        .await
}

/// Hard delete a booking; `false` if it did not exist
pub async fn cancel_booking(store: &Store, id: u64) -> Result<bool> {
    let removed = store.remove(CollectionKind::Bookings, id).await?;
    if removed {
        tracing::info!(booking = id, "booking removed");
    }
    Ok(removed)
}

/// Bookings for a host: tagged with their `hostId` or on a property they own
pub async fn bookings_for_host(store: &Store, host_id: u64) -> Result<Vec<Record>> {
    let owned = owned_property_ids(store, host_id).await?;
    store
        .find_all(CollectionKind::Bookings, |r| {
            r.get_id(HOST_ID) == Some(host_id)
                || r.get_id(PROPERTY_ID).is_some_and(|p| owned.contains(&p))
        })
        .await
}

/// Bookings made by one guest
pub async fn bookings_for_user(store: &Store, user_id: u64) -> Result<Vec<Record>> {
    store
        .find_all(CollectionKind::Bookings, |r| r.get_id(USER_ID) == Some(user_id))
        .await
}

/// Total of `nights * pricePerDay` over a host's active bookings
///
/// Only bookings on properties the host owns are priced; bookings with
/// unreadable dates are left out.
pub async fn host_revenue(store: &Store, host_id: u64) -> Result<f64> {
    let properties = store.load(CollectionKind::Properties).await?;
    let bookings = store.load(CollectionKind::Bookings).await?;

    let total = bookings
        .records()
        .iter()
        .filter_map(|r| Booking::from_record(r).ok())
        .filter(|b| b.active)
        .filter_map(|b| {
            let listing = properties.get(b.property_id)?;
            if listing.get_id(property::OWNER_ID) != Some(host_id) {
                return None;
            }
            let price = listing.get(property::PRICE_PER_DAY).and_then(Value::as_f64)?;
            Some(b.stay.nights() as f64 * price)
        })
        .sum();
    Ok(total)
}

/// Bookings a party can raise a complaint about on `today`
///
/// Eligible stays have started and ended at most
/// [`COMPLAINT_WINDOW_DAYS`] days ago. Bookings with unreadable dates are
/// left out.
pub async fn eligible_bookings(store: &Store, user_id: u64, party: Party, today: NaiveDate) -> Result<Vec<Record>> {
    store
        .find_all(CollectionKind::Bookings, |r| {
            r.get_id(party.field()) == Some(user_id)
                && Booking::from_record(r).is_ok_and(|b| within_complaint_window(&b.stay, today))
        })
        .await
}

fn within_complaint_window(stay: &DateRange, today: NaiveDate) -> bool {
    let window_end = stay
        .check_out()
        .checked_add_days(Days::new(COMPLAINT_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MAX);
    stay.check_in() <= today && today <= window_end
}

/// Whether an active booking of `property_id` has a stay matching `matches`
///
/// Active bookings whose dates cannot be read always match.
pub(crate) fn active_stay_matches<F>(bookings: &Collection, property_id: u64, matches: F) -> bool
where
    F: Fn(&DateRange) -> bool,
{
    bookings
        .records()
        .iter()
        .filter(|r| r.get_id(PROPERTY_ID) == Some(property_id) && r.get_bool(STATUS) == Some(true))
        .any(|r| match Booking::from_record(r) {
            Ok(b) => matches(&b.stay),
            Err(_) => true,
        })
}

async fn owned_property_ids(store: &Store, owner: u64) -> Result<HashSet<u64>> {
    let properties = store.load(CollectionKind::Properties).await?;
    Ok(properties
        .find_all(|p| p.get_id(property::OWNER_ID) == Some(owner))
        .map(|p| p.id)
        .collect())
}
