//! Booking overlap validation
//!
//! Stays are closed date intervals: a guest checking out on the 15th and
//! another checking in on the 15th overlap. Two stays `[ci1, co1]` and
//! `[ci2, co2]` conflict iff `ci1 <= co2 && ci2 <= co1`.
//!
//! Only active bookings (`bookingStatus == true`) of the same property take
//! part. Stored dates may be full ISO timestamps; their calendar day is used. The check must run against the bookings snapshot loaded inside the
//! write section that inserts the new booking; validating outside it lets two
//! conflicting requests both pass.

use crate::entities::booking::{self, Booking};
use crate::storage::collection::{Collection, CollectionKind};
use crate::storage::record::Record;
use crate::validation::{parse_date, ValidationError};
use chrono::NaiveDate;

/// A closed interval of calendar days with `check_in <= check_out`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl DateRange {
    /// Reject inverted ranges instead of swapping them
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, ValidationError> {
        if check_in > check_out {
            return Err(ValidationError::InvertedRange {
                check_in,
                check_out,
            });
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    /// Parse two `YYYY-MM-DD` strings
    pub fn parse(check_in: &str, check_out: &str) -> Result<Self, ValidationError> {
        Self::new(parse_date(check_in)?, parse_date(check_out)?)
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.check_in <= other.check_out && other.check_in <= self.check_out
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.check_in <= day && day <= self.check_out
    }

    /// Billable nights; a same-day stay counts as one
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days().max(1)
    }
}

/// First active booking of `property_id` overlapping `stay`, if any
///
/// `exclude` skips one booking, used when re-validating a booking against
/// everything but its own previous dates. An active booking of the same
/// property whose dates cannot be read blocks every stay: its interval is
/// unknown, so no stay can be shown to be free of it.
pub fn find_conflict<'a>(
    bookings: &'a Collection,
    property_id: u64,
    stay: &DateRange,
    exclude: Option<u64>,
) -> Option<&'a Record> {
    debug_assert_eq!(bookings.kind(), CollectionKind::Bookings);

    bookings
        .find_all(move |record| Some(record.id) != exclude)
        .find(|record| match Booking::from_record(record) {
            Ok(existing) => {
                existing.property_id == property_id && existing.active && existing.stay.overlaps(stay)
            }
            Err(reason) => {
                let blocks = record.get_id(booking::PROPERTY_ID) == Some(property_id)
                    && record.get_bool(booking::STATUS) == Some(true);
                if blocks {
                    tracing::warn!(booking = record.id, %reason, "unreadable active booking blocks property");
                }
                blocks
            }
        })
}

/// Whether any active booking of `property_id` overlaps `stay`
pub fn has_conflict(
    bookings: &Collection,
    property_id: u64,
    stay: &DateRange,
    exclude: Option<u64>,
) -> bool {
    find_conflict(bookings, property_id, stay, exclude).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::record::Fields;
    use serde_json::json;

    fn day(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn range(ci: &str, co: &str) -> DateRange {
        DateRange::parse(ci, co).unwrap()
    }

    fn booking(property_id: u64, ci: &str, co: &str, active: bool) -> Record {
        let mut record = Record::new(Fields::new());
        record
            .set("propertyId", property_id)
            .set("userId", 10)
            .set("checkInDate", ci)
            .set("checkOutDate", co)
            .set("bookingStatus", active);
        record
    }

    /// Property 1 with one active booking [2024-06-10, 2024-06-15]
    fn existing() -> (Collection, u64) {
        let mut bookings = Collection::empty(CollectionKind::Bookings);
        let id = bookings.insert(booking(1, "2024-06-10", "2024-06-15", true)).id;
        (bookings, id)
    }

    #[test]
    fn test_rejects_inverted_range() {
        let err = DateRange::new(day("2024-06-15"), day("2024-06-10")).unwrap_err();
        assert!(matches!(err, ValidationError::InvertedRange { .. }));
        assert!(DateRange::new(day("2024-06-10"), day("2024-06-10")).is_ok());
    }

    #[test]
    fn test_shared_checkout_day_conflicts() {
        let (bookings, _) = existing();
        assert!(has_conflict(&bookings, 1, &range("2024-06-15", "2024-06-20"), None));
    }

    #[test]
    fn test_day_after_checkout_is_free() {
        let (bookings, _) = existing();
        assert!(!has_conflict(&bookings, 1, &range("2024-06-16", "2024-06-20"), None));
    }

    #[test]
    fn test_day_before_checkin_is_free() {
        let (bookings, _) = existing();
        assert!(!has_conflict(&bookings, 1, &range("2024-06-01", "2024-06-09"), None));
    }

    #[test]
    fn test_shared_checkin_day_conflicts() {
        let (bookings, _) = existing();
        assert!(has_conflict(&bookings, 1, &range("2024-06-01", "2024-06-10"), None));
    }

    #[test]
    fn test_excluded_booking_is_skipped() {
        let (bookings, id) = existing();
        assert!(!has_conflict(&bookings, 1, &range("2024-06-10", "2024-06-15"), Some(id)));
    }

    #[test]
    fn test_containing_and_contained_ranges_conflict() {
        let (bookings, _) = existing();
        assert!(has_conflict(&bookings, 1, &range("2024-06-01", "2024-06-30"), None));
        assert!(has_conflict(&bookings, 1, &range("2024-06-12", "2024-06-12"), None));
    }

    #[test]
    fn test_other_property_and_cancelled_do_not_block() {
        let mut bookings = Collection::empty(CollectionKind::Bookings);
        bookings.insert(booking(2, "2024-06-10", "2024-06-15", true));
        bookings.insert(booking(1, "2024-06-10", "2024-06-15", false));

        assert!(!has_conflict(&bookings, 1, &range("2024-06-12", "2024-06-13"), None));
    }

    #[test]
    fn test_timestamp_dates_still_block() {
        let mut bookings = Collection::empty(CollectionKind::Bookings);
        bookings.insert(booking(1, "2024-06-10T00:00:00.000Z", "2024-06-15T00:00:00.000Z", true));

        assert!(has_conflict(&bookings, 1, &range("2024-06-12", "2024-06-13"), None));
        assert!(has_conflict(&bookings, 1, &range("2024-06-15", "2024-06-18"), None));
        assert!(!has_conflict(&bookings, 1, &range("2024-06-16", "2024-06-18"), None));
    }

    #[test]
    fn test_unreadable_active_booking_blocks_its_property() {
        let mut bookings = Collection::empty(CollectionKind::Bookings);
        let mut broken = booking(1, "soon", "later", true);
        broken.set("note", json!("imported"));
        let id = bookings.insert(broken).id;

        let hit = find_conflict(&bookings, 1, &range("2024-06-12", "2024-06-13"), None);
        assert_eq!(hit.map(|r| r.id), Some(id));
        // Only its own property, and only while active
        assert!(!has_conflict(&bookings, 2, &range("2024-06-12", "2024-06-13"), None));
        assert!(!has_conflict(&bookings, 1, &range("2024-06-12", "2024-06-13"), Some(id)));

        let mut inactive = Collection::empty(CollectionKind::Bookings);
        inactive.insert(booking(1, "soon", "later", false));
        assert!(!has_conflict(&inactive, 1, &range("2024-06-12", "2024-06-13"), None));
    }

    #[test]
    fn test_find_conflict_returns_blocking_booking() {
        let (mut bookings, _) = existing();
        let second = bookings.insert(booking(1, "2024-07-01", "2024-07-05", true)).id;

        let hit = find_conflict(&bookings, 1, &range("2024-07-05", "2024-07-08"), None).unwrap();
        assert_eq!(hit.id, second);
    }

    #[test]
    fn test_nights() {
        assert_eq!(range("2024-06-10", "2024-06-15").nights(), 5);
        assert_eq!(range("2024-06-10", "2024-06-10").nights(), 1);
    }
}
