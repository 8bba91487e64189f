//! Complaints raised by guests or hosts against a booking

use super::booking::Party;
use crate::error::{Error, Result};
use crate::storage::collection::CollectionKind;
use crate::storage::record::{Fields, Record};
use crate::validation::{format_date, parse_stored_date, ValidationError};
use crate::Store;
use chrono::NaiveDate;

pub const BOOKING_ID: &str = "bookingId";
pub const USER_ID: &str = "userId";
pub const STATUS: &str = "complaintStatus";
pub const RAISED_BY: &str = "clientOrHost";
pub const CREATED_ON: &str = "createdOn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplaintStatus {
    Active,
    Closed,
    Deleted,
}

impl ComplaintStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ComplaintStatus::Active => "active",
            ComplaintStatus::Closed => "closed",
            ComplaintStatus::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub booking_id: u64,
    pub user_id: u64,
    /// `client` or `host`
    pub raised_by: String,
    pub description: String,
}

pub async fn create_complaint(store: &Store, complaint: NewComplaint, today: NaiveDate) -> Result<Record> {
    let description = complaint.description.trim();
    if description.is_empty() {
        return Err(ValidationError::MissingField("complaintDescription").into());
    }

    let mut fields = Fields::new();
    fields.insert(BOOKING_ID.into(), complaint.booking_id.into());
    fields.insert(USER_ID.into(), complaint.user_id.into());
    fields.insert(RAISED_BY.into(), complaint.raised_by.to_lowercase().into());
    fields.insert("complaintDescription".into(), description.into());
    fields.insert(STATUS.into(), ComplaintStatus::Active.as_str().into());
    fields.insert(CREATED_ON.into(), format_date(today).into());
    fields.insert("resolvedOn".into(), "".into());

    store.insert(CollectionKind::Complaints, fields).await
}

/// Close a complaint and stamp the resolution date
pub async fn resolve_complaint(store: &Store, id: u64, today: NaiveDate) -> Result<Record> {
    store
        .update(CollectionKind::Complaints, id, |fields| {
            fields.insert(STATUS.into(), ComplaintStatus::Closed.as_str().into());
            fields.insert("resolvedOn".into(), format_date(today).into());
        })
        .await
}

/// Soft-delete a complaint; only the user who raised it may
pub async fn delete_complaint(store: &Store, id: u64, requester: u64) -> Result<Record> {
    store
        .with_exclusive_write(CollectionKind::Complaints, |complaints| {
            let complaint = complaints.get(id).ok_or(Error::NotFound {
                collection: CollectionKind::Complaints.name(),
                id,
            })?;
            if complaint.get_id(USER_ID) != Some(requester) {
                return Err(Error::NotOwner {
                    collection: CollectionKind::Complaints.name(),
                    id,
                    requester,
                });
            }
            complaints
                .mark_status(id, STATUS, ComplaintStatus::Deleted.as_str())
                .cloned()
        })
        .await
}

/// Narrows [`list_complaints`]; the default matches every complaint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplaintFilter {
    pub raised_by: Option<Party>,
    /// First `createdOn` day included
    pub from: Option<NaiveDate>,
    /// Last `createdOn` day included
    pub to: Option<NaiveDate>,
}

impl ComplaintFilter {
    pub fn matches(&self, complaint: &Record) -> bool {
        if let Some(party) = self.raised_by {
            let raised_by = complaint.get_str(RAISED_BY).and_then(Party::parse);
            if raised_by != Some(party) {
                return false;
            }
        }
        if self.from.is_none() && self.to.is_none() {
            return true;
        }
        // A date filter cannot place a complaint without a readable date
        let Some(created) = complaint.get_str(CREATED_ON).and_then(|d| parse_stored_date(d).ok()) else {
            return false;
        };
        self.from.map_or(true, |from| created >= from) && self.to.map_or(true, |to| created <= to)
    }
}

/// Complaints matching `filter`, deleted ones included
pub async fn list_complaints(store: &Store, filter: &ComplaintFilter) -> Result<Vec<Record>> {
    store
        .find_all(CollectionKind::Complaints, |c| filter.matches(c))
        .await
}
