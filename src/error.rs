//! Error types for rentdb
//!
//! Rejected operations (not found, conflicts, validation) are ordinary
//! outcomes callers branch on; only `StorageUnavailable` means the store
//! itself is in trouble.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for rentdb operations
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Storage Errors
    // ==========================================================================
    #[error("Storage unavailable at '{path}': {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize collection '{collection}': {message}")]
    SerializeFailed {
        collection: &'static str,
        message: String,
    },

    // ==========================================================================
    // Record Errors
    // ==========================================================================
    #[error("Record {id} not found in collection '{collection}'")]
    NotFound { collection: &'static str, id: u64 },

    #[error("{what} '{value}' already exists in collection '{collection}'")]
    AlreadyExists {
        collection: &'static str,
        what: &'static str,
        value: String,
    },

    #[error("User {requester} does not own record {id} in collection '{collection}'")]
    NotOwner {
        collection: &'static str,
        id: u64,
        requester: u64,
    },

    // ==========================================================================
    // Booking Errors
    // ==========================================================================
    #[error(
        "Property {property_id} is already booked between {check_in} and {check_out} (booking {existing})"
    )]
    BookingConflict {
        property_id: u64,
        check_in: NaiveDate,
        check_out: NaiveDate,
        existing: u64,
    },

    // ==========================================================================
    // Property Errors
    // ==========================================================================
    #[error("Property {property_id} has been deleted")]
    PropertyUnavailable { property_id: u64 },

    #[error("Property {property_id} has active or future bookings")]
    PropertyHasBookings { property_id: u64 },

    #[error("Property {property_id} is occupied today")]
    PropertyOccupied { property_id: u64 },

    // ==========================================================================
    // Validation Errors
    // ==========================================================================
    #[error(transparent)]
    Validation(#[from] crate::validation::ValidationError),

    // ==========================================================================
    // Config Errors
    // ==========================================================================
    #[error("Invalid config '{path}': {message}")]
    Config { path: PathBuf, message: String },

    // ==========================================================================
    // Catch-all
    // ==========================================================================
    #[error("{0}")]
    Other(String),
}

/// Result type alias for rentdb operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an I/O failure on a collection file
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::StorageUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Returns a user-friendly suggestion for fixing the error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::StorageUnavailable { .. } => {
                Some("Check that the data directory exists and is writable")
            }
            Error::BookingConflict { .. } => Some("Pick dates that do not touch an existing stay"),
            Error::PropertyHasBookings { .. } => {
                Some("Cancel or wait out the remaining bookings before deleting")
            }
            Error::PropertyOccupied { .. } => Some("Edit the listing after the current stay ends"),
            Error::Validation(_) => Some("Dates must be YYYY-MM-DD with check-in on or before check-out"),
            _ => None,
        }
    }

    /// Returns true if this error is an expected, rejected-operation outcome
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. }
                | Error::AlreadyExists { .. }
                | Error::NotOwner { .. }
                | Error::BookingConflict { .. }
                | Error::PropertyUnavailable { .. }
                | Error::PropertyHasBookings { .. }
                | Error::PropertyOccupied { .. }
                | Error::Validation(_)
        )
    }
}
