//! Entity operations built on the generic store
//!
//! Each module knows the field names of one collection and which of
//! `mark_status` (soft) or `remove` (hard) its delete means:
//!
//! | Entity        | Delete                                      |
//! |---------------|---------------------------------------------|
//! | bookings      | soft (`bookingStatus = false`) or hard      |
//! | properties    | soft (`propertyStatus = DELETED`)           |
//! | users         | soft (`status = Deleted`)                   |
//! | complaints    | soft (`complaintStatus = deleted`)          |
//! | notifications | hard                                        |

pub mod booking;
pub mod complaint;
pub mod notification;
pub mod property;
pub mod user;
