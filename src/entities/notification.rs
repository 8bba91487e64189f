//! Notifications delivered to users

use crate::error::Result;
use crate::storage::collection::CollectionKind;
use crate::storage::record::{Fields, Record};
use crate::validation::{format_date, ValidationError};
use crate::Store;
use chrono::NaiveDate;

pub const USER_ID: &str = "userId";
pub const IS_READ: &str = "isRead";

#[derive(Debug, Clone, Default)]
pub struct NewNotification {
    pub user_id: u64,
    pub title: String,
    pub message: String,
    /// Defaults to `general`
    pub kind: Option<String>,
    pub target: Option<String>,
    /// Defaults to `user-<user_id>`
    pub created_by: Option<String>,
}

pub async fn create_notification(
    store: &Store,
    notification: NewNotification,
    today: NaiveDate,
) -> Result<Record> {
    if notification.title.trim().is_empty() {
        return Err(ValidationError::MissingField("notificationTitle").into());
    }
    if notification.message.trim().is_empty() {
        return Err(ValidationError::MissingField("message").into());
    }

    let created_by = notification
        .created_by
        .unwrap_or_else(|| format!("user-{}", notification.user_id));

    let mut fields = Fields::new();
    fields.insert(USER_ID.into(), notification.user_id.into());
    fields.insert("notificationTitle".into(), notification.title.into());
    fields.insert("message".into(), notification.message.into());
    fields.insert(
        "notificationType".into(),
        notification.kind.unwrap_or_else(|| "general".into()).into(),
    );
    fields.insert("target".into(), notification.target.unwrap_or_default().into());
    fields.insert("createdBy".into(), created_by.into());
    fields.insert("createdOn".into(), format_date(today).into());
    fields.insert(IS_READ.into(), false.into());
    fields.insert("readOn".into(), "".into());

    store.insert(CollectionKind::Notifications, fields).await
}

pub async fn mark_read(store: &Store, id: u64, today: NaiveDate) -> Result<Record> {
    store
        .update(CollectionKind::Notifications, id, |fields| {
            fields.insert(IS_READ.into(), true.into());
            fields.insert("readOn".into(), format_date(today).into());
        })
        .await
}

/// Hard delete; `false` if it did not exist
pub async fn delete_notification(store: &Store, id: u64) -> Result<bool> {
    store.remove(CollectionKind::Notifications, id).await
}

/// Notifications for one user, unread only if asked
pub async fn notifications_for_user(store: &Store, user_id: u64, unread_only: bool) -> Result<Vec<Record>> {
    store
        .find_all(CollectionKind::Notifications, |n| {
            n.get_id(USER_ID) == Some(user_id) && !(unread_only && n.get_bool(IS_READ) == Some(true))
        })
        .await
}
