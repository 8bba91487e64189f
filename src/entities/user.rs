//! Users
//!
//! Usernames are stored cleaned (no whitespace, lowercase) and are unique;
//! the uniqueness check runs inside the users write section. Password and
//! security-answer hashes are opaque payload produced by the caller.

use crate::error::{Error, Result};
use crate::storage::collection::{Collection, CollectionKind};
use crate::storage::record::{Fields, Record};
use crate::validation::{clean_username, ValidationError};
use crate::Store;
use serde_json::Value;

pub const USERNAME: &str = "username";
pub const STATUS: &str = "status";
pub const ROLE: &str = "role";

/// Account state; none of these remove the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Blocked,
    Deleted,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "Active",
            UserStatus::Blocked => "Blocked",
            UserStatus::Deleted => "Deleted",
        }
    }

    /// Case-insensitive; unknown strings are `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(UserStatus::Active),
            "blocked" => Some(UserStatus::Blocked),
            "deleted" => Some(UserStatus::Deleted),
            _ => None,
        }
    }

    pub fn of(record: &Record) -> Option<Self> {
        record.get_str(STATUS).and_then(Self::parse)
    }
}

/// Create a user from a signup payload
///
/// `username` is required. New accounts are `Active` with role `user`
/// unless the payload says otherwise.
pub async fn create_user(store: &Store, mut fields: Fields) -> Result<Record> {
    let username = fields
        .get(USERNAME)
        .and_then(Value::as_str)
        .map(clean_username)
        .filter(|name| !name.is_empty())
        .ok_or(ValidationError::MissingField(USERNAME))?;

    fields.insert(USERNAME.to_string(), username.clone().into());
    fields
        .entry(STATUS)
        .or_insert_with(|| UserStatus::Active.as_str().into());
    fields.entry(ROLE).or_insert_with(|| "user".into());

    store
        .with_exclusive_write(CollectionKind::Users, move |users| {
            if find_username(users, &username).is_some() {
                return Err(Error::AlreadyExists {
                    collection: CollectionKind::Users.name(),
                    what: "Username",
                    value: username,
                });
            }
            Ok(users.insert(Record::new(fields)).clone())
        })
        .await
}

/// Find a user by (uncleaned) username
pub async fn find_by_username(store: &Store, username: &str) -> Result<Option<Record>> {
    let wanted = clean_username(username);
    let users = store.load(CollectionKind::Users).await?;
    let found = find_username(&users, &wanted).cloned();
    Ok(found)
}

fn find_username<'a>(users: &'a Collection, cleaned: &str) -> Option<&'a Record> {
    users
        .records()
        .iter()
        .find(|u| u.get_str(USERNAME).map(clean_username).as_deref() == Some(cleaned))
}

/// Block, unblock or soft-delete a user
pub async fn set_user_status(store: &Store, id: u64, status: UserStatus) -> Result<Record> {
    store
        .mark_status(CollectionKind::Users, id, STATUS, status.as_str())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(UserStatus::parse("Blocked"), Some(UserStatus::Blocked));
        assert_eq!(UserStatus::parse("DELETED"), Some(UserStatus::Deleted));
        assert_eq!(UserStatus::parse("active "), Some(UserStatus::Active));
        assert_eq!(UserStatus::parse("suspended"), None);
    }

    #[test]
    fn test_find_username_compares_cleaned_names() {
        let mut users = Collection::empty(CollectionKind::Users);
        users.insert(Record::new(Fields::new()));
        let mut ravi = Record::new(Fields::new());
        ravi.set(USERNAME, "Ravi K");
        let id = users.insert(ravi).id;

        assert_eq!(find_username(&users, "ravik").map(|u| u.id), Some(id));
        assert!(find_username(&users, "ravi").is_none());
    }

    #[tokio::test]
    async fn test_find_by_username_reads_latest_snapshot() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = Store::open_dir(tmp.path()).await.unwrap();
        assert!(find_by_username(&store, "asha").await.unwrap().is_none());

        let mut fields = Fields::new();
        fields.insert(USERNAME.into(), "Asha".into());
        let created = create_user(&store, fields).await.unwrap();

        let found = find_by_username(&store, " ASHA ").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
    }

    #[test]
    fn test_status_of_record() {
        let mut record = Record::new(Fields::new());
        assert_eq!(UserStatus::of(&record), None);
        record.set(STATUS, "blocked");
        assert_eq!(UserStatus::of(&record), Some(UserStatus::Blocked));
    }
}
