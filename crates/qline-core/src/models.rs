//! Data models for qline
//!
//! Defines the wire and state structures: Queue, Member, User and the
//! response envelopes of the queue service.
//!
//! Identifiers are kept as strings. The service may send them as JSON
//! integers or strings; both deserialize to the same id.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(IdVisitor).map(Self)
            }
        }
    };
}

string_id!(
    /// Identifier of a queue
    QueueId
);
string_id!(
    /// Identifier of one membership entry inside a queue
    EntryId
);
string_id!(
    /// Identifier of a user
    UserId
);

/// Accepts a JSON string or integer as an id
struct IdVisitor;

impl Visitor<'_> for IdVisitor {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or integer identifier")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
        Ok(v.to_string())
    }
}

/// One user's place in a queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "MemberRecord")]
pub struct Member {
    /// Entry identifier (the service also calls it `id`)
    pub entry_id: EntryId,
    /// Owning user
    pub user_id: UserId,
    /// When the user joined
    pub timestamp: DateTime<Utc>,
}

/// Member row as received; `entry_id` wins over the row `id`
#[derive(Deserialize)]
struct MemberRecord {
    entry_id: Option<EntryId>,
    id: Option<EntryId>,
    user_id: UserId,
    #[serde(deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
}

impl TryFrom<MemberRecord> for Member {
    type Error = String;

    fn try_from(record: MemberRecord) -> Result<Self, Self::Error> {
        let entry_id = record
            .entry_id
            .or(record.id)
            .ok_or_else(|| "member has neither `entry_id` nor `id`".to_string())?;
        Ok(Self {
            entry_id,
            user_id: record.user_id,
            timestamp: record.timestamp,
        })
    }
}

/// A named waiting queue; member order is the queue order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Queue {
    pub id: QueueId,
    pub name: String,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl Queue {
    /// Number of members currently waiting
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Find the entry owned by a user
    pub fn entry_of(&self, user_id: &UserId) -> Option<&Member> {
        self.members.iter().find(|m| &m.user_id == user_id)
    }

    /// Find an entry by its id
    pub fn entry(&self, entry_id: &EntryId) -> Option<&Member> {
        self.members.iter().find(|m| &m.entry_id == entry_id)
    }

    /// 1-based position of an entry
    pub fn position_of(&self, entry_id: &EntryId) -> Option<usize> {
        self.members
            .iter()
            .position(|m| &m.entry_id == entry_id)
            .map(|i| i + 1)
    }
}

/// The authenticated user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Payload of a queue creation response
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedQueue {
    pub queue_id: QueueId,
}

/// Payload of a join response
#[derive(Debug, Clone, Deserialize)]
pub struct JoinedQueue {
    pub entry_id: EntryId,
}

/// Result of an authentication check
#[derive(Debug, Clone, PartialEq)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub user: Option<User>,
}

impl AuthStatus {
    /// Interpret an authcheck body
    ///
    /// Accepts `{ auth, data?: User }` as well as `{ data: { auth } }`.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let data = value.get("data").filter(|d| !d.is_null());
        let authenticated = value
            .get("auth")
            .and_then(|a| a.as_bool())
            .or_else(|| data.and_then(|d| d.get("auth")).and_then(|a| a.as_bool()))
            .unwrap_or(false);
        let user = data.and_then(|d| serde_json::from_value::<User>(d.clone()).ok());

        Self {
            authenticated,
            user,
        }
    }
}

/// A push notification that a queue changed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueUpdate {
    #[serde(rename = "queueId")]
    pub queue_id: QueueId,
}

/// Parse a timestamp in RFC 3339 or SQLite `CURRENT_TIMESTAMP` form (UTC)
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw)))
}
