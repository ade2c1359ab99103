//! Database row types: these map directly to SQLite rows.
//! Distinct from murmur-types models to keep the DB layer independent.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use uuid::Uuid;

use murmur_types::models::{ChatMessage, User, UserRef};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub receiver_id: String,
    pub receiver_username: String,
    pub body: String,
    pub created_at: String,
    pub seen: bool,
}

impl UserRow {
    pub fn into_model(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id)?,
            created_at: parse_timestamp(&self.created_at)?,
            username: self.username,
        })
    }
}

impl MessageRow {
    pub fn into_model(self) -> Result<ChatMessage> {
        Ok(ChatMessage {
            id: parse_id(&self.id)?,
            sender: UserRef {
                id: parse_id(&self.sender_id)?,
                username: self.sender_username,
            },
            receiver: UserRef {
                id: parse_id(&self.receiver_id)?,
                username: self.receiver_username,
            },
            message: self.body,
            timestamp: parse_timestamp(&self.created_at)?,
            seen: self.seen,
        })
    }
}

/// Format used for every timestamp this crate writes. Fixed width, so
/// lexicographic order in SQL is chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts both RFC 3339 and SQLite's `datetime('now')` output
/// ("YYYY-MM-DD HH:MM:SS", implicitly UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("Corrupt timestamp '{}'", raw))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("Corrupt id '{}'", raw))
}
