//! Core domain model for jobtrail: contact stamps, date windows, and records.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "jobtrail-core";

/// Operator-facing timestamp format, shared by prompts, exports, and display.
pub const STAMP_FORMAT: &str = "%m/%d/%Y %H:%M";

/// Lexically sortable form used for the persisted column and range queries.
const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Error)]
pub enum StampError {
    #[error("invalid timestamp {text:?}, expected MM/DD/YYYY HH:MM")]
    Parse {
        text: String,
        #[source]
        source: chrono::ParseError,
    },
}

#[derive(Debug, Error)]
#[error("window start {start} is after end {end}")]
pub struct WindowError {
    pub start: ContactStamp,
    pub end: ContactStamp,
}

/// Minute-precision timestamp of a contact. Seconds and finer are discarded
/// on construction so equality and the natural key align with the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactStamp(NaiveDateTime);

impl ContactStamp {
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        let truncated = dt
            .with_second(0)
            .and_then(|d| d.with_nanosecond(0))
            .unwrap_or(dt);
        Self(truncated)
    }

    /// Parses the operator wire format `MM/DD/YYYY HH:MM`.
    pub fn parse(text: &str) -> Result<Self, StampError> {
        NaiveDateTime::parse_from_str(text.trim(), STAMP_FORMAT)
            .map(Self::from_datetime)
            .map_err(|source| StampError::Parse {
                text: text.to_string(),
                source,
            })
    }

    /// Sortable `YYYY-MM-DD HH:MM` text; the only form that reaches SQL, so
    /// BETWEEN and ORDER BY compare in real timestamp order.
    pub fn storage_key(&self) -> String {
        self.0.format(STORAGE_FORMAT).to_string()
    }

    /// Parses the persisted `storage_key` form back into a stamp.
    pub fn from_storage_key(text: &str) -> Result<Self, StampError> {
        NaiveDateTime::parse_from_str(text, STORAGE_FORMAT)
            .map(Self::from_datetime)
            .map_err(|source| StampError::Parse {
                text: text.to_string(),
                source,
            })
    }

    pub fn as_datetime(&self) -> NaiveDateTime {
        self.0
    }
}

impl std::fmt::Display for ContactStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(STAMP_FORMAT))
    }
}

/// Closed interval `[start, end]` bounding both ingestion and review queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    start: ContactStamp,
    end: ContactStamp,
}

impl DateWindow {
    /// Rejects reversed bounds rather than swapping or silently matching
    /// nothing; the operator typed the window, so tell them.
    pub fn new(start: ContactStamp, end: ContactStamp) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> ContactStamp {
        self.start
    }

    pub fn end(&self) -> ContactStamp {
        self.end
    }

    /// Inclusive on both bounds.
    pub fn contains(&self, stamp: ContactStamp) -> bool {
        self.start <= stamp && stamp <= self.end
    }
}

/// One inbox message inside the window, before the operator has ruled on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageItem {
    pub received_at: ContactStamp,
    pub sender_address: String,
    pub subject: String,
    pub body: String,
}

/// Canonical persisted contact entry. The four-field tuple is the natural
/// key; the store never holds two rows with an identical tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub date_of_contact: ContactStamp,
    pub sender_address: String,
    pub subject: String,
    pub body: String,
}

impl From<MessageItem> for ContactRecord {
    fn from(item: MessageItem) -> Self {
        Self {
            date_of_contact: item.received_at,
            sender_address: item.sender_address,
            subject: item.subject,
            body: item.body,
        }
    }
}
