//! Message source contract + mailbox-export adapter implementations.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use jobtrail_core::{ContactStamp, DateWindow, MessageItem, StampError};
use serde::Deserialize;
use thiserror::Error;

pub const CRATE_NAME: &str = "jobtrail-adapters";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("message timestamp: {0}")]
    Stamp(#[from] StampError),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// An ordered, finite source of inbox messages, restricted to a date window
/// by inclusive comparison on the received time. Implementations sort
/// ascending by received time so a run over the same window is reproducible.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn list_items(&self, window: &DateWindow) -> Result<Vec<MessageItem>, SourceError>;
}

/// Wire shape of one entry in a mailbox export file. The received time uses
/// the operator format `MM/DD/YYYY HH:MM`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportEntry {
    pub received_at: String,
    pub sender_address: String,
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

/// Adapter over a local mailbox export: a JSON array of [`ExportEntry`]
/// values, produced by whatever mail client the operator uses.
#[derive(Debug, Clone)]
pub struct MailboxExport {
    path: PathBuf,
}

impl MailboxExport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load_entries(&self) -> Result<Vec<ExportEntry>, SourceError> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let entries: Vec<ExportEntry> = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(entries)
    }
}

#[async_trait]
impl MessageSource for MailboxExport {
    async fn list_items(&self, window: &DateWindow) -> Result<Vec<MessageItem>, SourceError> {
        let entries = self.load_entries()?;
        filter_entries(entries, window)
    }
}

fn filter_entries(
    entries: Vec<ExportEntry>,
    window: &DateWindow,
) -> Result<Vec<MessageItem>, SourceError> {
    let mut items = Vec::new();
    for entry in entries {
        let received_at = ContactStamp::parse(&entry.received_at)?;
        if !window.contains(received_at) {
            continue;
        }
        items.push(MessageItem {
            received_at,
            sender_address: entry.sender_address,
            subject: entry.subject,
            body: entry.body,
        });
    }
    items.sort_by_key(|item| item.received_at);
    Ok(items)
}

/// In-memory source for tests and fixtures. Applies the same window filter
/// and ordering as the file-backed adapter.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    items: Vec<MessageItem>,
}

impl StaticSource {
    pub fn new(items: Vec<MessageItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl MessageSource for StaticSource {
    async fn list_items(&self, window: &DateWindow) -> Result<Vec<MessageItem>, SourceError> {
        let mut items: Vec<MessageItem> = self
            .items
            .iter()
            .filter(|item| window.contains(item.received_at))
            .cloned()
            .collect();
        items.sort_by_key(|item| item.received_at);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn stamp(text: &str) -> ContactStamp {
        ContactStamp::parse(text).expect("stamp")
    }

    fn window(start: &str, end: &str) -> DateWindow {
        DateWindow::new(stamp(start), stamp(end)).expect("window")
    }

    fn entry(received: &str, sender: &str) -> ExportEntry {
        ExportEntry {
            received_at: received.to_string(),
            sender_address: sender.to_string(),
            subject: "Application received".to_string(),
            body: "Thanks.".to_string(),
        }
    }

    #[test]
    fn filtering_is_inclusive_at_both_bounds() {
        let entries = vec![
            entry("12/31/2023 23:59", "before@x.test"),
            entry("01/01/2024 00:00", "start@x.test"),
            entry("01/31/2024 23:59", "end@x.test"),
            entry("02/01/2024 00:00", "after@x.test"),
        ];
        let items = filter_entries(entries, &window("01/01/2024 00:00", "01/31/2024 23:59"))
            .expect("filter");
        let senders: Vec<_> = items.iter().map(|i| i.sender_address.as_str()).collect();
        assert_eq!(senders, vec!["start@x.test", "end@x.test"]);
    }

    #[test]
    fn items_are_sorted_ascending_by_received_time() {
        let entries = vec![
            entry("01/20/2024 10:00", "late@x.test"),
            entry("01/05/2024 10:00", "early@x.test"),
            entry("01/10/2024 10:00", "mid@x.test"),
        ];
        let items = filter_entries(entries, &window("01/01/2024 00:00", "01/31/2024 23:59"))
            .expect("filter");
        let senders: Vec<_> = items.iter().map(|i| i.sender_address.as_str()).collect();
        assert_eq!(senders, vec!["early@x.test", "mid@x.test", "late@x.test"]);
    }

    #[test]
    fn malformed_received_time_is_fatal() {
        let entries = vec![entry("January 5, 2024", "bad@x.test")];
        let err = filter_entries(entries, &window("01/01/2024 00:00", "01/31/2024 23:59"))
            .expect_err("malformed");
        assert!(matches!(err, SourceError::Stamp(_)));
    }

    #[tokio::test]
    async fn export_file_round_trips_through_the_adapter() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"[
                {{"received_at": "01/15/2024 09:05", "sender_address": "jobs@acme.test",
                  "subject": "Application received", "body": "Thanks for applying."}},
                {{"received_at": "03/02/2024 08:00", "sender_address": "noreply@other.test",
                  "subject": "Newsletter"}}
            ]"#
        )
        .expect("write");

        let source = MailboxExport::new(file.path());
        let items = source
            .list_items(&window("01/01/2024 00:00", "01/31/2024 23:59"))
            .await
            .expect("list");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sender_address, "jobs@acme.test");
        assert_eq!(items[0].body, "Thanks for applying.");
    }

    #[tokio::test]
    async fn missing_export_file_is_an_error() {
        let source = MailboxExport::new("/nonexistent/export.json");
        let err = source
            .list_items(&window("01/01/2024 00:00", "01/31/2024 23:59"))
            .await
            .expect_err("missing file");
        assert!(err.to_string().contains("export.json"));
    }
}
