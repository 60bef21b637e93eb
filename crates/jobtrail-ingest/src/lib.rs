//! Interactive review loop and post-load replay for jobtrail.

use anyhow::Result;
use jobtrail_core::{ContactRecord, DateWindow, MessageItem};
use jobtrail_storage::{ContactStore, LoadSession};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

pub const CRATE_NAME: &str = "jobtrail-ingest";

/// One operator ruling on a presented candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Load,
    Skip,
    Quit,
}

impl Decision {
    /// Case-insensitive token classes. Anything unrecognized is `None`: the
    /// loop advances without action, same as the reference behavior.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "l" | "load" => Some(Self::Load),
            "s" | "skip" => Some(Self::Skip),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Operator-facing console. Implementations own presentation and blocking
/// input; the controller only sees the raw response line.
pub trait OperatorConsole {
    /// Present a candidate (received time, sender, subject) and return the
    /// operator's decision line.
    fn prompt_decision(&mut self, item: &MessageItem) -> Result<String>;

    /// Present one stored record during replay and return the operator's
    /// advance-or-quit line.
    fn prompt_next(&mut self, record: &ContactRecord) -> Result<String>;
}

/// Outcome counters for one review pass. `attempted_loads` counts operator
/// load decisions, not successful inserts; duplicates are attempts too.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    pub run_id: Uuid,
    pub presented: usize,
    pub attempted_loads: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub unrecognized: usize,
    pub quit_early: bool,
}

impl ReviewSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            presented: 0,
            attempted_loads: 0,
            inserted: 0,
            duplicates: 0,
            skipped: 0,
            unrecognized: 0,
            quit_early: false,
        }
    }
}

/// Drives the decision loop over the filtered items. On quit, iteration
/// stops immediately: later items are never presented, loaded, or skipped.
/// A sink failure propagates and aborts the pass; nothing is retried.
pub async fn review_items(
    session: &mut LoadSession,
    console: &mut dyn OperatorConsole,
    items: &[MessageItem],
) -> Result<ReviewSummary> {
    let run_id = Uuid::new_v4();
    let mut summary = ReviewSummary::new(run_id);
    info!(%run_id, candidates = items.len(), "starting review pass");

    for item in items {
        summary.presented += 1;
        let line = console.prompt_decision(item)?;
        match Decision::parse(&line) {
            Some(Decision::Load) => {
                let record = ContactRecord::from(item.clone());
                let inserted = session.insert_if_absent(&record).await?;
                summary.attempted_loads += 1;
                if inserted {
                    summary.inserted += 1;
                } else {
                    summary.duplicates += 1;
                }
            }
            Some(Decision::Skip) => summary.skipped += 1,
            Some(Decision::Quit) => {
                summary.quit_early = true;
                break;
            }
            None => {
                debug!(%run_id, input = line.trim(), "unrecognized input, advancing");
                summary.unrecognized += 1;
            }
        }
    }

    info!(
        %run_id,
        presented = summary.presented,
        attempted = summary.attempted_loads,
        inserted = summary.inserted,
        "review pass finished"
    );
    Ok(summary)
}

/// Replays stored records in the window, most recent first, one at a time.
/// A literal `q` (any case) halts; any other input advances. Returns how
/// many records were shown. Never mutates the store.
pub async fn replay_window(
    store: &ContactStore,
    console: &mut dyn OperatorConsole,
    window: &DateWindow,
) -> Result<usize> {
    let records = store.contacts_in_window(window).await?;
    let mut shown = 0usize;
    for record in &records {
        shown += 1;
        let line = console.prompt_next(record)?;
        if line.trim().eq_ignore_ascii_case("q") {
            break;
        }
    }
    Ok(shown)
}
