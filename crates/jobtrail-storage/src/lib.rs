//! Relational store adapter + natural-key deduplication sink for jobtrail.

use std::path::Path;

use jobtrail_core::{ContactRecord, ContactStamp, DateWindow, StampError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use thiserror::Error;
use tracing::debug;

pub mod export;

pub const CRATE_NAME: &str = "jobtrail-storage";

/// No UNIQUE constraint on the natural key: uniqueness is enforced solely by
/// the guarded insert in [`LoadSession::insert_if_absent`].
const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS job_contacts (
    id INTEGER PRIMARY KEY,
    date_of_contact TEXT NOT NULL,
    sender_address TEXT NOT NULL,
    subject TEXT NOT NULL,
    body TEXT NOT NULL
)";

const CREATE_DATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_job_contacts_date ON job_contacts(date_of_contact)";

/// Single conditional statement so the existence check and the insert cannot
/// race; there is no separate read round trip.
const INSERT_IF_ABSENT: &str = "INSERT INTO job_contacts \
    (date_of_contact, sender_address, subject, body) \
    SELECT ?1, ?2, ?3, ?4 \
    WHERE NOT EXISTS (SELECT 1 FROM job_contacts \
        WHERE date_of_contact = ?1 \
        AND sender_address = ?2 \
        AND subject = ?3 \
        AND body = ?4)";

const SELECT_WINDOW_DESC: &str = "SELECT date_of_contact, sender_address, subject, body \
    FROM job_contacts \
    WHERE date_of_contact BETWEEN ?1 AND ?2 \
    ORDER BY date_of_contact DESC";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("stored timestamp is unreadable: {0}")]
    Stamp(#[from] StampError),
}

/// Handle to the job_contacts store. The pool is capped at one connection:
/// the pipeline is a single-operator, single-writer session.
#[derive(Debug, Clone)]
pub struct ContactStore {
    pool: SqlitePool,
}

impl ContactStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::with_schema(pool).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_schema(pool).await
    }

    async fn with_schema(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_DATE_INDEX).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a load session. Inserts accumulate in one transaction and become
    /// durable only at [`LoadSession::commit`]; dropping the session or
    /// calling [`LoadSession::rollback`] discards them all.
    pub async fn begin_session(&self) -> Result<LoadSession, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(LoadSession { tx })
    }

    /// Read path for the post-load reporter: rows whose date falls inside the
    /// window, most recent first. Never mutates.
    pub async fn contacts_in_window(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<ContactRecord>, StoreError> {
        let rows = sqlx::query(SELECT_WINDOW_DESC)
            .bind(window.start().storage_key())
            .bind(window.end().storage_key())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_record).collect()
    }
}

/// One logical transaction per session: every insert in a run rides the same
/// transaction and lands (or is lost) together at commit.
pub struct LoadSession {
    tx: Transaction<'static, Sqlite>,
}

impl LoadSession {
    /// Inserts the record unless a row with the identical four-field tuple
    /// already exists. Returns whether a row was actually written.
    pub async fn insert_if_absent(&mut self, record: &ContactRecord) -> Result<bool, StoreError> {
        let result = sqlx::query(INSERT_IF_ABSENT)
            .bind(record.date_of_contact.storage_key())
            .bind(&record.sender_address)
            .bind(&record.subject)
            .bind(&record.body)
            .execute(&mut *self.tx)
            .await?;
        let inserted = result.rows_affected() > 0;
        if !inserted {
            debug!(
                sender = %record.sender_address,
                date = %record.date_of_contact,
                "duplicate contact suppressed"
            );
        }
        Ok(inserted)
    }

    pub async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn row_to_record(row: &SqliteRow) -> Result<ContactRecord, StoreError> {
    let stamp_text: String = row.try_get("date_of_contact")?;
    Ok(ContactRecord {
        date_of_contact: ContactStamp::from_storage_key(&stamp_text)?,
        sender_address: row.try_get("sender_address")?,
        subject: row.try_get("subject")?,
        body: row.try_get("body")?,
    })
}
