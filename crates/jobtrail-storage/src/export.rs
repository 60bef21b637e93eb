//! Ad-hoc statement execution and CSV row formatting.
//!
//! Peripheral to the ingestion pipeline: a straight read-statement,
//! execute, format-rows pipe with no shared state.

use std::io::{self, Read};

use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};

use crate::StoreError;

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub quote: String,
    pub colsep: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            quote: "\"".to_string(),
            colsep: ",".to_string(),
        }
    }
}

/// `--colsep "\t"` on a command line arrives as backslash-t; turn it into a
/// literal tab. Everything else passes through verbatim.
pub fn normalize_colsep(raw: &str) -> String {
    if raw == "\\t" {
        "\t".to_string()
    } else {
        raw.to_string()
    }
}

/// Reads the whole input as one SQL statement. Pure function of the source
/// text: no accumulation survives the call.
pub fn read_statement(mut input: impl Read) -> io::Result<String> {
    let mut text = String::new();
    input.read_to_string(&mut text)?;
    Ok(text.trim().to_string())
}

pub fn format_row(values: &[String], options: &CsvOptions) -> String {
    values
        .iter()
        .map(|v| format!("{q}{v}{q}", q = options.quote))
        .collect::<Vec<_>>()
        .join(&options.colsep)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementOutcome {
    Rows(Vec<Vec<String>>),
    Affected(u64),
}

fn returns_rows(sql: &str) -> bool {
    let head = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    matches!(head.as_str(), "select" | "with" | "pragma" | "explain" | "values")
}

/// Executes one statement. Queries come back as text rows ready for
/// [`format_row`]; anything else reports the affected-row count. Runs outside
/// any load session, so DML here is durable as soon as it returns.
pub async fn run_statement(pool: &SqlitePool, sql: &str) -> Result<StatementOutcome, StoreError> {
    if returns_rows(sql) {
        let rows = sqlx::query(sql).fetch_all(pool).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(row_text_values(row)?);
        }
        Ok(StatementOutcome::Rows(out))
    } else {
        let result = sqlx::query(sql).execute(pool).await?;
        Ok(StatementOutcome::Affected(result.rows_affected()))
    }
}

fn row_text_values(row: &SqliteRow) -> Result<Vec<String>, StoreError> {
    let mut values = Vec::with_capacity(row.columns().len());
    for index in 0..row.columns().len() {
        values.push(column_text(row, index)?);
    }
    Ok(values)
}

fn column_text(row: &SqliteRow, index: usize) -> Result<String, StoreError> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(String::new());
    }
    let type_name = raw.type_info().name().to_string();
    let text = match type_name.as_str() {
        "INTEGER" => row.try_get::<i64, _>(index)?.to_string(),
        "REAL" => row.try_get::<f64, _>(index)?.to_string(),
        "BLOB" => String::from_utf8_lossy(&row.try_get::<Vec<u8>, _>(index)?).into_owned(),
        _ => row.try_get::<String, _>(index)?,
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContactStore;

    #[test]
    fn statement_reading_trims_surrounding_whitespace() {
        let sql = read_statement("  select 1\n".as_bytes()).expect("read");
        assert_eq!(sql, "select 1");
    }

    #[test]
    fn rows_are_quoted_and_separated() {
        let options = CsvOptions::default();
        let line = format_row(&["a".into(), "b,c".into()], &options);
        assert_eq!(line, "\"a\",\"b,c\"");

        let tabbed = CsvOptions {
            quote: String::new(),
            colsep: normalize_colsep("\\t"),
        };
        assert_eq!(format_row(&["a".into(), "b".into()], &tabbed), "a\tb");
    }

    #[tokio::test]
    async fn select_statements_come_back_as_text_rows() {
        let store = ContactStore::open_in_memory().await.expect("store");
        sqlx::query("INSERT INTO job_contacts (date_of_contact, sender_address, subject, body) \
             VALUES ('2024-01-15 09:00', 'jobs@acme.test', 'Received', 'Thanks.')")
            .execute(store.pool())
            .await
            .expect("seed");

        let outcome = run_statement(
            store.pool(),
            "SELECT sender_address, subject FROM job_contacts",
        )
        .await
        .expect("run");
        assert_eq!(
            outcome,
            StatementOutcome::Rows(vec![vec!["jobs@acme.test".into(), "Received".into()]])
        );
    }

    #[tokio::test]
    async fn dml_statements_report_affected_rows() {
        let store = ContactStore::open_in_memory().await.expect("store");
        let outcome = run_statement(
            store.pool(),
            "INSERT INTO job_contacts (date_of_contact, sender_address, subject, body) \
             VALUES ('2024-01-15 09:00', 'a@x.test', 's', 'b')",
        )
        .await
        .expect("run");
        assert_eq!(outcome, StatementOutcome::Affected(1));

        let outcome = run_statement(store.pool(), "DELETE FROM job_contacts")
            .await
            .expect("run");
        assert_eq!(outcome, StatementOutcome::Affected(1));
    }

    #[tokio::test]
    async fn mixed_column_types_render_as_text() {
        let store = ContactStore::open_in_memory().await.expect("store");
        let outcome = run_statement(store.pool(), "SELECT 42, 1.5, 'x', NULL")
            .await
            .expect("run");
        assert_eq!(
            outcome,
            StatementOutcome::Rows(vec![vec![
                "42".into(),
                "1.5".into(),
                "x".into(),
                String::new()
            ]])
        );
    }
}
