//! SQLite-backed job ledger implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::ledger::{JobFilter, JobLedger, LedgerError, LedgerFields, LedgerRow};
use super::types::fields;

/// SQLite-backed job ledger.
pub struct SqliteJobLedger {
    conn: Mutex<Connection>,
}

impl SqliteJobLedger {
    /// Open the ledger, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path).map_err(|e| LedgerError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory ledger (useful for testing).
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn =
            Connection::open_in_memory().map_err(|e| LedgerError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LedgerError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS job_ledger (
                partition_key TEXT NOT NULL,
                row_key TEXT NOT NULL,
                fields TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (partition_key, row_key)
            );

            CREATE INDEX IF NOT EXISTS idx_job_ledger_updated_at
                ON job_ledger(partition_key, updated_at DESC);
            "#,
        )
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, LedgerError> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(
        partition: &str,
        filter: &JobFilter,
    ) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = vec!["partition_key = ?"];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(partition.to_string())];

        if let Some(status) = filter.status {
            // Older rows may carry capitalized statuses.
            conditions.push("lower(json_extract(fields, '$.status')) = ?");
            params.push(Box::new(status.as_str().to_string()));
        }

        (format!("WHERE {}", conditions.join(" AND ")), params)
    }

    fn decode_fields(raw: &str) -> Result<LedgerFields, LedgerError> {
        serde_json::from_str(raw).map_err(|e| LedgerError::Serialization(e.to_string()))
    }
}

impl JobLedger for SqliteJobLedger {
    fn upsert(
        &self,
        partition: &str,
        row_key: &str,
        fields: &LedgerFields,
    ) -> Result<(), LedgerError> {
        let fields_json =
            serde_json::to_string(fields).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        let updated_at = fields
            .get(fields::UPDATED_AT)
            .cloned()
            .unwrap_or_else(|| Utc::now().to_rfc3339());

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO job_ledger (partition_key, row_key, fields, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(partition_key, row_key) DO UPDATE SET fields = excluded.fields, updated_at = excluded.updated_at",
            params![partition, row_key, fields_json, updated_at],
        )
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(())
    }

    fn get(&self, partition: &str, row_key: &str) -> Result<Option<LedgerFields>, LedgerError> {
        let conn = self.conn()?;

        let result = conn.query_row(
            "SELECT fields FROM job_ledger WHERE partition_key = ? AND row_key = ?",
            params![partition, row_key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(raw) => Self::decode_fields(&raw).map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(LedgerError::Database(e.to_string())),
        }
    }

    fn list(&self, partition: &str, filter: &JobFilter) -> Result<Vec<LedgerRow>, LedgerError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(partition, filter);
        let sql = format!(
            "SELECT partition_key, row_key, fields, updated_at FROM job_ledger {} ORDER BY updated_at DESC, row_key ASC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let mut all_params = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let mut result = Vec::new();
        for row in rows {
            let (partition_key, row_key, raw_fields, updated_at) =
                row.map_err(|e| LedgerError::Database(e.to_string()))?;
            result.push(LedgerRow {
                partition_key,
                row_key,
                fields: Self::decode_fields(&raw_fields)?,
                updated_at: DateTime::parse_from_rfc3339(&updated_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or(DateTime::UNIX_EPOCH),
            });
        }

        Ok(result)
    }

    fn count(&self, partition: &str, filter: &JobFilter) -> Result<i64, LedgerError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(partition, filter);
        let sql = format!("SELECT COUNT(*) FROM job_ledger {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| LedgerError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobRecord, JobStatus};
    use chrono::Duration;

    fn create_test_ledger() -> SqliteJobLedger {
        SqliteJobLedger::in_memory().unwrap()
    }

    fn record(id: &str, status: JobStatus, age_secs: i64) -> JobRecord {
        let at = Utc::now() - Duration::seconds(age_secs);
        JobRecord {
            status,
            ..JobRecord::pending(id, at).with_operation("img_to_bw")
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let ledger = create_test_ledger();
        let job = record("a", JobStatus::Pending, 0);

        ledger.upsert("jobs", "a", &job.to_fields()).unwrap();

        let fields = ledger.get("jobs", "a").unwrap().unwrap();
        assert_eq!(fields["status"], "pending");
        assert_eq!(fields["operation"], "img_to_bw");
    }

    #[test]
    fn test_get_absent_row() {
        let ledger = create_test_ledger();
        assert!(ledger.get("jobs", "missing").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_all_fields() {
        let ledger = create_test_ledger();
        let mut fields = LedgerFields::new();
        fields.insert("status".to_string(), "failed".to_string());
        fields.insert("error_message".to_string(), "boom".to_string());
        ledger.upsert("jobs", "b", &fields).unwrap();

        let mut replacement = LedgerFields::new();
        replacement.insert("status".to_string(), "processing".to_string());
        ledger.upsert("jobs", "b", &replacement).unwrap();

        let stored = ledger.get("jobs", "b").unwrap().unwrap();
        assert_eq!(stored, replacement);
    }

    #[test]
    fn test_partitions_are_isolated() {
        let ledger = create_test_ledger();
        let job = record("same", JobStatus::Pending, 0);
        ledger.upsert("jobs", "same", &job.to_fields()).unwrap();

        assert!(ledger.get("other", "same").unwrap().is_none());
        assert_eq!(ledger.count("other", &JobFilter::new()).unwrap(), 0);
    }

    #[test]
    fn test_list_filters_by_status() {
        let ledger = create_test_ledger();
        for (id, status) in [
            ("p1", JobStatus::Pending),
            ("c1", JobStatus::Completed),
            ("c2", JobStatus::Completed),
            ("f1", JobStatus::Failed),
        ] {
            ledger
                .upsert("jobs", id, &record(id, status, 0).to_fields())
                .unwrap();
        }

        let filter = JobFilter::new().with_status(JobStatus::Completed);
        let rows = ledger.list("jobs", &filter).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.fields["status"] == "completed"));
        assert_eq!(ledger.count("jobs", &filter).unwrap(), 2);
        assert_eq!(ledger.count("jobs", &JobFilter::new()).unwrap(), 4);
    }

    #[test]
    fn test_status_filter_matches_legacy_case() {
        let ledger = create_test_ledger();
        let mut fields = LedgerFields::new();
        fields.insert("status".to_string(), "Pending".to_string());
        ledger.upsert("jobs", "legacy", &fields).unwrap();

        let filter = JobFilter::new().with_status(JobStatus::Pending);
        assert_eq!(ledger.count("jobs", &filter).unwrap(), 1);
    }

    #[test]
    fn test_list_orders_newest_first_and_paginates() {
        let ledger = create_test_ledger();
        ledger
            .upsert("jobs", "old", &record("old", JobStatus::Pending, 300).to_fields())
            .unwrap();
        ledger
            .upsert("jobs", "mid", &record("mid", JobStatus::Pending, 200).to_fields())
            .unwrap();
        ledger
            .upsert("jobs", "new", &record("new", JobStatus::Pending, 100).to_fields())
            .unwrap();

        let rows = ledger.list("jobs", &JobFilter::new()).unwrap();
        let keys: Vec<_> = rows.iter().map(|r| r.row_key.as_str()).collect();
        assert_eq!(keys, vec!["new", "mid", "old"]);

        let page = ledger
            .list("jobs", &JobFilter::new().with_limit(1).with_offset(1))
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].row_key, "mid");
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let ledger = SqliteJobLedger::new(&path).unwrap();
            ledger
                .upsert("jobs", "x", &record("x", JobStatus::Completed, 0).to_fields())
                .unwrap();
        }

        let ledger = SqliteJobLedger::new(&path).unwrap();
        let fields = ledger.get("jobs", "x").unwrap().unwrap();
        assert_eq!(fields["status"], "completed");
    }
}
