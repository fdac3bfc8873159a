//! Mock job ledger for testing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;

use crate::job::{JobFilter, JobLedger, JobRecord, LedgerError, LedgerFields, LedgerRow};

/// Scripted upsert failures: let `skip` upserts through, then fail `fail`.
#[derive(Debug, Default)]
struct FailurePlan {
    skip: usize,
    fail: usize,
}

/// In-memory implementation of the JobLedger trait.
///
/// Records every successful upsert in order so tests can assert on the
/// sequence of state transitions.
///
/// # Example
///
/// ```rust,ignore
/// use transmute_core::testing::MockJobLedger;
///
/// let ledger = MockJobLedger::new();
/// ledger.fail_upserts_after(1, 1); // second write fails once
/// ```
#[derive(Debug, Default)]
pub struct MockJobLedger {
    rows: Arc<RwLock<HashMap<(String, String), LedgerRow>>>,
    writes: Arc<RwLock<Vec<(String, LedgerFields)>>>,
    failures: Mutex<FailurePlan>,
}

impl MockJobLedger {
    /// Create a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful upserts so far, as `(row_key, fields)`.
    pub fn writes(&self) -> Vec<(String, LedgerFields)> {
        self.writes.read().unwrap().clone()
    }

    /// Fail the next `count` upserts.
    pub fn fail_next_upserts(&self, count: usize) {
        self.fail_upserts_after(0, count);
    }

    /// Let `skip` upserts succeed, then fail the following `count`.
    pub fn fail_upserts_after(&self, skip: usize, count: usize) {
        *self.failures.lock().unwrap() = FailurePlan { skip, fail: count };
    }

    fn injected_failure(&self) -> bool {
        let mut plan = self.failures.lock().unwrap();
        if plan.skip > 0 {
            plan.skip -= 1;
            return false;
        }
        if plan.fail > 0 {
            plan.fail -= 1;
            return true;
        }
        false
    }

    fn matches(row: &LedgerRow, filter: &JobFilter) -> bool {
        match filter.status {
            Some(status) => JobRecord::from_fields(row.row_key.clone(), &row.fields).status == status,
            None => true,
        }
    }
}

impl JobLedger for MockJobLedger {
    fn upsert(&self, partition: &str, row_key: &str, fields: &LedgerFields) -> Result<(), LedgerError> {
        if self.injected_failure() {
            return Err(LedgerError::Database("injected upsert failure".to_string()));
        }

        let row = LedgerRow {
            partition_key: partition.to_string(),
            row_key: row_key.to_string(),
            fields: fields.clone(),
            updated_at: Utc::now(),
        };
        self.rows
            .write()
            .unwrap()
            .insert((partition.to_string(), row_key.to_string()), row);
        self.writes
            .write()
            .unwrap()
            .push((row_key.to_string(), fields.clone()));
        Ok(())
    }

    fn get(&self, partition: &str, row_key: &str) -> Result<Option<LedgerFields>, LedgerError> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .get(&(partition.to_string(), row_key.to_string()))
            .map(|row| row.fields.clone()))
    }

    fn list(&self, partition: &str, filter: &JobFilter) -> Result<Vec<LedgerRow>, LedgerError> {
        let mut rows: Vec<LedgerRow> = self
            .rows
            .read()
            .unwrap()
            .values()
            .filter(|row| row.partition_key == partition && Self::matches(row, filter))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    fn count(&self, partition: &str, filter: &JobFilter) -> Result<i64, LedgerError> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .values()
            .filter(|row| row.partition_key == partition && Self::matches(row, filter))
            .count() as i64)
    }
}
