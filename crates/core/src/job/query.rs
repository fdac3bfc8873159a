//! Status lookups for clients.

use serde::Serialize;

use super::ledger::{JobFilter, JobLedger, LedgerError};
use super::types::{JobRecord, JobStatus};

/// What a client sees when asking about a job.
///
/// A job the ledger has never heard of is reported as pending: the upload
/// may still be in transit, so absence is not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobView {
    Known(JobRecord),
    Unknown { job_id: String, status: JobStatus },
}

impl JobView {
    pub fn job_id(&self) -> &str {
        match self {
            JobView::Known(record) => &record.job_id,
            JobView::Unknown { job_id, .. } => job_id,
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobView::Known(record) => record.status,
            JobView::Unknown { status, .. } => *status,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, JobView::Known(_))
    }
}

/// Looks up a job by id.
pub fn lookup_job(
    ledger: &dyn JobLedger,
    partition: &str,
    job_id: &str,
) -> Result<JobView, LedgerError> {
    match ledger.get(partition, job_id)? {
        Some(fields) => Ok(JobView::Known(JobRecord::from_fields(job_id, &fields))),
        None => Ok(JobView::Unknown {
            job_id: job_id.to_string(),
            status: JobStatus::Pending,
        }),
    }
}

/// A page of jobs with the total matching count.
#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub jobs: Vec<JobRecord>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Lists jobs in a partition.
pub fn list_jobs(
    ledger: &dyn JobLedger,
    partition: &str,
    filter: &JobFilter,
) -> Result<JobPage, LedgerError> {
    let rows = ledger.list(partition, filter)?;
    let total = ledger.count(partition, filter)?;
    Ok(JobPage {
        jobs: rows
            .into_iter()
            .map(|row| JobRecord::from_fields(row.row_key, &row.fields))
            .collect(),
        total,
        limit: filter.limit,
        offset: filter.offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::SqliteJobLedger;
    use chrono::Utc;

    #[test]
    fn test_lookup_unknown_job_is_pending() {
        let ledger = SqliteJobLedger::in_memory().unwrap();

        let view = lookup_job(&ledger, "jobs", "nope").unwrap();
        assert!(!view.is_known());
        assert_eq!(view.status(), JobStatus::Pending);
        assert_eq!(view.job_id(), "nope");
    }

    #[test]
    fn test_lookup_known_job() {
        let ledger = SqliteJobLedger::in_memory().unwrap();
        let now = Utc::now();
        let record = JobRecord::pending("j1", now).into_failed("bad input".to_string(), now);
        ledger.upsert("jobs", "j1", &record.to_fields()).unwrap();

        let view = lookup_job(&ledger, "jobs", "j1").unwrap();
        assert!(view.is_known());
        assert_eq!(view.status(), JobStatus::Failed);
        match view {
            JobView::Known(r) => assert_eq!(r.error_message.as_deref(), Some("bad input")),
            JobView::Unknown { .. } => panic!("expected known job"),
        }
    }

    #[test]
    fn test_unknown_view_serializes_flat() {
        let view = JobView::Unknown {
            job_id: "x".to_string(),
            status: JobStatus::Pending,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["job_id"], "x");
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn test_list_jobs_reports_total() {
        let ledger = SqliteJobLedger::in_memory().unwrap();
        let now = Utc::now();
        for id in ["a", "b", "c"] {
            ledger
                .upsert("jobs", id, &JobRecord::pending(id, now).to_fields())
                .unwrap();
        }

        let page = list_jobs(&ledger, "jobs", &JobFilter::new().with_limit(2)).unwrap();
        assert_eq!(page.jobs.len(), 2);
        assert_eq!(page.total, 3);
    }
}
