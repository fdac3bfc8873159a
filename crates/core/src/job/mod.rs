//! Job ledger: durable status tracking for transformation jobs.
//!
//! Each job is one row keyed by `(partition, job_id)` whose fields hold the
//! status and, depending on the outcome, the output URL or an error message.

mod ledger;
mod query;
mod sqlite_ledger;
mod types;

pub use ledger::{JobFilter, JobLedger, LedgerError, LedgerFields, LedgerRow};
pub use query::{list_jobs, lookup_job, JobPage, JobView};
pub use sqlite_ledger::SqliteJobLedger;
pub use types::{fields, JobRecord, JobStatus, UnknownStatus};
