pub mod errors;
pub mod model;
pub mod persistence;
pub mod tracker;

pub use errors::{JobError, JobResult};
pub use model::{
    Job, JobHistoryEntry, JobQuery, JobStatus, JobSummary, JobUpdate, SortField, SortOrder,
    TriggerType,
};
pub use persistence::{JobSnapshot, SnapshotStore};
pub use tracker::JobTracker;
