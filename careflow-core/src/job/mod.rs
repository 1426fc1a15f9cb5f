mod job_poller;
mod job_state;
mod remote_job;
mod result_extractor;
mod status_mapper;

pub use job_poller::{JobOutcome, JobPoller};
pub use job_state::JobState;
pub use remote_job::{ExternalJob, RemoteJobClient, RemoteJobStatus};
pub use result_extractor::{FieldKind, ResultExtractor, ResultField};
pub use status_mapper::StatusMapper;
