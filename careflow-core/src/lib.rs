mod broker;
mod config;
mod job;
mod lease;
mod metrics;
mod utils;
mod worker;

pub use broker::{InMemoryBroker, RestBroker, TaskBroker, TopicRequest};
pub use config::{BrokerProperties, JobPollerProperties, WorkerProperties};
pub use job::{
    ExternalJob, FieldKind, JobOutcome, JobPoller, JobState, RemoteJobClient, RemoteJobStatus,
    ResultExtractor, ResultField, StatusMapper,
};
pub use lease::{LeaseKeeper, TaskLeaseClient};
pub use crate::metrics::Monitors;
pub use utils::{
    Clock, IdGenerator, ManualClock, ScopedResource, SessionScope, SharedClock, SystemClock,
};
pub use worker::{ShutdownSignal, Subscription, TaskContext, TaskHandler, WorkerHandle, WorkerLoop};
