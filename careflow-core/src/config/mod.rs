mod properties;

pub use properties::{BrokerProperties, JobPollerProperties, WorkerProperties};
