mod lease_keeper;
mod task_lease_client;

pub use lease_keeper::LeaseKeeper;
pub use task_lease_client::TaskLeaseClient;
