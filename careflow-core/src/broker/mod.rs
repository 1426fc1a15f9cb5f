mod memory_broker;
mod rest_broker;
mod task_broker;

pub use memory_broker::InMemoryBroker;
pub use rest_broker::RestBroker;
pub use task_broker::{TaskBroker, TopicRequest};
