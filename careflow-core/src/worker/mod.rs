mod shutdown;
mod task_handler;
mod worker_loop;

pub use shutdown::ShutdownSignal;
pub use task_handler::{Subscription, TaskContext, TaskHandler};
pub use worker_loop::{WorkerHandle, WorkerLoop};
