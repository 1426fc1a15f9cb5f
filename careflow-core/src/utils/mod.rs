mod clock;
mod id_generator;
mod session_scope;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use id_generator::IdGenerator;
pub use session_scope::{ScopedResource, SessionScope};
