mod exception;
mod exception_code;
mod exception_into;

pub use exception::{CareResult, ErrorCode, ErrorCodeBacktrace};
