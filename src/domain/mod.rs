mod batch;
mod log_entry;

pub use batch::Batch;
pub use log_entry::{LogEntry, LogLevel, NewLogEntry, is_valid_ipv4};
