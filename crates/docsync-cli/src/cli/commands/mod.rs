//! CLI command handlers. Each command is in its own file.

mod check;
mod checksum;
mod job;
mod status;
mod watch;

pub use check::run_check;
pub use checksum::run_checksum;
pub use job::run_once;
pub use status::run_status;
pub use watch::run_watch;
