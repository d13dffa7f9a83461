//! Process exit codes.

pub const OK: i32 = 0;
/// Every retry attempt failed; the failure signal was raised.
pub const EXHAUSTED: i32 = 1;
/// Invariant violation or unusable configuration.
pub const FATAL: i32 = 2;
/// Stopped by Ctrl-C.
pub const CANCELLED: i32 = 130;
