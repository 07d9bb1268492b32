//! Exit codes
//!
//! Every fatal condition, including a declined confirmation or an interrupt,
//! exits with [`ERROR`].

/// Success - every target completed
pub const SUCCESS: i32 = 0;

/// General error - any fatal failure
pub const ERROR: i32 = 1;
