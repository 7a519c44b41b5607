//! Command-line client for pooled accel runtime sessions.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
