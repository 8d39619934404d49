//! Side-effecting pieces: processes, config files, and the terraform executor.

pub mod config;
pub mod process;
pub mod terraform;
pub mod tools;
