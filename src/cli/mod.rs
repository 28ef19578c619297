//! CLI command handlers
//!
//! Each subcommand is implemented in its own module.

pub mod config;
pub mod doctor;
pub mod evaluate;
pub mod helpers;
pub mod init;
pub mod recommend;
pub mod retrain;
pub mod seed;
pub mod serve;
