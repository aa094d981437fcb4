//! Quota group administration for btrfs: request construction, validation and the ioctl engine.

pub mod btrfs;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod id;
pub mod limit;
pub mod listing;
pub mod render;
pub mod request;
pub mod units;

#[cfg(test)]
mod testutil;

pub use config::{Config, NoRescanMode};
pub use error::{Error, ErrorKind, Result};
pub use id::QgroupId;
