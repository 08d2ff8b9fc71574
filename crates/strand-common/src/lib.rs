//! # strand-common
//!
//! Shared types for the Strand attachment plugin.
//!
//! This crate provides functionality used by both the attachment core and
//! the plugin binary:
//! - The error taxonomy
//! - The fixed addressing plan
//! - Network configuration parsing
//! - Container ID validation

#![warn(missing_docs)]

pub mod addressing;
pub mod config;
pub mod error;
pub mod id;

pub use addressing::AddressPlan;
pub use config::NetConf;
pub use error::{StrandError, StrandResult};
pub use id::ContainerId;
