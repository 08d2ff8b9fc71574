//! # Strand CNI plugin
//!
//! Strand connects a container network namespace to the host with a single
//! veth pair and fixed addresses (`10.200.1.1/24` on the host,
//! `10.200.1.2/24` in the container).
//!
//! This crate is the CNI protocol layer only: it reads the `CNI_*`
//! environment and the network configuration, calls into
//! [`strand_network`], and prints the result or error as JSON.

#![warn(missing_docs)]

pub mod cli;
pub mod cni;

pub use cli::{Cli, CniCommand};
pub use cni::PluginError;
