//! CNI protocol objects: version report, error report, exit codes.

use std::io::{Read, Write};

use serde::Serialize;
use strand_common::{NetConf, StrandError};
use strand_network::{CNI_VERSION, SUPPORTED_VERSIONS};
use thiserror::Error;

/// Well-known CNI error codes.
pub mod code {
    /// Incompatible CNI version.
    pub const INCOMPATIBLE_VERSION: u32 = 1;
    /// Invalid environment variables.
    pub const INVALID_ENV: u32 = 4;
    /// I/O failure.
    pub const IO_FAILURE: u32 = 5;
    /// Failed to decode content.
    pub const DECODING_FAILURE: u32 = 6;
    /// Invalid network config.
    pub const INVALID_CONFIG: u32 = 7;
    /// Try again later.
    pub const TRY_AGAIN_LATER: u32 = 11;
    /// The container namespace could not be used.
    pub const NAMESPACE: u32 = 100;
    /// The requested interface name is taken.
    pub const DUPLICATE_INTERFACE: u32 = 101;
    /// The attached interface is missing or misconfigured.
    pub const CHECK_FAILED: u32 = 102;
    /// Any other failure.
    pub const INTERNAL: u32 = 999;
}

/// Failures surfaced to the container runtime.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A required `CNI_*` variable is missing or empty.
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),

    /// The runtime asked for a version this plugin cannot produce.
    #[error("incompatible CNI version {0}")]
    IncompatibleVersion(String),

    /// The attachment core failed.
    #[error(transparent)]
    Strand(#[from] StrandError),
}

impl PluginError {
    /// CNI error code for this failure.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::MissingEnv(_) => code::INVALID_ENV,
            Self::IncompatibleVersion(_) => code::INCOMPATIBLE_VERSION,
            Self::Strand(err) => strand_code(err),
        }
    }
}

const fn strand_code(err: &StrandError) -> u32 {
    if err.is_transient() {
        return code::TRY_AGAIN_LATER;
    }
    match err {
        StrandError::Serialization(_) => code::DECODING_FAILURE,
        StrandError::Config { .. }
        | StrandError::InvalidContainerId { .. }
        | StrandError::AddressParse { .. } => code::INVALID_CONFIG,
        StrandError::Io(_) => code::IO_FAILURE,
        StrandError::NamespaceOpen { .. }
        | StrandError::NamespaceEnter { .. }
        | StrandError::NamespaceRestore => code::NAMESPACE,
        StrandError::DuplicateInterface { .. } => code::DUPLICATE_INTERFACE,
        StrandError::LinkNotFound { .. } | StrandError::CheckFailed { .. } => code::CHECK_FAILED,
        _ => code::INTERNAL,
    }
}

/// Error object printed on stdout when a command fails.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResult {
    cni_version: String,
    code: u32,
    msg: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    details: String,
}

impl ErrorResult {
    /// Build the report for `err`.
    #[must_use]
    pub fn new(err: &PluginError, cni_version: &str) -> Self {
        let details = match err {
            PluginError::Strand(inner) => std::error::Error::source(inner)
                .map(ToString::to_string)
                .unwrap_or_default(),
            _ => String::new(),
        };

        Self {
            cni_version: cni_version.to_string(),
            code: err.code(),
            msg: err.to_string(),
            details,
        }
    }
}

/// Reply to the `VERSION` command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    cni_version: &'static str,
    supported_versions: &'static [&'static str],
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            cni_version: CNI_VERSION,
            supported_versions: SUPPORTED_VERSIONS,
        }
    }
}

/// Read and validate the network configuration from `input`.
pub fn read_conf<R: Read>(mut input: R) -> Result<NetConf, PluginError> {
    let mut data = Vec::new();
    input.read_to_end(&mut data).map_err(StrandError::from)?;
    tracing::debug!(stdin = %String::from_utf8_lossy(&data), "Read network configuration");

    Ok(NetConf::from_slice(&data)?)
}

/// Version to label results with: the one the runtime asked for.
pub fn result_version(conf: &NetConf) -> Result<&str, PluginError> {
    match conf.cni_version.as_str() {
        "" => Ok(CNI_VERSION),
        v if SUPPORTED_VERSIONS.contains(&v) => Ok(v),
        v => Err(PluginError::IncompatibleVersion(v.to_string())),
    }
}

/// Write `value` as one line of JSON.
pub fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<(), PluginError> {
    serde_json::to_writer(&mut *out, value).map_err(StrandError::from)?;
    writeln!(out).map_err(StrandError::from)?;
    Ok(())
}
