//! Network configuration handed to the plugin on stdin.

use serde::{Deserialize, Serialize};

use crate::addressing::DEFAULT_MTU;
use crate::error::{StrandError, StrandResult};

/// Smallest MTU the kernel accepts for an IPv4 link.
pub const MIN_MTU: u32 = 68;

/// Largest MTU a veth link accepts.
pub const MAX_MTU: u32 = 65535;

/// Network configuration, as found in a CNI `.conf` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetConf {
    /// CNI spec version the runtime speaks.
    #[serde(default)]
    pub cni_version: String,
    /// Network name.
    #[serde(default)]
    pub name: String,
    /// Plugin type.
    #[serde(rename = "type", default)]
    pub plugin_type: String,
    /// MTU for both ends of the pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    /// CIDR for the host end, replacing the fixed host address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_address: Option<String>,
    /// CIDR for the container end, replacing the fixed container address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_address: Option<String>,
}

impl NetConf {
    /// Parse and validate a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the MTU is out of range.
    pub fn from_slice(data: &[u8]) -> StrandResult<Self> {
        let conf: Self = serde_json::from_slice(data)?;
        conf.validate()?;
        Ok(conf)
    }

    /// The MTU to use, falling back to [`DEFAULT_MTU`].
    #[must_use]
    pub fn mtu(&self) -> u32 {
        self.mtu.unwrap_or(DEFAULT_MTU)
    }

    fn validate(&self) -> StrandResult<()> {
        let mtu = self.mtu();
        if !(MIN_MTU..=MAX_MTU).contains(&mtu) {
            return Err(StrandError::Config {
                message: format!("mtu {mtu} out of range {MIN_MTU}..={MAX_MTU}"),
            });
        }
        Ok(())
    }
}
