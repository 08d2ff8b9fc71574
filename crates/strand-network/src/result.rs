//! The record handed back to the plugin layer after a successful setup.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;

use ipnet::Ipv4Net;
use serde::Serialize;

use crate::link::LinkInfo;

/// CNI spec version of the results this crate produces.
pub const CNI_VERSION: &str = "1.0.0";

/// CNI spec versions the result format is compatible with.
pub const SUPPORTED_VERSIONS: &[&str] = &["0.3.0", "0.3.1", "0.4.0", "1.0.0"];

/// One interface created by the attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceRecord {
    /// Interface name.
    pub name: String,
    /// Hardware address.
    pub mac: String,
    /// Namespace path; absent for the host side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
}

impl InterfaceRecord {
    /// Record for a link living in the host namespace.
    #[must_use]
    pub fn host(link: &LinkInfo) -> Self {
        Self {
            name: link.name.clone(),
            mac: link.mac_string(),
            sandbox: None,
        }
    }

    /// Record for a link living in the namespace at `netns`.
    #[must_use]
    pub fn sandboxed(link: &LinkInfo, netns: &Path) -> Self {
        Self {
            name: link.name.clone(),
            mac: link.mac_string(),
            sandbox: Some(netns.display().to_string()),
        }
    }
}

/// An IPv4 configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpConfig {
    /// Always `"4"`.
    pub version: &'static str,
    /// Address with prefix length.
    #[serde(serialize_with = "serialize_cidr")]
    pub address: Ipv4Net,
    /// Index into [`AttachmentResult::interfaces`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<usize>,
}

impl IpConfig {
    /// IPv4 entry for `address`, attached to interface number `interface`.
    #[must_use]
    pub const fn v4(address: Ipv4Net, interface: usize) -> Self {
        Self {
            version: "4",
            address,
            interface: Some(interface),
        }
    }

    /// Dotted-quad form of the prefix.
    #[must_use]
    pub fn netmask(&self) -> Ipv4Addr {
        self.address.netmask()
    }
}

impl fmt::Display for IpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address.addr(), self.netmask())
    }
}

fn serialize_cidr<S: serde::Serializer>(net: &Ipv4Net, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(net)
}

/// Result of one attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentResult {
    cni_version: String,
    interfaces: Vec<InterfaceRecord>,
    ips: Vec<IpConfig>,
}

impl AttachmentResult {
    /// Assemble a result; interfaces keep the given order.
    #[must_use]
    pub fn new(interfaces: Vec<InterfaceRecord>, ips: Vec<IpConfig>) -> Self {
        Self {
            cni_version: CNI_VERSION.to_string(),
            interfaces,
            ips,
        }
    }

    /// Re-label the result for a runtime speaking another compatible version.
    #[must_use]
    pub fn with_version(mut self, version: &str) -> Self {
        version.clone_into(&mut self.cni_version);
        self
    }

    /// Protocol version.
    #[must_use]
    pub fn cni_version(&self) -> &str {
        &self.cni_version
    }

    /// Interfaces, host side first.
    #[must_use]
    pub fn interfaces(&self) -> &[InterfaceRecord] {
        &self.interfaces
    }

    /// IP configurations.
    #[must_use]
    pub fn ips(&self) -> &[IpConfig] {
        &self.ips
    }
}
