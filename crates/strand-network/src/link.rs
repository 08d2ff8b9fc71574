//! Kernel link model and the backend seam.
//!
//! Everything above this module talks to the kernel through [`LinkBackend`].
//! A backend is bound to exactly one network namespace: the one that was
//! current when it was created.

use std::fmt;
use std::os::fd::BorrowedFd;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use strand_common::{StrandError, StrandResult};
use thiserror::Error;

/// Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Build from a raw attribute payload; `None` unless it is 6 bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        <[u8; 6]>::try_from(bytes).ok().map(Self)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// A link as seen from one namespace.
///
/// `index` is only meaningful in the namespace the link was read in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    /// Interface index.
    pub index: u32,
    /// Interface name.
    pub name: String,
    /// Hardware address, if the link has one.
    pub mac: Option<MacAddr>,
    /// MTU.
    pub mtu: Option<u32>,
    /// Administrative state.
    pub up: bool,
}

impl LinkInfo {
    /// MAC as a display string, empty when unknown.
    #[must_use]
    pub fn mac_string(&self) -> String {
        self.mac.map(|m| m.to_string()).unwrap_or_default()
    }
}

/// Parameters for one veth creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethSpec {
    /// Name of the end that stays in the current namespace.
    pub name: String,
    /// Name of the peer end.
    pub peer_name: String,
    /// MTU for both ends.
    pub mtu: u32,
    /// Create both ends administratively up.
    pub up: bool,
}

/// A raw kernel failure, before it is attached to an operation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct KernelError {
    errno: Option<i32>,
    message: String,
}

impl KernelError {
    /// Error carrying a positive errno value.
    pub fn from_errno(errno: i32, message: impl Into<String>) -> Self {
        Self {
            errno: Some(errno),
            message: message.into(),
        }
    }

    /// Error without an errno (protocol or decoding failure).
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            errno: None,
            message: message.into(),
        }
    }

    /// `EEXIST`: a link with one of the requested names is present.
    #[must_use]
    pub fn is_exists(&self) -> bool {
        self.errno == Some(libc::EEXIST)
    }

    /// `ENODEV`: no such link.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.errno == Some(libc::ENODEV)
    }
}

/// Link operations against a single network namespace.
#[async_trait]
pub trait LinkBackend: Send + Sync {
    /// Create a veth pair in this namespace.
    async fn add_veth(&self, spec: &VethSpec) -> Result<(), KernelError>;

    /// Look a link up by name; `Ok(None)` when it does not exist.
    async fn link_by_name(&self, name: &str) -> Result<Option<LinkInfo>, KernelError>;

    /// Set a link administratively up.
    async fn set_up(&self, link: &LinkInfo) -> Result<(), KernelError>;

    /// Attach an IPv4 address to a link.
    async fn add_address(&self, link: &LinkInfo, address: Ipv4Net) -> Result<(), KernelError>;

    /// IPv4 addresses currently on a link.
    async fn addresses(&self, link: &LinkInfo) -> Result<Vec<Ipv4Net>, KernelError>;

    /// Move a link into the namespace referred to by `target`.
    async fn move_to_netns(
        &self,
        link: &LinkInfo,
        target: BorrowedFd<'_>,
    ) -> Result<(), KernelError>;

    /// Delete a link (and, for veth, its peer).
    async fn delete_link(&self, link: &LinkInfo) -> Result<(), KernelError>;
}

/// Look a link up by name, keeping absence as `None`.
pub async fn find_link<B: LinkBackend + ?Sized>(
    backend: &B,
    name: &str,
) -> StrandResult<Option<LinkInfo>> {
    backend
        .link_by_name(name)
        .await
        .map_err(|e| StrandError::LinkLookup {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

/// Look a link up by name; absence is an error.
pub async fn resolve_link<B: LinkBackend + ?Sized>(
    backend: &B,
    name: &str,
) -> StrandResult<LinkInfo> {
    find_link(backend, name)
        .await?
        .ok_or_else(|| StrandError::LinkNotFound {
            name: name.to_string(),
        })
}
