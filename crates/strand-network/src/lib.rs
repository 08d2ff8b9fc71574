//! # strand-network
//!
//! Point-to-point veth attachment for container network namespaces.
//!
//! [`attach`] creates a veth pair inside a container's network namespace,
//! moves one end to the host and gives both ends fixed IPv4 addresses.
//! [`detach`] removes the container end again.
//!
//! ```no_run
//! use strand_common::ContainerId;
//! use strand_network::{SetupRequest, TeardownRequest, attach, detach};
//!
//! # fn example() -> strand_common::StrandResult<()> {
//! let id = ContainerId::new("abc123")?;
//! let result = attach(SetupRequest::new(id.clone(), "/var/run/netns/test1", "eth0"))?;
//! println!("{}", serde_json::to_string(&result)?);
//!
//! let _freed = detach(TeardownRequest::new(id, "/var/run/netns/test1", "eth0"))?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod addr;
pub mod attach;
pub mod link;
pub mod migrate;
pub mod naming;
pub mod netlink;
pub mod netns;
pub mod result;
pub mod veth;

#[cfg(test)]
mod fake;

pub use addr::parse_cidr;
pub use attach::{SetupRequest, TeardownRequest, attach, detach, verify};
pub use link::{LinkBackend, LinkInfo, MacAddr};
pub use netlink::NetlinkBackend;
pub use netns::{NetNs, NetNsGuard, run_isolated};
pub use result::{AttachmentResult, CNI_VERSION, InterfaceRecord, IpConfig, SUPPORTED_VERSIONS};
pub use veth::{VethFactory, VethPair};
