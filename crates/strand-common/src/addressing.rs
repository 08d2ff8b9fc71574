//! Fixed point-to-point addressing.
//!
//! By default every attachment uses the same /24: the host end gets `.1`, the
//! container end gets `.2`, so two attachments on one host collide. Running
//! more than one attachment means passing a distinct [`AddressPlan`] per call
//! instead of [`AddressPlan::FIXED`].

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

/// Address of the host-side end.
pub const HOST_ADDRESS: Ipv4Addr = Ipv4Addr::new(10, 200, 1, 1);

/// Address of the container-side end.
pub const CONTAINER_ADDRESS: Ipv4Addr = Ipv4Addr::new(10, 200, 1, 2);

/// Prefix length shared by both ends.
pub const PREFIX_LEN: u8 = 24;

/// Default MTU for both ends of the pair.
pub const DEFAULT_MTU: u32 = 1500;

/// Host-side CIDR, `10.200.1.1/24`.
pub const HOST_NET: Ipv4Net = Ipv4Net::new_assert(HOST_ADDRESS, PREFIX_LEN);

/// Container-side CIDR, `10.200.1.2/24`.
pub const CONTAINER_NET: Ipv4Net = Ipv4Net::new_assert(CONTAINER_ADDRESS, PREFIX_LEN);

/// Addresses for the two ends of one attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPlan {
    /// Host-side CIDR.
    pub host: Ipv4Net,
    /// Container-side CIDR.
    pub container: Ipv4Net,
}

impl AddressPlan {
    /// Plan used when the configuration names no addresses.
    pub const FIXED: Self = Self {
        host: HOST_NET,
        container: CONTAINER_NET,
    };
}

impl Default for AddressPlan {
    fn default() -> Self {
        Self::FIXED
    }
}
