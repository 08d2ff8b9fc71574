//! Address assignment and link state.

use ipnet::Ipv4Net;
use strand_common::{StrandError, StrandResult};

use crate::link::{LinkBackend, LinkInfo};

/// Parse an IPv4 CIDR such as `10.200.1.1/24`.
pub fn parse_cidr(input: &str) -> StrandResult<Ipv4Net> {
    input
        .trim()
        .parse::<Ipv4Net>()
        .map_err(|e| StrandError::AddressParse {
            input: input.to_string(),
            reason: e.to_string(),
        })
}

/// Attach `address` to `link`.
pub async fn assign<B: LinkBackend + ?Sized>(
    backend: &B,
    link: &LinkInfo,
    address: Ipv4Net,
) -> StrandResult<()> {
    tracing::debug!(link = %link.name, %address, "Assigning address");

    backend
        .add_address(link, address)
        .await
        .map_err(|e| StrandError::AddressAssign {
            name: link.name.clone(),
            address: address.to_string(),
            reason: e.to_string(),
        })
}

/// Set `link` administratively up.
pub async fn bring_up<B: LinkBackend + ?Sized>(backend: &B, link: &LinkInfo) -> StrandResult<()> {
    tracing::debug!(link = %link.name, "Bringing link up");

    backend
        .set_up(link)
        .await
        .map_err(|e| StrandError::LinkState {
            name: link.name.clone(),
            reason: e.to_string(),
        })
}
