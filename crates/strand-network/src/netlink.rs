//! rtnetlink implementation of [`LinkBackend`].

use std::net::IpAddr;
use std::os::fd::{AsRawFd, BorrowedFd};

use async_trait::async_trait;
use futures::TryStreamExt;
use ipnet::Ipv4Net;
use rtnetlink::packet_route::address::{AddressAttribute, AddressMessage};
use rtnetlink::packet_route::link::{LinkAttribute, LinkFlags, LinkMessage};
use rtnetlink::{Handle, LinkUnspec, LinkVeth, new_connection};
use strand_common::{StrandError, StrandResult};

use crate::link::{KernelError, LinkBackend, LinkInfo, MacAddr, VethSpec};

/// Netlink connection bound to the namespace that was current when it was
/// opened.
///
/// Entering another namespace later does not move the socket, so open one
/// backend per namespace.
pub struct NetlinkBackend {
    handle: Handle,
}

impl NetlinkBackend {
    /// Open a route netlink socket and drive it on the current runtime.
    pub fn connect() -> StrandResult<Self> {
        let (connection, handle, _) = new_connection().map_err(|e| StrandError::Netlink {
            reason: e.to_string(),
        })?;
        tokio::spawn(connection);

        Ok(Self { handle })
    }
}

fn kernel_error(err: rtnetlink::Error) -> KernelError {
    if let rtnetlink::Error::NetlinkError(msg) = &err {
        let code = msg.raw_code();
        if code != 0 {
            return KernelError::from_errno(code.abs(), err.to_string());
        }
    }
    KernelError::other(err.to_string())
}

fn link_info(msg: &LinkMessage) -> LinkInfo {
    let mut info = LinkInfo {
        index: msg.header.index,
        name: String::new(),
        mac: None,
        mtu: None,
        up: msg.header.flags.contains(LinkFlags::Up),
    };

    for attr in &msg.attributes {
        match attr {
            LinkAttribute::IfName(name) => info.name.clone_from(name),
            LinkAttribute::Address(bytes) => info.mac = MacAddr::from_bytes(bytes),
            LinkAttribute::Mtu(mtu) => info.mtu = Some(*mtu),
            _ => {}
        }
    }

    info
}

fn ipv4_addresses(msg: &AddressMessage) -> impl Iterator<Item = Ipv4Net> + '_ {
    let prefix = msg.header.prefix_len;
    msg.attributes.iter().filter_map(move |attr| match attr {
        AddressAttribute::Address(IpAddr::V4(ip)) => Ipv4Net::new(*ip, prefix).ok(),
        _ => None,
    })
}

#[async_trait]
impl LinkBackend for NetlinkBackend {
    async fn add_veth(&self, spec: &VethSpec) -> Result<(), KernelError> {
        let mut builder = LinkVeth::new(&spec.name, &spec.peer_name).mtu(spec.mtu);
        if spec.up {
            builder = builder.up();
        }

        self.handle
            .link()
            .add(builder.build())
            .execute()
            .await
            .map_err(kernel_error)
    }

    async fn link_by_name(&self, name: &str) -> Result<Option<LinkInfo>, KernelError> {
        let mut links = self
            .handle
            .link()
            .get()
            .match_name(name.to_string())
            .execute();

        match links.try_next().await {
            Ok(msg) => Ok(msg.as_ref().map(link_info)),
            Err(e) => {
                let e = kernel_error(e);
                if e.is_not_found() { Ok(None) } else { Err(e) }
            }
        }
    }

    async fn set_up(&self, link: &LinkInfo) -> Result<(), KernelError> {
        self.handle
            .link()
            .set(LinkUnspec::new_with_index(link.index).up().build())
            .execute()
            .await
            .map_err(kernel_error)
    }

    async fn add_address(&self, link: &LinkInfo, address: Ipv4Net) -> Result<(), KernelError> {
        self.handle
            .address()
            .add(link.index, IpAddr::V4(address.addr()), address.prefix_len())
            .execute()
            .await
            .map_err(kernel_error)
    }

    async fn addresses(&self, link: &LinkInfo) -> Result<Vec<Ipv4Net>, KernelError> {
        let mut messages = self
            .handle
            .address()
            .get()
            .set_link_index_filter(link.index)
            .execute();

        let mut found = Vec::new();
        while let Some(msg) = messages.try_next().await.map_err(kernel_error)? {
            found.extend(ipv4_addresses(&msg));
        }
        Ok(found)
    }

    async fn move_to_netns(
        &self,
        link: &LinkInfo,
        target: BorrowedFd<'_>,
    ) -> Result<(), KernelError> {
        self.handle
            .link()
            .set(
                LinkUnspec::new_with_index(link.index)
                    .setns_by_fd(target.as_raw_fd())
                    .build(),
            )
            .execute()
            .await
            .map_err(kernel_error)
    }

    async fn delete_link(&self, link: &LinkInfo) -> Result<(), KernelError> {
        self.handle
            .link()
            .del(link.index)
            .execute()
            .await
            .map_err(kernel_error)
    }
}
