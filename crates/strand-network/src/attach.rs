//! Attaching and detaching a container's network namespace.
//!
//! [`attach`] builds a veth pair inside the container namespace, keeps one end
//! there and moves the other to the host; [`detach`] deletes the container
//! end, which takes the host end with it.
//!
//! Both run on a dedicated thread (see [`run_isolated`]) and open one netlink
//! connection per namespace, since a netlink socket stays bound to the
//! namespace it was opened in.

use std::future::Future;
use std::path::{Path, PathBuf};

use ipnet::Ipv4Net;
use strand_common::addressing::DEFAULT_MTU;
use strand_common::{AddressPlan, ContainerId, StrandError, StrandResult};

use crate::addr::{assign, bring_up};
use crate::link::{LinkBackend, LinkInfo, find_link, resolve_link};
use crate::migrate::move_to_namespace;
use crate::netlink::NetlinkBackend;
use crate::netns::{NetNs, run_isolated};
use crate::result::{AttachmentResult, InterfaceRecord, IpConfig};
use crate::veth::{VethFactory, VethPair};

/// Input for [`attach`] and [`verify`].
#[derive(Debug, Clone)]
pub struct SetupRequest {
    /// Container the namespace belongs to; only logged.
    pub container_id: ContainerId,
    /// Path of the container's network namespace.
    pub netns: PathBuf,
    /// Name of the container-side interface.
    pub if_name: String,
    /// MTU for both ends.
    pub mtu: u32,
    /// Addresses for both ends.
    pub plan: AddressPlan,
}

impl SetupRequest {
    /// Request with the default MTU and the fixed address plan.
    pub fn new(container_id: ContainerId, netns: impl Into<PathBuf>, if_name: &str) -> Self {
        Self {
            container_id,
            netns: netns.into(),
            if_name: if_name.to_string(),
            mtu: DEFAULT_MTU,
            plan: AddressPlan::default(),
        }
    }

    /// Override the MTU.
    #[must_use]
    pub const fn with_mtu(mut self, mtu: u32) -> Self {
        self.mtu = mtu;
        self
    }

    /// Override the addresses of both ends.
    #[must_use]
    pub const fn with_plan(mut self, plan: AddressPlan) -> Self {
        self.plan = plan;
        self
    }
}

/// Input for [`detach`].
#[derive(Debug, Clone)]
pub struct TeardownRequest {
    /// Container the namespace belongs to; only logged.
    pub container_id: ContainerId,
    /// Namespace path; `None` when the runtime has already released it.
    pub netns: Option<PathBuf>,
    /// Name of the container-side interface.
    pub if_name: String,
}

impl TeardownRequest {
    /// Build a request; an empty `netns` means there is nothing to tear down.
    pub fn new(container_id: ContainerId, netns: impl AsRef<Path>, if_name: &str) -> Self {
        let netns = netns.as_ref();
        Self {
            container_id,
            netns: (!netns.as_os_str().is_empty()).then(|| netns.to_path_buf()),
            if_name: if_name.to_string(),
        }
    }
}

/// What the container-side phase hands to the host-side phase.
#[derive(Debug)]
struct ContainerSide {
    container: LinkInfo,
    host_name: String,
    /// Host end as seen before the move; name and MAC survive it.
    host_record: InterfaceRecord,
}

/// Create the veth pair for `req` and configure both ends.
///
/// On failure the partially built pair is deleted before the error is
/// returned.
pub fn attach(req: SetupRequest) -> StrandResult<AttachmentResult> {
    tracing::info!(
        container = %req.container_id.short(),
        netns = %req.netns.display(),
        if_name = %req.if_name,
        "Attaching container"
    );

    run_isolated(move || async move {
        let host_ns = NetNs::current()?;
        let container_ns = NetNs::from_path(&req.netns)?;

        let side = {
            let _guard = container_ns.enter()?;
            let backend = NetlinkBackend::connect()?;
            setup_container_side(&backend, &req, &host_ns).await?
        };

        complete_host_side(
            NetlinkBackend::connect(),
            &side.host_name,
            req.plan.host,
            discard_container_end(&container_ns, &req.if_name),
        )
        .await?;

        tracing::info!(
            container = %req.container_id.short(),
            host_if = %side.host_name,
            "Container attached"
        );
        Ok(assemble(&req, side))
    })
}

/// Delete the container-side interface and return the address it carried.
///
/// Missing namespaces and missing links are treated as already detached.
pub fn detach(req: TeardownRequest) -> StrandResult<Option<Ipv4Net>> {
    let Some(netns) = req.netns.clone() else {
        tracing::debug!(container = %req.container_id.short(), "No netns, nothing to detach");
        return Ok(None);
    };

    tracing::info!(
        container = %req.container_id.short(),
        netns = %netns.display(),
        if_name = %req.if_name,
        "Detaching container"
    );

    let freed = run_isolated(move || async move {
        let ns = NetNs::from_path(&netns)?;
        let _guard = ns.enter()?;
        let backend = NetlinkBackend::connect()?;
        teardown_link(&backend, &req.if_name).await
    })?;

    tracing::info!(freed = ?freed, "Container detached");
    Ok(freed)
}

/// Confirm the container-side interface of `req` is up and addressed.
pub fn verify(req: SetupRequest) -> StrandResult<()> {
    run_isolated(move || async move {
        let ns = NetNs::from_path(&req.netns)?;
        let _guard = ns.enter()?;
        let backend = NetlinkBackend::connect()?;
        verify_link(&backend, &req.if_name, req.plan.container).await
    })
}

async fn setup_container_side<B: LinkBackend + ?Sized>(
    backend: &B,
    req: &SetupRequest,
    host_ns: &NetNs,
) -> StrandResult<ContainerSide> {
    let pair = VethFactory::new(backend)
        .create_pair(&req.if_name, req.mtu)
        .await?;
    let container = pair.container.clone();

    let outcome = finish_container_side(backend, pair, req.plan.container, host_ns).await;
    if outcome.is_err() {
        rollback(backend, &container).await;
    }
    outcome
}

async fn finish_container_side<B: LinkBackend + ?Sized>(
    backend: &B,
    pair: VethPair,
    address: Ipv4Net,
    host_ns: &NetNs,
) -> StrandResult<ContainerSide> {
    bring_up(backend, &pair.container).await?;
    assign(backend, &pair.container, address).await?;

    // Read the MAC now; after the move only the name can be trusted.
    let host = resolve_link(backend, &pair.host_name).await?;
    let host_record = InterfaceRecord::host(&host);
    move_to_namespace(backend, host, host_ns).await?;

    Ok(ContainerSide {
        container: pair.container,
        host_name: pair.host_name,
        host_record,
    })
}

/// Configure the host end. If that fails, `discard_container` runs to
/// delete the container end, which takes the host end with it.
async fn complete_host_side<B: LinkBackend>(
    backend: StrandResult<B>,
    host_name: &str,
    address: Ipv4Net,
    discard_container: impl Future<Output = StrandResult<()>>,
) -> StrandResult<()> {
    let outcome = match backend {
        Ok(backend) => configure_host_side(&backend, host_name, address).await,
        Err(err) => Err(err),
    };

    if let Err(err) = outcome {
        if let Err(e) = discard_container.await {
            tracing::warn!(
                error = %e,
                "Failed to remove container end, veth pair may be left behind"
            );
        }
        return Err(err);
    }
    Ok(())
}

async fn discard_container_end(ns: &NetNs, if_name: &str) -> StrandResult<()> {
    let _guard = ns.enter()?;
    let backend = NetlinkBackend::connect()?;
    remove_link(&backend, if_name).await
}

async fn configure_host_side<B: LinkBackend + ?Sized>(
    backend: &B,
    host_name: &str,
    address: Ipv4Net,
) -> StrandResult<()> {
    let host = resolve_link(backend, host_name).await?;

    let outcome = async {
        assign(backend, &host, address).await?;
        bring_up(backend, &host).await
    }
    .await;

    if let Err(err) = outcome {
        rollback(backend, &host).await;
        return Err(err);
    }
    Ok(())
}

/// Best-effort removal of a half-configured pair. Deleting either end
/// removes both.
async fn rollback<B: LinkBackend + ?Sized>(backend: &B, link: &LinkInfo) {
    match backend.delete_link(link).await {
        Ok(()) => tracing::warn!(link = %link.name, "Rolled back veth pair after failure"),
        Err(e) => tracing::warn!(
            link = %link.name,
            error = %e,
            "Failed to roll back veth pair, it may be left behind"
        ),
    }
}

/// Delete `if_name` if it is still present.
async fn remove_link<B: LinkBackend + ?Sized>(backend: &B, if_name: &str) -> StrandResult<()> {
    let Some(link) = find_link(backend, if_name).await? else {
        return Ok(());
    };

    backend
        .delete_link(&link)
        .await
        .map_err(|e| StrandError::LinkDelete {
            name: if_name.to_string(),
            reason: e.to_string(),
        })?;
    tracing::warn!(link = if_name, "Rolled back veth pair after failure");
    Ok(())
}

fn assemble(req: &SetupRequest, side: ContainerSide) -> AttachmentResult {
    AttachmentResult::new(
        vec![
            side.host_record,
            InterfaceRecord::sandboxed(&side.container, &req.netns),
        ],
        vec![IpConfig::v4(req.plan.host, 0)],
    )
}

async fn teardown_link<B: LinkBackend + ?Sized>(
    backend: &B,
    if_name: &str,
) -> StrandResult<Option<Ipv4Net>> {
    let Some(link) = find_link(backend, if_name).await? else {
        tracing::debug!(if_name, "Link already gone");
        return Ok(None);
    };

    let addresses = backend
        .addresses(&link)
        .await
        .map_err(|e| StrandError::LinkLookup {
            name: if_name.to_string(),
            reason: e.to_string(),
        })?;
    let freed = addresses
        .first()
        .copied()
        .ok_or_else(|| StrandError::NoAddress {
            name: if_name.to_string(),
        })?;

    backend
        .delete_link(&link)
        .await
        .map_err(|e| StrandError::LinkDelete {
            name: if_name.to_string(),
            reason: e.to_string(),
        })?;

    tracing::debug!(if_name, %freed, "Deleted link");
    Ok(Some(freed))
}

async fn verify_link<B: LinkBackend + ?Sized>(
    backend: &B,
    if_name: &str,
    expected: Ipv4Net,
) -> StrandResult<()> {
    let link = resolve_link(backend, if_name).await?;
    if !link.up {
        return Err(StrandError::CheckFailed {
            name: if_name.to_string(),
            reason: "link is down".to_string(),
        });
    }

    let addresses = backend
        .addresses(&link)
        .await
        .map_err(|e| StrandError::LinkLookup {
            name: if_name.to_string(),
            reason: e.to_string(),
        })?;
    if !addresses.contains(&expected) {
        return Err(StrandError::CheckFailed {
            name: if_name.to_string(),
            reason: format!("expected address {expected}, found {addresses:?}"),
        });
    }
    Ok(())
}
