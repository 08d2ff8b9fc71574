//! Moving links between network namespaces.

use std::os::fd::AsFd;

use strand_common::{StrandError, StrandResult};

use crate::link::{LinkBackend, LinkInfo};
use crate::netns::NetNs;

/// Move `link` into `target`.
///
/// The kernel assigns a new index in the target namespace, so the handle is
/// consumed: re-resolve the link by name from inside `target`.
pub async fn move_to_namespace<B: LinkBackend + ?Sized>(
    backend: &B,
    link: LinkInfo,
    target: &NetNs,
) -> StrandResult<()> {
    tracing::debug!(link = %link.name, target = %target.describe(), "Moving link");

    backend
        .move_to_netns(&link, target.as_fd())
        .await
        .map_err(|e| StrandError::Migration {
            name: link.name,
            target: target.describe(),
            reason: e.to_string(),
        })
}
