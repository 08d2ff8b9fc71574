//! Virtual ethernet pair creation.

use strand_common::{StrandError, StrandResult};

use crate::link::{LinkBackend, LinkInfo, VethSpec, find_link, resolve_link};
use crate::naming::random_veth_name;

/// Attempts before giving up on finding a free host-side name.
pub const MAX_NAME_ATTEMPTS: usize = 10;

/// A freshly created veth pair, both ends still in the creating namespace.
#[derive(Debug, Clone)]
pub struct VethPair {
    /// Generated host-side name.
    pub host_name: String,
    /// Container-side end.
    pub container: LinkInfo,
    /// Host-side end.
    pub host: LinkInfo,
}

/// Outcome of a single creation attempt.
enum Attempt {
    Created,
    /// The generated host-side name is taken; try another.
    HostNameTaken,
}

/// Creates veth pairs, retrying when the generated peer name collides.
pub struct VethFactory<'a, B: ?Sized, N> {
    backend: &'a B,
    namer: N,
}

impl<'a, B> VethFactory<'a, B, fn() -> StrandResult<String>>
where
    B: LinkBackend + ?Sized,
{
    /// Factory using [`random_veth_name`] for host-side names.
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            namer: random_veth_name,
        }
    }
}

impl<'a, B, N> VethFactory<'a, B, N>
where
    B: LinkBackend + ?Sized,
    N: FnMut() -> StrandResult<String>,
{
    /// Factory with a custom host-side name generator.
    pub const fn with_namer(backend: &'a B, namer: N) -> Self {
        Self { backend, namer }
    }

    /// Create a pair whose container end is called `container_name`.
    ///
    /// Only host-side collisions are retried. If the kernel reports a clash
    /// but the generated name is free, the container-side name is the one in
    /// use and retrying cannot help.
    pub async fn create_pair(&mut self, container_name: &str, mtu: u32) -> StrandResult<VethPair> {
        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let host_name = (self.namer)()?;

            match self.try_create(container_name, &host_name, mtu).await? {
                Attempt::Created => {
                    tracing::debug!(
                        container = container_name,
                        host = %host_name,
                        attempt,
                        "Created veth pair"
                    );
                    return match self.resolve_pair(container_name, &host_name).await {
                        Ok((container, host)) => Ok(VethPair {
                            host_name,
                            container,
                            host,
                        }),
                        Err(err) => {
                            self.discard(container_name, &host_name).await;
                            Err(err)
                        }
                    };
                }
                Attempt::HostNameTaken => {
                    tracing::debug!(host = %host_name, attempt, "Host veth name taken, retrying");
                }
            }
        }

        Err(StrandError::NameExhaustion {
            attempts: MAX_NAME_ATTEMPTS,
        })
    }

    async fn resolve_pair(
        &self,
        container_name: &str,
        host_name: &str,
    ) -> StrandResult<(LinkInfo, LinkInfo)> {
        let container = resolve_link(self.backend, container_name).await?;
        let host = resolve_link(self.backend, host_name).await?;
        Ok((container, host))
    }

    /// Best-effort removal of a pair that was created but could not be read
    /// back. Either end that still resolves is enough, since deleting one end
    /// removes both.
    async fn discard(&self, container_name: &str, host_name: &str) {
        for name in [container_name, host_name] {
            let Ok(Some(link)) = self.backend.link_by_name(name).await else {
                continue;
            };
            match self.backend.delete_link(&link).await {
                Ok(()) => tracing::warn!(link = name, "Removed veth pair after failed lookup"),
                Err(e) => tracing::warn!(
                    link = name,
                    error = %e,
                    "Failed to remove veth pair, it may be left behind"
                ),
            }
            return;
        }

        tracing::warn!(
            container = container_name,
            host = host_name,
            "Neither veth end resolves, pair may be left behind"
        );
    }

    async fn try_create(
        &self,
        container_name: &str,
        host_name: &str,
        mtu: u32,
    ) -> StrandResult<Attempt> {
        let spec = VethSpec {
            name: container_name.to_string(),
            peer_name: host_name.to_string(),
            mtu,
            up: true,
        };

        match self.backend.add_veth(&spec).await {
            Ok(()) => Ok(Attempt::Created),
            Err(e) if e.is_exists() => {
                if find_link(self.backend, host_name).await?.is_some() {
                    Ok(Attempt::HostNameTaken)
                } else {
                    Err(StrandError::DuplicateInterface {
                        name: container_name.to_string(),
                    })
                }
            }
            Err(e) => Err(StrandError::LinkCreation {
                name: container_name.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
