//! Network namespace handles and scoped entry.
//!
//! A namespace switch only affects the calling thread. [`run_isolated`] gives
//! each attachment its own OS thread so a switched thread is never shared with
//! unrelated work, and [`NetNsGuard`] switches back on every exit path.

use std::cell::Cell;
use std::fs::File;
use std::future::Future;
use std::marker::PhantomData;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::{Path, PathBuf};

use rustix::thread::{LinkNameSpaceType, move_into_link_name_space};
use strand_common::{StrandError, StrandResult};

/// Namespace of the calling thread.
const THREAD_NETNS: &str = "/proc/thread-self/ns/net";

thread_local! {
    static RESTORE_FAILED: Cell<bool> = const { Cell::new(false) };
}

/// An open network namespace.
///
/// The descriptor is closed when the handle is dropped.
#[derive(Debug)]
pub struct NetNs {
    fd: OwnedFd,
    path: Option<PathBuf>,
}

impl NetNs {
    /// Open the namespace bound at `path` (e.g. `/var/run/netns/test1`).
    pub fn from_path(path: impl AsRef<Path>) -> StrandResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| StrandError::NamespaceOpen {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::trace!(path = %path.display(), "Opened network namespace");

        Ok(Self {
            fd: file.into(),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open the namespace the calling thread currently runs in.
    pub fn current() -> StrandResult<Self> {
        let file = File::open(THREAD_NETNS).map_err(|e| StrandError::NamespaceOpen {
            path: THREAD_NETNS.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            fd: file.into(),
            path: None,
        })
    }

    /// Path the namespace was opened from, `None` for the inherited one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Human-readable name for logs and errors.
    #[must_use]
    pub fn describe(&self) -> String {
        self.path
            .as_ref()
            .map_or_else(|| "host netns".to_string(), |p| p.display().to_string())
    }

    /// Switch the calling thread into this namespace.
    ///
    /// The previous namespace is captured first and restored when the
    /// returned guard is dropped.
    pub fn enter(&self) -> StrandResult<NetNsGuard> {
        let original = Self::current()?;

        move_into_link_name_space(self.fd.as_fd(), Some(LinkNameSpaceType::Network)).map_err(
            |e| StrandError::NamespaceEnter {
                path: self.describe(),
                reason: e.to_string(),
            },
        )?;

        tracing::debug!(netns = %self.describe(), "Entered network namespace");

        Ok(NetNsGuard {
            original,
            _not_send: PhantomData,
        })
    }
}

impl AsFd for NetNs {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// Keeps the calling thread inside a namespace until dropped.
///
/// Not `Send`: the switch belongs to the thread that made it.
#[derive(Debug)]
#[must_use = "dropping the guard immediately leaves the namespace"]
pub struct NetNsGuard {
    original: NetNs,
    _not_send: PhantomData<*const ()>,
}

impl Drop for NetNsGuard {
    fn drop(&mut self) {
        match move_into_link_name_space(self.original.fd.as_fd(), Some(LinkNameSpaceType::Network))
        {
            Ok(()) => tracing::debug!("Restored original network namespace"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to restore original network namespace");
                RESTORE_FAILED.with(|flag| flag.set(true));
            }
        }
    }
}

/// Run namespace-sensitive async work on a dedicated thread.
///
/// The closure builds its future on a fresh OS thread that drives it with a
/// single-threaded runtime, so every netlink call and every namespace switch
/// happen on that one thread. The thread exits afterwards, which also
/// discards it if a guard failed to switch back.
pub fn run_isolated<F, Fut, T>(f: F) -> StrandResult<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = StrandResult<T>>,
    T: Send + 'static,
{
    let worker = std::thread::Builder::new()
        .name("strand-netns".to_string())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let result = runtime.block_on(f());

            if RESTORE_FAILED.with(Cell::get) {
                return Err(StrandError::NamespaceRestore);
            }
            result
        })?;

    worker.join().map_err(|_| StrandError::Internal {
        message: "namespace worker thread panicked".to_string(),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_path() {
        let err = NetNs::from_path("/var/run/netns/strand-does-not-exist").unwrap_err();
        assert!(matches!(err, StrandError::NamespaceOpen { .. }));
        assert!(err.to_string().contains("strand-does-not-exist"));
    }

    #[test]
    fn current_has_no_path() {
        let ns = NetNs::current().unwrap();
        assert!(ns.path().is_none());
        assert_eq!(ns.describe(), "host netns");
    }

    #[test]
    fn run_isolated_uses_fresh_thread() {
        let caller = std::thread::current().id();
        let worker = run_isolated(|| async { Ok(std::thread::current().id()) }).unwrap();
        assert_ne!(caller, worker);
    }

    #[test]
    fn run_isolated_propagates_errors() {
        let err = run_isolated(|| async {
            Err::<(), _>(StrandError::LinkNotFound {
                name: "eth0".to_string(),
            })
        })
        .unwrap_err();
        assert!(matches!(err, StrandError::LinkNotFound { .. }));
    }
}
