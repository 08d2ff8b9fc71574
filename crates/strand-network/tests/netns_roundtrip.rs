//! Round trip against the real kernel.
//!
//! Needs root and iproute2. Run with `--features integration`.
#![cfg(feature = "integration")]

use std::path::PathBuf;
use std::process::Command;

use strand_common::{ContainerId, StrandError, StrandResult};
use strand_network::{NetNs, SetupRequest, TeardownRequest, attach, detach, verify};

/// Named namespace removed on drop.
struct TestNs {
    name: String,
}

impl TestNs {
    fn create(name: &str) -> Option<Self> {
        if !rustix::process::geteuid().is_root() {
            eprintln!("Skipping: requires root");
            return None;
        }
        let status = Command::new("ip").args(["netns", "add", name]).status().ok()?;
        if !status.success() {
            eprintln!("Skipping: ip netns add {name} failed");
            return None;
        }
        Some(Self {
            name: name.to_string(),
        })
    }

    fn path(&self) -> PathBuf {
        PathBuf::from("/var/run/netns").join(&self.name)
    }

    fn has_link(&self, link: &str) -> bool {
        Command::new("ip")
            .args(["netns", "exec", &self.name, "ip", "link", "show", link])
            .output()
            .is_ok_and(|o| o.status.success())
    }
}

impl Drop for TestNs {
    fn drop(&mut self) {
        let _ = Command::new("ip")
            .args(["netns", "del", &self.name])
            .status();
    }
}

fn host_has_link(link: &str) -> bool {
    Command::new("ip")
        .args(["link", "show", link])
        .output()
        .is_ok_and(|o| o.status.success())
}

#[test]
fn attach_then_detach_twice() {
    let Some(ns) = TestNs::create("strand-it-roundtrip") else {
        return;
    };
    let id = ContainerId::new("roundtrip").unwrap();

    let result = attach(SetupRequest::new(id.clone(), ns.path(), "eth0")).unwrap();
    let host_name = result.interfaces()[0].name.clone();
    assert!(ns.has_link("eth0"));
    assert!(host_has_link(&host_name));
    assert_eq!(result.ips()[0].to_string(), "10.200.1.1/255.255.255.0");

    verify(SetupRequest::new(id.clone(), ns.path(), "eth0")).unwrap();

    let freed = detach(TeardownRequest::new(id.clone(), ns.path(), "eth0")).unwrap();
    assert_eq!(freed, Some("10.200.1.2/24".parse().unwrap()));
    assert!(!ns.has_link("eth0"));
    assert!(!host_has_link(&host_name));

    assert_eq!(
        detach(TeardownRequest::new(id, ns.path(), "eth0")).unwrap(),
        None
    );
}

#[test]
fn duplicate_container_name_is_rejected() {
    let Some(ns) = TestNs::create("strand-it-duplicate") else {
        return;
    };
    let status = Command::new("ip")
        .args([
            "netns", "exec", &ns.name, "ip", "link", "add", "eth0", "type", "veth", "peer",
            "name", "pp0",
        ])
        .status()
        .unwrap();
    assert!(status.success());

    let err = attach(SetupRequest::new(
        ContainerId::new("duplicate").unwrap(),
        ns.path(),
        "eth0",
    ))
    .unwrap_err();
    assert!(matches!(err, StrandError::DuplicateInterface { .. }));
}

#[test]
fn missing_namespace_fails_to_open() {
    let err = attach(SetupRequest::new(
        ContainerId::new("missing").unwrap(),
        "/var/run/netns/strand-it-missing",
        "eth0",
    ))
    .unwrap_err();
    assert!(matches!(err, StrandError::NamespaceOpen { .. }));
}

fn thread_netns_inode() -> u64 {
    rustix::fs::stat("/proc/thread-self/ns/net").unwrap().st_ino
}

#[test]
fn guard_restores_namespace_on_drop() {
    let Some(ns) = TestNs::create("strand-it-guard") else {
        return;
    };
    let target = NetNs::from_path(ns.path()).unwrap();
    let before = thread_netns_inode();

    {
        let _guard = target.enter().unwrap();
        assert_ne!(thread_netns_inode(), before);
    }

    assert_eq!(thread_netns_inode(), before);
}

#[test]
fn guard_restores_namespace_on_error() {
    fn fail_inside(target: &NetNs) -> StrandResult<()> {
        let _guard = target.enter()?;
        Err(StrandError::LinkNotFound {
            name: "eth0".to_string(),
        })
    }

    let Some(ns) = TestNs::create("strand-it-guard-err") else {
        return;
    };
    let target = NetNs::from_path(ns.path()).unwrap();
    let before = thread_netns_inode();

    let err = fail_inside(&target).unwrap_err();
    assert!(matches!(err, StrandError::LinkNotFound { .. }));
    assert_eq!(thread_netns_inode(), before);
}
