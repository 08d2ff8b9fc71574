//! In-memory kernel for exercising the attachment logic without privileges.
//!
//! Models what the real kernel does to veth pairs that matters here: names
//! are unique per namespace, deleting one end removes the peer, and moving a
//! link to another namespace gives it a new index, takes it down and flushes
//! its addresses.

use std::collections::HashMap;
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use ipnet::Ipv4Net;

use crate::link::{KernelError, LinkBackend, LinkInfo, MacAddr, VethSpec};

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOp {
    AddVeth,
    Lookup,
    SetUp,
    AddAddress,
    Move,
    Delete,
}

#[derive(Debug, Clone)]
struct FakeLink {
    id: u64,
    ns: String,
    index: u32,
    name: String,
    mtu: u32,
    up: bool,
    addrs: Vec<Ipv4Net>,
    peer: Option<u64>,
}

impl FakeLink {
    fn info(&self) -> LinkInfo {
        let id = self.id.to_be_bytes();
        LinkInfo {
            index: self.index,
            name: self.name.clone(),
            mac: Some(MacAddr([0x02, 0, 0, 0, id[6], id[7]])),
            mtu: Some(self.mtu),
            up: self.up,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    next_index: u32,
    links: Vec<FakeLink>,
    namespaces: HashMap<RawFd, String>,
    failures: HashMap<(FailOp, String), KernelError>,
    veth_attempts: usize,
}

impl State {
    fn allocate(&mut self) -> (u64, u32) {
        self.next_id += 1;
        self.next_index += 1;
        (self.next_id, self.next_index)
    }

    fn injected(&self, op: FailOp, name: &str) -> Result<(), KernelError> {
        self.failures
            .get(&(op, name.to_string()))
            .map_or(Ok(()), |e| Err(e.clone()))
    }

    fn position(&self, ns: &str, index: u32) -> Result<usize, KernelError> {
        self.links
            .iter()
            .position(|l| l.ns == ns && l.index == index)
            .ok_or_else(|| KernelError::from_errno(libc::ENODEV, "No such device"))
    }

    fn has_name(&self, ns: &str, name: &str) -> bool {
        self.links.iter().any(|l| l.ns == ns && l.name == name)
    }
}

/// Shared kernel state; hand out one [`FakeBackend`] per namespace.
#[derive(Debug, Clone, Default)]
pub struct FakeKernel {
    state: Arc<Mutex<State>>,
}

impl FakeKernel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn backend(&self, ns: &str) -> FakeBackend {
        FakeBackend {
            kernel: self.clone(),
            ns: ns.to_string(),
        }
    }

    /// Make `fd` name namespace `ns` for migrations.
    pub fn register_ns(&self, fd: BorrowedFd<'_>, ns: &str) {
        self.lock()
            .namespaces
            .insert(fd.as_raw_fd(), ns.to_string());
    }

    /// Add an unrelated link, e.g. to occupy a name.
    pub fn insert_link(&self, ns: &str, name: &str) {
        let mut state = self.lock();
        let (id, index) = state.allocate();
        state.links.push(FakeLink {
            id,
            ns: ns.to_string(),
            index,
            name: name.to_string(),
            mtu: 1500,
            up: false,
            addrs: Vec::new(),
            peer: None,
        });
    }

    pub fn fail(&self, op: FailOp, name: &str, err: KernelError) {
        self.lock().failures.insert((op, name.to_string()), err);
    }

    pub fn link(&self, ns: &str, name: &str) -> Option<LinkInfo> {
        self.lock()
            .links
            .iter()
            .find(|l| l.ns == ns && l.name == name)
            .map(FakeLink::info)
    }

    pub fn addresses_of(&self, ns: &str, name: &str) -> Vec<Ipv4Net> {
        self.lock()
            .links
            .iter()
            .find(|l| l.ns == ns && l.name == name)
            .map(|l| l.addrs.clone())
            .unwrap_or_default()
    }

    pub fn link_names(&self, ns: &str) -> Vec<String> {
        self.lock()
            .links
            .iter()
            .filter(|l| l.ns == ns)
            .map(|l| l.name.clone())
            .collect()
    }

    pub fn veth_attempts(&self) -> usize {
        self.lock().veth_attempts
    }
}

/// View of the fake kernel from one namespace.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    kernel: FakeKernel,
    ns: String,
}

#[async_trait]
impl LinkBackend for FakeBackend {
    async fn add_veth(&self, spec: &VethSpec) -> Result<(), KernelError> {
        let mut state = self.kernel.lock();
        state.veth_attempts += 1;
        state.injected(FailOp::AddVeth, &spec.name)?;

        if state.has_name(&self.ns, &spec.name) || state.has_name(&self.ns, &spec.peer_name) {
            return Err(KernelError::from_errno(libc::EEXIST, "File exists"));
        }

        let (id, index) = state.allocate();
        let (peer_id, peer_index) = state.allocate();
        state.links.push(FakeLink {
            id,
            ns: self.ns.clone(),
            index,
            name: spec.name.clone(),
            mtu: spec.mtu,
            up: spec.up,
            addrs: Vec::new(),
            peer: Some(peer_id),
        });
        state.links.push(FakeLink {
            id: peer_id,
            ns: self.ns.clone(),
            index: peer_index,
            name: spec.peer_name.clone(),
            mtu: spec.mtu,
            up: false,
            addrs: Vec::new(),
            peer: Some(id),
        });
        Ok(())
    }

    async fn link_by_name(&self, name: &str) -> Result<Option<LinkInfo>, KernelError> {
        let state = self.kernel.lock();
        state.injected(FailOp::Lookup, name)?;
        Ok(state
            .links
            .iter()
            .find(|l| l.ns == self.ns && l.name == name)
            .map(FakeLink::info))
    }

    async fn set_up(&self, link: &LinkInfo) -> Result<(), KernelError> {
        let mut state = self.kernel.lock();
        state.injected(FailOp::SetUp, &link.name)?;
        let pos = state.position(&self.ns, link.index)?;
        state.links[pos].up = true;
        Ok(())
    }

    async fn add_address(&self, link: &LinkInfo, address: Ipv4Net) -> Result<(), KernelError> {
        let mut state = self.kernel.lock();
        state.injected(FailOp::AddAddress, &link.name)?;
        let pos = state.position(&self.ns, link.index)?;
        let addrs = &mut state.links[pos].addrs;
        if addrs.contains(&address) {
            return Err(KernelError::from_errno(libc::EEXIST, "File exists"));
        }
        addrs.push(address);
        Ok(())
    }

    async fn addresses(&self, link: &LinkInfo) -> Result<Vec<Ipv4Net>, KernelError> {
        let state = self.kernel.lock();
        let pos = state.position(&self.ns, link.index)?;
        Ok(state.links[pos].addrs.clone())
    }

    async fn move_to_netns(
        &self,
        link: &LinkInfo,
        target: BorrowedFd<'_>,
    ) -> Result<(), KernelError> {
        let mut state = self.kernel.lock();
        state.injected(FailOp::Move, &link.name)?;
        let pos = state.position(&self.ns, link.index)?;
        let target_ns = state
            .namespaces
            .get(&target.as_raw_fd())
            .cloned()
            .ok_or_else(|| KernelError::from_errno(libc::EINVAL, "Invalid argument"))?;
        if state.has_name(&target_ns, &link.name) {
            return Err(KernelError::from_errno(libc::EEXIST, "File exists"));
        }

        let (_, index) = state.allocate();
        let moved = &mut state.links[pos];
        moved.ns = target_ns;
        moved.index = index;
        moved.up = false;
        moved.addrs.clear();
        Ok(())
    }

    async fn delete_link(&self, link: &LinkInfo) -> Result<(), KernelError> {
        let mut state = self.kernel.lock();
        state.injected(FailOp::Delete, &link.name)?;
        let pos = state.position(&self.ns, link.index)?;
        let removed = state.links.remove(pos);
        if let Some(peer) = removed.peer {
            state.links.retain(|l| l.id != peer);
        }
        Ok(())
    }
}
