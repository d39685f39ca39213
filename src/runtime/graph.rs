//! Instance graph: an arena-backed forest of decoder instances
//!
//! Instances live in a [`Slab`]; edges are stored as handles. The root list
//! holds instances fed directly from the sample stream, and every node keeps
//! its stacked children in registration order. All traversals use an explicit
//! stack so deep stacks cannot overflow the call stack.

use super::errors::{Error, Result};
use super::instance::{DecoderInstance, LogicHandle};
use slab::Slab;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Handle to an instance within one session's graph
///
/// Serials are unique within the process, so a handle is stale both after its
/// instance was freed and when presented to any other session's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    slot: usize,
    serial: u64,
}

impl InstanceHandle {
    pub fn slot(&self) -> usize {
        self.slot
    }
}

struct Node {
    serial: u64,
    instance: DecoderInstance,
    parent: Option<InstanceHandle>,
    children: Vec<InstanceHandle>,
}

/// Forest of decoder instances owned by one session
pub struct InstanceGraph {
    nodes: Slab<Node>,
    roots: Vec<InstanceHandle>,
}

impl InstanceGraph {
    pub fn new() -> Self {
        Self {
            nodes: Slab::new(),
            roots: Vec::new(),
        }
    }

    fn node(&self, handle: InstanceHandle) -> Option<&Node> {
        self.nodes
            .get(handle.slot)
            .filter(|node| node.serial == handle.serial)
    }

    fn node_mut(&mut self, handle: InstanceHandle) -> Option<&mut Node> {
        self.nodes
            .get_mut(handle.slot)
            .filter(|node| node.serial == handle.serial)
    }

    /// Append an instance to the root list
    pub(crate) fn insert_root(&mut self, instance: DecoderInstance) -> Result<InstanceHandle> {
        self.roots.try_reserve(1)?;
        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        let slot = self.nodes.insert(Node {
            serial,
            instance,
            parent: None,
            children: Vec::new(),
        });
        let handle = InstanceHandle { slot, serial };
        self.roots.push(handle);
        Ok(handle)
    }

    pub fn contains(&self, handle: InstanceHandle) -> bool {
        self.node(handle).is_some()
    }

    pub fn get(&self, handle: InstanceHandle) -> Option<&DecoderInstance> {
        self.node(handle).map(|n| &n.instance)
    }

    pub fn get_mut(&mut self, handle: InstanceHandle) -> Option<&mut DecoderInstance> {
        self.node_mut(handle).map(|n| &mut n.instance)
    }

    /// Resolve a handle or fail with an argument error
    pub(crate) fn require(&self, handle: InstanceHandle) -> Result<&DecoderInstance> {
        self.get(handle)
            .ok_or_else(|| Error::arg(format!("stale instance handle {:?}", handle)))
    }

    pub(crate) fn require_mut(&mut self, handle: InstanceHandle) -> Result<&mut DecoderInstance> {
        self.get_mut(handle)
            .ok_or_else(|| Error::arg(format!("stale instance handle {:?}", handle)))
    }

    /// Instances fed directly from the sample stream
    pub fn roots(&self) -> &[InstanceHandle] {
        &self.roots
    }

    /// Instances stacked on `handle`, in registration order
    pub fn children(&self, handle: InstanceHandle) -> &[InstanceHandle] {
        self.node(handle).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, handle: InstanceHandle) -> Option<InstanceHandle> {
        self.node(handle).and_then(|n| n.parent)
    }

    /// Number of live instances, reachable or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True if `ancestor` is `handle` itself or lies on its parent chain
    pub fn is_ancestor_or_self(&self, ancestor: InstanceHandle, handle: InstanceHandle) -> bool {
        let mut current = Some(handle);
        while let Some(h) = current {
            if h == ancestor {
                return true;
            }
            current = self.parent(h);
        }
        false
    }

    /// Make `to` the last child of `from`
    ///
    /// `to` leaves the root list or its previous parent. Re-stacking an
    /// existing pair changes nothing; stacking an instance onto itself or onto
    /// one of its descendants is rejected.
    pub(crate) fn stack(&mut self, from: InstanceHandle, to: InstanceHandle) -> Result<()> {
        if !self.contains(from) || !self.contains(to) {
            return Err(Error::arg("invalid from/to instance pair"));
        }
        if self.parent(to) == Some(from) {
            debug!("instance already stacked on this parent, nothing to do");
            return Ok(());
        }
        if self.is_ancestor_or_self(to, from) {
            return Err(Error::arg("stacking would create a cycle"));
        }

        if let Some(node) = self.node_mut(from) {
            node.children.try_reserve(1)?;
        }
        self.detach(to);
        if let Some(node) = self.node_mut(from) {
            node.children.push(to);
        }
        if let Some(node) = self.node_mut(to) {
            node.parent = Some(from);
        }
        Ok(())
    }

    /// Remove `handle` from its parent's child list or from the root list
    fn detach(&mut self, handle: InstanceHandle) {
        match self.parent(handle) {
            Some(parent) => {
                if let Some(node) = self.node_mut(parent) {
                    node.children.retain(|c| *c != handle);
                }
                if let Some(node) = self.node_mut(handle) {
                    node.parent = None;
                }
            }
            None => self.roots.retain(|r| *r != handle),
        }
    }

    /// Remove one instance; its children stay in the arena, detached
    pub(crate) fn remove(&mut self, handle: InstanceHandle) -> Option<DecoderInstance> {
        if !self.contains(handle) {
            return None;
        }
        self.detach(handle);
        let node = self.nodes.remove(handle.slot);
        for child in &node.children {
            if let Some(c) = self.node_mut(*child) {
                c.parent = None;
            }
        }
        Some(node.instance)
    }

    /// Handles of `start` and all its descendants, children before parents
    pub fn postorder(&self, start: &[InstanceHandle]) -> Vec<InstanceHandle> {
        let mut out = Vec::new();
        let mut stack: Vec<(InstanceHandle, bool)> = start.iter().rev().map(|h| (*h, false)).collect();
        while let Some((handle, expanded)) = stack.pop() {
            if expanded {
                out.push(handle);
                continue;
            }
            stack.push((handle, true));
            for child in self.children(handle).iter().rev() {
                stack.push((*child, false));
            }
        }
        out
    }

    /// Handles of `start` and all its descendants in pre-order: each node,
    /// then its subtree, then its next sibling
    pub fn preorder(&self, start: &[InstanceHandle]) -> Vec<InstanceHandle> {
        let mut out = Vec::new();
        let mut stack: Vec<InstanceHandle> = start.iter().rev().copied().collect();
        while let Some(handle) = stack.pop() {
            out.push(handle);
            stack.extend(self.children(handle).iter().rev());
        }
        out
    }

    /// First root whose instance id is `id`
    pub fn find_root_by_id(&self, id: &str) -> Option<InstanceHandle> {
        self.roots
            .iter()
            .copied()
            .find(|h| self.get(*h).is_some_and(|i| i.id() == id))
    }

    /// Depth-first search for the instance owning `logic`
    ///
    /// Searches `subtree` (the node and its descendants) or, if `None`, the
    /// whole forest from the roots.
    pub fn find_by_logic_handle(
        &self,
        subtree: Option<InstanceHandle>,
        logic: LogicHandle,
    ) -> Option<InstanceHandle> {
        let start = match subtree {
            Some(h) => vec![h],
            None => self.roots.clone(),
        };
        let mut stack: Vec<InstanceHandle> = start.into_iter().rev().collect();
        while let Some(handle) = stack.pop() {
            let node = self.node(handle)?;
            if node.instance.logic_handle() == logic {
                return Some(handle);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Remove `subtree` (or every root's tree) children-first
    ///
    /// When operating on the roots, instances orphaned by earlier shallow
    /// removals are swept as well and the root list ends up empty.
    pub(crate) fn remove_all(&mut self, subtree: Option<InstanceHandle>) -> Vec<DecoderInstance> {
        let order = match subtree {
            Some(h) if self.contains(h) => self.postorder(&[h]),
            Some(_) => Vec::new(),
            None => {
                let mut start = self.roots.clone();
                start.extend(self.orphans());
                self.postorder(&start)
            }
        };

        let mut removed = Vec::with_capacity(order.len());
        for handle in order {
            if let Some(instance) = self.remove(handle) {
                removed.push(instance);
            }
        }
        if subtree.is_none() {
            self.roots.clear();
        }
        removed
    }

    /// Detached instances: neither a root nor anyone's child
    fn orphans(&self) -> Vec<InstanceHandle> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(slot, node)| InstanceHandle {
                slot,
                serial: node.serial,
            })
            .filter(|h| !self.roots.contains(h))
            .collect()
    }
}

impl Default for InstanceGraph {
    fn default() -> Self {
        Self::new()
    }
}
