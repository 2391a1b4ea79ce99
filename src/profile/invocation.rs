//=====================================================
// File: profile/invocation.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Call-tree nodes for the invocation profiler
// Objective: Arena-backed nodes with index parent links so the root can be
//            replaced without touching the rest of the tree
//=====================================================

use std::collections::BTreeMap;

/// Handle into an [`InvocationArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvocationId(u32);

impl InvocationId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Every execution of one method serial under one parent path.
#[derive(Debug, Clone)]
pub struct Invocation {
    serial: u32,
    duration: u64,
    count: u64,
    recursive_depth: u32,
    parent: Option<InvocationId>,
    children: BTreeMap<u32, InvocationId>,
}

impl Invocation {
    fn new(serial: u32, parent: Option<InvocationId>) -> Self {
        Self {
            serial,
            duration: 0,
            count: 0,
            recursive_depth: 0,
            parent,
            children: BTreeMap::new(),
        }
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Accumulated nanoseconds.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// `1` plus the number of ancestors with the same serial; `0` until
    /// results are computed.
    pub fn recursive_depth(&self) -> u32 {
        self.recursive_depth
    }

    pub fn parent(&self) -> Option<InvocationId> {
        self.parent
    }

    /// Children keyed by callee serial.
    pub fn children(&self) -> &BTreeMap<u32, InvocationId> {
        &self.children
    }

    pub fn child(&self, serial: u32) -> Option<InvocationId> {
        self.children.get(&serial).copied()
    }
}

/// Bump allocator for invocation nodes.
#[derive(Debug, Default)]
pub struct InvocationArena {
    nodes: Vec<Invocation>,
}

impl InvocationArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, serial: u32, parent: Option<InvocationId>) -> InvocationId {
        let id = InvocationId(self.nodes.len() as u32);
        self.nodes.push(Invocation::new(serial, parent));
        id
    }

    /// Ids handed out by this arena always resolve.
    pub fn get(&self, id: InvocationId) -> &Invocation {
        &self.nodes[id.index()]
    }

    fn get_mut(&mut self, id: InvocationId) -> &mut Invocation {
        &mut self.nodes[id.index()]
    }

    /// Child of `parent` for `serial`, created on first use.
    pub fn child_for(&mut self, parent: InvocationId, serial: u32) -> InvocationId {
        if let Some(existing) = self.get(parent).child(serial) {
            return existing;
        }
        let child = self.allocate(serial, Some(parent));
        self.get_mut(parent).children.insert(serial, child);
        child
    }

    pub fn add_duration(&mut self, id: InvocationId, nanos: u64) {
        let node = self.get_mut(id);
        node.duration = node.duration.saturating_add(nanos);
    }

    pub fn set_duration(&mut self, id: InvocationId, nanos: u64) {
        self.get_mut(id).duration = nanos;
    }

    pub fn increment_count(&mut self, id: InvocationId) {
        self.get_mut(id).count += 1;
    }

    pub fn set_recursive_depth(&mut self, id: InvocationId, depth: u32) {
        self.get_mut(id).recursive_depth = depth;
    }

    /// Copy `source` under `parent` with a new serial. The copy takes over
    /// the source's children, which are re-parented to it.
    pub fn copy_with_new_serial_and_parent(
        &mut self,
        source: InvocationId,
        serial: u32,
        parent: InvocationId,
    ) -> InvocationId {
        let original = self.get(source).clone();
        let copy = self.allocate(serial, Some(parent));
        {
            let node = self.get_mut(copy);
            node.duration = original.duration;
            node.count = original.count;
            node.children = original.children.clone();
        }
        for child in original.children.values() {
            self.get_mut(*child).parent = Some(copy);
        }
        self.get_mut(parent).children.insert(serial, copy);
        copy
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_child_per_distinct_callee() {
        let mut arena = InvocationArena::new();
        let root = arena.allocate(0, None);
        let a = arena.child_for(root, 7);
        let again = arena.child_for(root, 7);
        let b = arena.child_for(root, 9);
        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(arena.get(root).children().len(), 2);
        assert_eq!(arena.get(b).parent(), Some(root));
    }

    #[test]
    fn copies_adopt_children() {
        let mut arena = InvocationArena::new();
        let root = arena.allocate(0, None);
        let a = arena.child_for(root, 3);
        let leaf = arena.child_for(a, 4);
        arena.add_duration(a, 50);
        let new_root = arena.allocate(0, None);
        let copy = arena.copy_with_new_serial_and_parent(a, 11, new_root);
        assert_eq!(arena.get(copy).serial(), 11);
        assert_eq!(arena.get(copy).duration(), 50);
        assert_eq!(arena.get(leaf).parent(), Some(copy));
        assert_eq!(arena.get(new_root).child(11), Some(copy));
    }
}
