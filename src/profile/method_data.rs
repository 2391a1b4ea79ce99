//=====================================================
// File: profile/method_data.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Per-method aggregation over the invocation tree
// Objective: Answer time, call count and caller/callee questions for one
//            serial without double counting recursive activations
//=====================================================

use std::collections::BTreeSet;

use super::data::ProfileData;
use super::invocation::InvocationId;

/// Read-only view of every invocation node sharing one serial.
#[derive(Debug, Clone)]
pub struct MethodData<'a> {
    data: &'a ProfileData,
    serial: u32,
    invocations: Vec<InvocationId>,
}

impl<'a> MethodData<'a> {
    pub(crate) fn new(data: &'a ProfileData, serial: u32, invocations: Vec<InvocationId>) -> Self {
        Self {
            data,
            serial,
            invocations,
        }
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn invocations(&self) -> &[InvocationId] {
        &self.invocations
    }

    fn outermost(&self) -> impl Iterator<Item = InvocationId> + '_ {
        self.invocations
            .iter()
            .copied()
            .filter(|id| self.data.invocation(*id).recursive_depth() == 1)
    }

    fn children_duration(&self, id: InvocationId) -> u64 {
        self.data
            .invocation(id)
            .children()
            .values()
            .map(|child| self.data.invocation(*child).duration())
            .sum()
    }

    /// Time spent in this method, counting each recursive chain once.
    pub fn total_time(&self) -> u64 {
        self.outermost()
            .map(|id| self.data.invocation(id).duration())
            .sum()
    }

    /// Time spent in callees of the outermost activations.
    pub fn child_time(&self) -> u64 {
        self.outermost().map(|id| self.children_duration(id)).sum()
    }

    pub fn self_time(&self) -> u64 {
        self.total_time().saturating_sub(self.child_time())
    }

    pub fn total_calls(&self) -> u64 {
        self.invocations
            .iter()
            .map(|id| self.data.invocation(*id).count())
            .sum()
    }

    /// Serials that called this method directly.
    pub fn parents(&self) -> BTreeSet<u32> {
        self.invocations
            .iter()
            .filter_map(|id| self.data.invocation(*id).parent())
            .map(|parent| self.data.invocation(parent).serial())
            .filter(|serial| *serial != 0)
            .collect()
    }

    /// Serials this method called directly.
    pub fn children(&self) -> BTreeSet<u32> {
        self.invocations
            .iter()
            .flat_map(|id| self.data.invocation(*id).children().keys().copied())
            .collect()
    }

    /// Every serial on any path from the root down to this method.
    pub fn transitive_parents(&self) -> BTreeSet<u32> {
        let mut serials = BTreeSet::new();
        for id in &self.invocations {
            let mut cursor = self.data.invocation(*id).parent();
            while let Some(parent) = cursor {
                let node = self.data.invocation(parent);
                if node.serial() != 0 && node.serial() != self.serial {
                    serials.insert(node.serial());
                }
                cursor = node.parent();
            }
        }
        serials
    }

    /// Every serial reachable below this method.
    pub fn transitive_children(&self) -> BTreeSet<u32> {
        let mut serials = BTreeSet::new();
        for id in &self.invocations {
            for node in self.data.walk(*id).into_iter().skip(1) {
                let serial = self.data.invocation(node).serial();
                if serial != self.serial {
                    serials.insert(serial);
                }
            }
        }
        serials
    }

    /// This method's nodes whose parent runs `parent_serial`.
    pub fn invocations_from_parent(&self, parent_serial: u32) -> Vec<InvocationId> {
        self.invocations
            .iter()
            .copied()
            .filter(|id| {
                self.data
                    .invocation(*id)
                    .parent()
                    .is_some_and(|parent| self.data.invocation(parent).serial() == parent_serial)
            })
            .collect()
    }

    /// Nodes of `child_serial` called directly from this method.
    pub fn invocations_of_child(&self, child_serial: u32) -> Vec<InvocationId> {
        self.invocations
            .iter()
            .filter_map(|id| self.data.invocation(*id).child(child_serial))
            .collect()
    }

    /// `invocations_from_parent` restricted to outermost activations.
    pub fn root_invocations_from_parent(&self, parent_serial: u32) -> Vec<InvocationId> {
        self.outermost_only(self.invocations_from_parent(parent_serial))
    }

    /// `invocations_of_child` restricted to the callee's outermost activations.
    pub fn root_invocations_of_child(&self, child_serial: u32) -> Vec<InvocationId> {
        self.outermost_only(self.invocations_of_child(child_serial))
    }

    fn outermost_only(&self, mut nodes: Vec<InvocationId>) -> Vec<InvocationId> {
        nodes.retain(|id| self.data.invocation(*id).recursive_depth() == 1);
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: u32 = 1;
    const B: u32 = 2;
    const C: u32 = 3;

    /// A(100) -> B(60) -> A(40) -> C(10), plus a sibling C(5) under the first A.
    fn recursive_profile() -> ProfileData {
        let mut data = ProfileData::new(0);
        let outer = data.profile_enter(A);
        let b = data.profile_enter(B);
        let inner = data.profile_enter(A);
        let c = data.profile_enter(C);
        data.profile_exit_at(c, 0, 10);
        data.profile_exit_at(inner, 0, 40);
        data.profile_exit_at(b, 0, 60);
        let sibling = data.profile_enter(C);
        data.profile_exit_at(sibling, 0, 5);
        data.profile_exit_at(outer, 0, 100);
        data
    }

    #[test]
    fn recursion_is_counted_once() {
        let mut data = recursive_profile();
        let top = data.compute_results();
        let outer = data.invocation(top).child(A).expect("outer A");
        let b = data.invocation(outer).child(B).expect("B");
        let inner = data.invocation(b).child(A).expect("inner A");
        assert_eq!(data.invocation(outer).recursive_depth(), 1);
        assert_eq!(data.invocation(inner).recursive_depth(), 2);

        let a = data.method_data(A);
        assert_eq!(a.total_time(), 100);
        assert_eq!(a.child_time(), 65);
        assert_eq!(a.self_time(), 35);
        assert_eq!(a.total_calls(), 2);

        let first = (a.total_time(), a.child_time());
        data.compute_results();
        let again = data.method_data(A);
        assert_eq!((again.total_time(), again.child_time()), first);
    }

    #[test]
    fn relations_exclude_the_root() {
        let mut data = recursive_profile();
        data.compute_results();
        let a = data.method_data(A);
        assert_eq!(a.parents().into_iter().collect::<Vec<_>>(), vec![B]);
        assert_eq!(a.children().into_iter().collect::<Vec<_>>(), vec![B, C]);
        assert_eq!(a.transitive_parents().into_iter().collect::<Vec<_>>(), vec![B]);
        assert_eq!(a.transitive_children().into_iter().collect::<Vec<_>>(), vec![B, C]);

        let c = data.method_data(C);
        assert_eq!(c.transitive_parents().into_iter().collect::<Vec<_>>(), vec![A, B]);
        assert_eq!(c.invocations_from_parent(A).len(), 2);
        assert_eq!(a.invocations_of_child(C).len(), 2);
    }

    #[test]
    fn root_variants_skip_nested_recursion() {
        let mut data = recursive_profile();
        data.compute_results();
        let a = data.method_data(A);
        assert_eq!(a.invocations_from_parent(B).len(), 1);
        assert!(a.root_invocations_from_parent(B).is_empty());
        assert_eq!(a.root_invocations_of_child(C).len(), 2);

        let b = data.method_data(B);
        assert_eq!(b.invocations_of_child(A).len(), 1);
        assert!(b.root_invocations_of_child(A).is_empty());
    }
}
