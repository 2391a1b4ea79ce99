//=====================================================
// File: profile/data.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Per-thread invocation tree built from method entry/exit events
// Objective: Track the current node, re-root the tree when execution unwinds
//            past the first observed frame, and derive recursion depths
//=====================================================

use std::collections::BTreeSet;
use std::time::Instant;

use once_cell::sync::Lazy;

use super::invocation::{Invocation, InvocationArena, InvocationId};
use super::method_data::MethodData;

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic nanoseconds shared by every profiler in the process.
pub fn now() -> u64 {
    u64::try_from(EPOCH.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Invocation tree owned by one thread context.
#[derive(Debug)]
pub struct ProfileData {
    arena: InvocationArena,
    top: InvocationId,
    current: InvocationId,
    profiler_entry: u32,
    results: Option<InvocationId>,
}

impl ProfileData {
    /// `profiler_entry` is the serial of the method that starts profiling;
    /// it is hidden from results when it wraps the whole tree.
    pub fn new(profiler_entry: u32) -> Self {
        let mut arena = InvocationArena::new();
        let top = arena.allocate(0, None);
        Self {
            arena,
            top,
            current: top,
            profiler_entry,
            results: None,
        }
    }

    pub fn now(&self) -> u64 {
        now()
    }

    pub fn profiler_entry(&self) -> u32 {
        self.profiler_entry
    }

    /// Descend into `serial` under the current node. Returns the serial that
    /// was current before, to be handed back to [`ProfileData::profile_exit`].
    pub fn profile_enter(&mut self, serial: u32) -> u32 {
        let previous = self.arena.get(self.current).serial();
        let child = self.arena.child_for(self.current, serial);
        self.arena.increment_count(child);
        self.current = child;
        self.results = None;
        previous
    }

    pub fn profile_exit(&mut self, caller_serial: u32, start: u64) {
        self.profile_exit_at(caller_serial, start, now());
    }

    /// Exit the current node at an explicit clock reading.
    pub fn profile_exit_at(&mut self, caller_serial: u32, start: u64, now: u64) {
        self.arena.add_duration(self.current, now.saturating_sub(start));
        self.results = None;

        let parent = self.arena.get(self.current).parent();
        if self.current == self.top {
            let new_top = self.arena.allocate(0, None);
            let new_current =
                self.arena
                    .copy_with_new_serial_and_parent(self.current, caller_serial, new_top);
            self.current = new_current;
            self.top = new_top;
        } else if parent == Some(self.top) && caller_serial != 0 {
            let new_top = self.arena.allocate(0, None);
            let new_current =
                self.arena
                    .copy_with_new_serial_and_parent(self.top, caller_serial, new_top);
            self.current = new_current;
            self.top = new_top;
        } else {
            self.current = parent.unwrap_or(self.top);
        }
    }

    /// Assign recursion depths and the top's duration; returns the node the
    /// reports start from. Safe to call repeatedly.
    pub fn compute_results(&mut self) -> InvocationId {
        let mut top = self.top;
        let root = self.arena.get(top);
        if root.children().len() == 1 {
            if let Some(only) = root.children().values().next().copied() {
                if self.arena.get(only).serial() == self.profiler_entry {
                    top = only;
                }
            }
        }

        self.assign_recursive_depths();
        let total = self
            .arena
            .get(top)
            .children()
            .values()
            .map(|child| self.arena.get(*child).duration())
            .sum();
        self.arena.set_duration(top, total);
        self.results = Some(top);
        top
    }

    fn assign_recursive_depths(&mut self) {
        let mut active: Vec<u32> = Vec::new();
        let mut stack = vec![(self.top, false)];
        while let Some((id, leaving)) = stack.pop() {
            let serial = self.arena.get(id).serial() as usize;
            if active.len() <= serial {
                active.resize(serial + 1, 0);
            }
            if leaving {
                active[serial] -= 1;
                continue;
            }
            active[serial] += 1;
            self.arena.set_recursive_depth(id, active[serial]);
            stack.push((id, true));
            let children: Vec<InvocationId> =
                self.arena.get(id).children().values().copied().collect();
            stack.extend(children.into_iter().rev().map(|child| (child, false)));
        }
    }

    /// Node returned by the last [`ProfileData::compute_results`], or the raw
    /// top when results are stale.
    pub fn results_top(&self) -> InvocationId {
        self.results.unwrap_or(self.top)
    }

    pub fn has_results(&self) -> bool {
        self.results.is_some()
    }

    pub fn top(&self) -> InvocationId {
        self.top
    }

    pub fn current(&self) -> InvocationId {
        self.current
    }

    pub fn invocation(&self, id: InvocationId) -> &Invocation {
        self.arena.get(id)
    }

    /// Nodes below `start` (inclusive) in depth-first pre-order.
    pub fn walk(&self, start: InvocationId) -> Vec<InvocationId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.arena.get(id).children().values().rev().copied());
        }
        order
    }

    /// Every method serial appearing in the results.
    pub fn serials(&self) -> BTreeSet<u32> {
        self.walk(self.results_top())
            .into_iter()
            .map(|id| self.arena.get(id).serial())
            .filter(|serial| *serial != 0 && *serial != self.profiler_entry)
            .collect()
    }

    pub fn method_data(&self, serial: u32) -> MethodData<'_> {
        let invocations = self
            .walk(self.results_top())
            .into_iter()
            .filter(|id| self.arena.get(*id).serial() == serial)
            .collect();
        MethodData::new(self, serial, invocations)
    }

    /// Total time below the results top, in nanoseconds.
    pub fn total_time(&self) -> u64 {
        self.arena.get(self.results_top()).duration()
    }

    /// Discard the tree and start over.
    pub fn clear(&mut self) {
        *self = Self::new(self.profiler_entry);
    }
}
