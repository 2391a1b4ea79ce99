//=====================================================
// File: profile/methods.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Process-wide profiling registries
// Objective: Bounded serial -> method name registry and concurrent per-scope
//            hot counters shared by every thread context
//=====================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::ir::ScopeId;

/// Names of the methods the profiler tracks, keyed by serial.
#[derive(Debug)]
pub struct ProfiledMethods {
    max: usize,
    methods: RwLock<HashMap<u32, Arc<str>>>,
    warned: AtomicBool,
    warnings_issued: AtomicUsize,
}

impl ProfiledMethods {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            methods: RwLock::new(HashMap::new()),
            warned: AtomicBool::new(false),
            warnings_issued: AtomicUsize::new(0),
        }
    }

    /// Track `serial` under `name`. Once the registry is full new serials are
    /// refused and a single warning is logged; known serials stay tracked.
    pub fn register(&self, serial: u32, name: &str) -> bool {
        let methods = self.methods.upgradable_read();
        if methods.contains_key(&serial) {
            return true;
        }
        if methods.len() >= self.max {
            drop(methods);
            if !self.warned.swap(true, Ordering::AcqRel) {
                self.warnings_issued.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    max = self.max,
                    method = name,
                    "profiled method registry is full; new methods will not be profiled"
                );
            }
            return false;
        }
        let mut methods = RwLockUpgradableReadGuard::upgrade(methods);
        methods.insert(serial, Arc::from(name));
        true
    }

    pub fn contains(&self, serial: u32) -> bool {
        self.methods.read().contains_key(&serial)
    }

    pub fn name(&self, serial: u32) -> Option<Arc<str>> {
        self.methods.read().get(&serial).cloned()
    }

    /// Display name for reports; unknown serials render as `#<serial>`.
    pub fn display_name(&self, serial: u32) -> Arc<str> {
        self.name(serial)
            .unwrap_or_else(|| Arc::from(format!("#<{serial}>")))
    }

    pub fn len(&self) -> usize {
        self.methods.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.read().is_empty()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn warnings_issued(&self) -> usize {
        self.warnings_issued.load(Ordering::Relaxed)
    }
}

/// Hit counters bumped by `THREAD_POLL` when sampling is enabled.
#[derive(Debug, Default)]
pub struct ScopeCounters {
    counters: RwLock<HashMap<ScopeId, AtomicU64>>,
}

impl ScopeCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the counter for `scope`.
    pub fn increment(&self, scope: ScopeId) -> u64 {
        if let Some(counter) = self.counters.read().get(&scope) {
            return counter.fetch_add(1, Ordering::Relaxed) + 1;
        }
        let mut counters = self.counters.write();
        let counter = counters.entry(scope).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self, scope: ScopeId) -> u64 {
        self.counters
            .read()
            .get(&scope)
            .map(|counter| counter.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Scopes polled at least `threshold` times, hottest first.
    pub fn hot_scopes(&self, threshold: u64) -> Vec<(ScopeId, u64)> {
        let mut hot: Vec<(ScopeId, u64)> = self
            .counters
            .read()
            .iter()
            .map(|(scope, counter)| (*scope, counter.load(Ordering::Relaxed)))
            .filter(|(_, hits)| *hits >= threshold)
            .collect();
        hot.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        hot
    }

    pub fn clear(&self) {
        self.counters.write().clear();
    }
}
