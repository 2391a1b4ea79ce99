//=====================================================
// File: ir/call_site.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Monomorphic inline cache attached to call instructions
// Objective: Reuse a resolved method while the receiver class and its
//            generation token are unchanged
//=====================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::runtime::{ClassId, DynamicMethod, Runtime};

/// How the receiver and method table are chosen for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    /// Explicit receiver; private methods are refused.
    Normal,
    /// Implicit `self` receiver; private methods are allowed.
    Functional,
    /// Lookup starts above the current method's defining class.
    Super,
}

struct CacheEntry {
    class: ClassId,
    generation: u64,
    method: Arc<DynamicMethod>,
}

pub struct CallSite {
    name: Arc<str>,
    call_type: CallType,
    cache: Mutex<Option<CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CallSite {
    pub fn new(name: &str, call_type: CallType) -> Self {
        Self {
            name: Arc::from(name),
            call_type,
            cache: Mutex::new(None),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn call_type(&self) -> CallType {
        self.call_type
    }

    /// Resolve the method for receivers of `class`.
    ///
    /// The generation is read before the lookup so a concurrent redefinition
    /// can only leave an entry that the next call rejects.
    pub fn resolve(&self, runtime: &Runtime, class: ClassId) -> Option<Arc<DynamicMethod>> {
        let generation = runtime.class_generation(class);
        if let Some(entry) = self.cache.lock().as_ref() {
            if entry.class == class && entry.generation == generation {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.method));
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let method = runtime.find_method(class, &self.name)?;
        tracing::debug!(
            name = %self.name,
            class = %runtime.class_name(class),
            generation,
            "call site cache miss"
        );
        *self.cache.lock() = Some(CacheEntry {
            class,
            generation,
            method: Arc::clone(&method),
        });
        Some(method)
    }

    /// `(hits, misses)` observed so far.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl Clone for CallSite {
    fn clone(&self) -> Self {
        Self::new(&self.name, self.call_type)
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("name", &self.name)
            .field("call_type", &self.call_type)
            .finish()
    }
}
