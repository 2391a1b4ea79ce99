//=====================================================
// File: backtrace/bound.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Registry of host functions exposed as language-level methods
// Objective: Let the merge surface built-in method frames under the name
//            user code called them by
//=====================================================

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

#[derive(Debug, Default)]
pub struct BoundMethods {
    names: RwLock<HashMap<(&'static str, &'static str), Arc<str>>>,
}

impl BoundMethods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `host_class::host_method` implements `name`.
    pub fn bind(&self, host_class: &'static str, host_method: &'static str, name: &str) {
        self.names
            .write()
            .insert((host_class, host_method), Arc::from(name));
    }

    pub fn lookup(&self, host_class: &'static str, host_method: &'static str) -> Option<Arc<str>> {
        self.names
            .read()
            .get(&(host_class, host_method))
            .map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }
}
