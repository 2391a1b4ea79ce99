//=====================================================
// File: runtime/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Shared runtime behind every thread context
// Objective: Class table with generation tokens, method serials and the
//            process-wide profiling and backtrace registries
//=====================================================

mod builtins;
mod class;
mod context;
mod exception;
mod frame;
mod value;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::backtrace::{BoundMethods, TraceType};
use crate::config::RuntimeConfig;
use crate::ir::{Scope, ScopeId};
use crate::profile::{ProfiledMethods, ScopeCounters};

pub use class::{ClassId, DynamicMethod, MethodBody, NativeFn, NativeMethod, Visibility};
pub use context::{InterruptHandle, ThreadContext};
pub use exception::RubyException;
pub use frame::{Block, DynamicScope, Frame, FrameId};
pub use value::{RObject, Value};

pub(crate) use frame::BlockParts;

use class::ClassTable;

/// Process-wide interpreter state; shared by `Arc` across threads.
pub struct Runtime {
    config: RuntimeConfig,
    classes: RwLock<ClassTable>,
    next_serial: AtomicU32,
    profiled_methods: ProfiledMethods,
    bound_methods: BoundMethods,
    scope_counters: ScopeCounters,
    profiler_entry: u32,
}

impl Runtime {
    /// Build a runtime with the core classes and built-in methods installed.
    pub fn new(config: RuntimeConfig) -> Arc<Self> {
        let mut runtime = Self {
            profiled_methods: ProfiledMethods::new(config.max_profiled_methods),
            config,
            classes: RwLock::new(ClassTable::with_core()),
            // Serial 0 is the profiler root.
            next_serial: AtomicU32::new(1),
            bound_methods: BoundMethods::new(),
            scope_counters: ScopeCounters::new(),
            profiler_entry: 0,
        };
        runtime.profiler_entry = builtins::install(&runtime);
        tracing::debug!(
            methods = runtime.profiled_methods.len(),
            bound = runtime.bound_methods.len(),
            "runtime initialised"
        );
        Arc::new(runtime)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn trace_type(&self) -> TraceType {
        self.config.trace_type()
    }

    // Section 1.0 - classes

    pub fn class_generation(&self, class: ClassId) -> u64 {
        self.classes.read().generation(class)
    }

    pub fn class_name(&self, class: ClassId) -> Arc<str> {
        self.classes.read().name(class)
    }

    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        self.classes.read().find(name)
    }

    /// Define (or reopen) a class under `superclass`.
    pub fn define_class(&self, name: &str, superclass: ClassId) -> ClassId {
        self.classes.write().define_class(name, Some(superclass))
    }

    pub fn superclass(&self, class: ClassId) -> Option<ClassId> {
        self.classes.read().superclass(class)
    }

    pub fn is_a(&self, class: ClassId, ancestor: ClassId) -> bool {
        self.classes.read().is_a(class, ancestor)
    }

    /// Walk the superclass chain from `class` for `name`.
    pub fn find_method(&self, class: ClassId, name: &str) -> Option<Arc<DynamicMethod>> {
        self.classes.read().lookup(class, name)
    }

    // Section 2.0 - method definition

    pub fn next_serial(&self) -> u32 {
        self.next_serial.fetch_add(1, Ordering::Relaxed)
    }

    fn install(
        &self,
        class: ClassId,
        name: &str,
        visibility: Visibility,
        body: MethodBody,
    ) -> Arc<DynamicMethod> {
        let method = Arc::new(DynamicMethod {
            name: Arc::from(name),
            serial: self.next_serial(),
            owner: class,
            visibility,
            body,
        });
        let qualified = format!("{}#{name}", self.class_name(class));
        self.profiled_methods.register(method.serial, &qualified);
        self.classes.write().add_method(Arc::clone(&method));
        tracing::debug!(method = %qualified, serial = method.serial, "method defined");
        method
    }

    /// Define an interpreted method; bumps the generation of `class` and
    /// every subclass.
    pub fn define_method(
        &self,
        class: ClassId,
        name: &str,
        scope: Arc<Scope>,
        visibility: Visibility,
    ) -> Arc<DynamicMethod> {
        self.install(class, name, visibility, MethodBody::Interpreted(scope))
    }

    /// Define a built-in method and bind its host function to `name` for
    /// backtraces.
    pub fn define_native(
        &self,
        class: ClassId,
        name: &str,
        visibility: Visibility,
        native: NativeMethod,
    ) -> Arc<DynamicMethod> {
        self.bound_methods
            .bind(native.host_class, native.host_method, name);
        self.install(class, name, visibility, MethodBody::Native(native))
    }

    // Section 3.0 - registries

    pub fn profiled_methods(&self) -> &ProfiledMethods {
        &self.profiled_methods
    }

    pub fn bound_methods(&self) -> &BoundMethods {
        &self.bound_methods
    }

    pub fn scope_counters(&self) -> &ScopeCounters {
        &self.scope_counters
    }

    /// Scopes whose `THREAD_POLL` count reached `threshold`, hottest first.
    pub fn hot_scopes(&self, threshold: u64) -> Vec<(ScopeId, u64)> {
        self.scope_counters.hot_scopes(threshold)
    }

    /// Serial of the built-in that starts a profiling session.
    pub fn profiler_entry_serial(&self) -> u32 {
        self.profiler_entry
    }
}
