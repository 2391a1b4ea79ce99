//=====================================================
// File: profile/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Invocation-tree profiler
// Objective: Per-thread call trees, shared method/scope registries and the
//            report printers built on them
//=====================================================

mod data;
mod invocation;
mod method_data;
mod methods;
mod printer;

pub use data::{ProfileData, now};
pub use invocation::{Invocation, InvocationArena, InvocationId};
pub use method_data::MethodData;
pub use methods::{ProfiledMethods, ScopeCounters};
pub use printer::{PrinterKind, ProfilePrinter};
