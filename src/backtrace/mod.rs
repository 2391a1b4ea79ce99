//=====================================================
// File: backtrace/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Backtrace reconstruction
// Objective: Merge host frame snapshots with the logical interpreter stack
//            and render the result
//=====================================================

mod bound;
mod data;
mod element;
mod trace_type;

pub use bound::BoundMethods;
pub use data::BacktraceData;
pub use element::{
    BacktraceElement, BacktraceStack, FrameType, INTERPRETER_HOST, NativeFrame, NativeFrameKind,
    RubyStackTraceElement,
};
pub use trace_type::{Format, Gather, TraceType};
