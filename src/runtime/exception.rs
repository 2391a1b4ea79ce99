//=====================================================
// File: runtime/exception.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Language-level exception objects
// Objective: Pair class, message and the backtrace snapshot captured when the
//            exception was created
//=====================================================

use std::fmt;
use std::sync::Arc;

use once_cell::unsync::OnceCell;

use super::class::ClassId;
use crate::backtrace::{BacktraceData, RubyStackTraceElement, TraceType};

pub struct RubyException {
    class: ClassId,
    class_name: Arc<str>,
    message: String,
    backtrace: OnceCell<BacktraceData>,
}

impl RubyException {
    pub fn new(class: ClassId, class_name: Arc<str>, message: impl Into<String>) -> Self {
        Self {
            class,
            class_name,
            message: message.into(),
            backtrace: OnceCell::new(),
        }
    }

    pub fn with_backtrace(mut self, backtrace: BacktraceData) -> Self {
        self.backtrace = OnceCell::with_value(backtrace);
        self
    }

    pub fn class_id(&self) -> ClassId {
        self.class
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Attach a snapshot if none was captured yet. Returns `false` when the
    /// exception already carries one.
    pub fn set_backtrace(&self, backtrace: BacktraceData) -> bool {
        self.backtrace.set(backtrace).is_ok()
    }

    pub fn backtrace(&self) -> Option<&BacktraceData> {
        self.backtrace.get()
    }

    /// Merged frames, innermost first; empty when nothing was captured.
    pub fn stack_trace(&self) -> &[RubyStackTraceElement] {
        self.backtrace
            .get()
            .map(BacktraceData::stack_trace)
            .unwrap_or_default()
    }

    pub fn render(&self, trace_type: TraceType, color: bool) -> String {
        let mut regathered = None;
        let frames = match self.backtrace.get() {
            Some(data) => trace_type.trace_for(data, &mut regathered),
            None => &[],
        };
        trace_type.render_exception(&self.class_name, &self.message, frames, color)
    }
}

impl fmt::Debug for RubyException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RubyException")
            .field("class", &self.class_name)
            .field("message", &self.message)
            .field("frames", &self.stack_trace().len())
            .finish()
    }
}

impl fmt::Display for RubyException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.class_name)
    }
}
