//=====================================================
// File: backtrace/element.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Frame records consumed by the backtrace reconstructor
// Objective: Logical {method, file, line} stack kept by the interpreter,
//            host frame snapshots tagged with explicit kinds, and the merged
//            user-facing element
//=====================================================

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// Host module reported by interpreter marker frames.
pub const INTERPRETER_HOST: &str = "solvra_interp::interp";

/// What kind of interpreted activation a marker frame wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameType {
    Method,
    Block,
    Eval,
    Root,
}

impl FrameType {
    /// Host function name of the marker frame.
    pub fn marker_method(self) -> &'static str {
        match self {
            FrameType::Method => "interpret_method",
            FrameType::Block => "interpret_block",
            FrameType::Eval => "interpret_eval",
            FrameType::Root => "interpret_root",
        }
    }

    /// User-facing name of an activation of `method` under this frame type.
    pub fn display_name(self, method: &str) -> Arc<str> {
        match self {
            FrameType::Method => Arc::from(method),
            FrameType::Block => Arc::from(format!("block in {method}")),
            FrameType::Eval if !method.is_empty() => Arc::from(method),
            FrameType::Eval | FrameType::Root => Arc::from("<main>"),
        }
    }
}

/// One entry of the interpreter's logical call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktraceElement {
    pub method: Arc<str>,
    pub file: Arc<str>,
    pub line: u32,
}

/// Logical frame stack whose slots are reused across calls at the same depth.
#[derive(Debug, Default)]
pub struct BacktraceStack {
    slots: Vec<BacktraceElement>,
    depth: usize,
}

impl BacktraceStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, method: &Arc<str>, file: &Arc<str>, line: u32) {
        if let Some(slot) = self.slots.get_mut(self.depth) {
            slot.method = Arc::clone(method);
            slot.file = Arc::clone(file);
            slot.line = line;
        } else {
            self.slots.push(BacktraceElement {
                method: Arc::clone(method),
                file: Arc::clone(file),
                line,
            });
        }
        self.depth += 1;
    }

    pub fn pop(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Drop every element above `depth`; slots stay allocated.
    pub fn truncate(&mut self, depth: usize) {
        self.depth = self.depth.min(depth);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn current(&self) -> Option<&BacktraceElement> {
        self.depth.checked_sub(1).and_then(|top| self.slots.get(top))
    }

    /// Update the innermost element's line.
    pub fn set_line(&mut self, line: u32) {
        if let Some(top) = self.depth.checked_sub(1) {
            if let Some(slot) = self.slots.get_mut(top) {
                slot.line = line;
            }
        }
    }

    /// Copy of the live elements, outermost first.
    pub fn snapshot(&self) -> Vec<BacktraceElement> {
        self.slots[..self.depth].to_vec()
    }
}

/// How a host frame relates to interpreted code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeFrameKind {
    /// Runtime plumbing or a built-in method; `bound` carries the
    /// language-level name when the function is a registered core method.
    Host { bound: Option<Arc<str>> },
    /// Wraps exactly one interpreted activation.
    Interpreter(FrameType),
    /// Code generated from source; `method` is the source method name.
    Compiled { method: Arc<str> },
    /// Helper emitted by the code generator alongside a compiled frame.
    Synthetic,
}

/// A host stack frame as captured at fault or query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeFrame {
    pub class_name: Cow<'static, str>,
    pub method_name: Cow<'static, str>,
    pub file: Cow<'static, str>,
    pub line: u32,
    pub kind: NativeFrameKind,
}

impl NativeFrame {
    pub fn host(
        class_name: &'static str,
        method_name: &'static str,
        file: &'static str,
        bound: Option<Arc<str>>,
    ) -> Self {
        Self {
            class_name: Cow::Borrowed(class_name),
            method_name: Cow::Borrowed(method_name),
            file: Cow::Borrowed(file),
            line: 0,
            kind: NativeFrameKind::Host { bound },
        }
    }

    pub fn interpreter(frame_type: FrameType) -> Self {
        Self {
            class_name: Cow::Borrowed(INTERPRETER_HOST),
            method_name: Cow::Borrowed(frame_type.marker_method()),
            file: Cow::Borrowed("src/interp/mod.rs"),
            line: 0,
            kind: NativeFrameKind::Interpreter(frame_type),
        }
    }

    pub fn compiled(method: &str, file: &str, line: u32) -> Self {
        Self {
            class_name: Cow::Owned(format!("compiled::{method}")),
            method_name: Cow::Owned(method.to_string()),
            file: Cow::Owned(file.to_string()),
            line,
            kind: NativeFrameKind::Compiled {
                method: Arc::from(method),
            },
        }
    }

    pub fn synthetic(class_name: &str, method_name: &str) -> Self {
        Self {
            class_name: Cow::Owned(class_name.to_string()),
            method_name: Cow::Owned(method_name.to_string()),
            file: Cow::Borrowed(""),
            line: 0,
            kind: NativeFrameKind::Synthetic,
        }
    }
}

/// Merged, user-facing stack trace entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RubyStackTraceElement {
    pub class_name: Arc<str>,
    pub method_name: Arc<str>,
    pub file: Arc<str>,
    pub line: u32,
    /// `None` for host frames and deferred duplicates.
    pub frame_type: Option<FrameType>,
}

impl RubyStackTraceElement {
    pub fn new(
        class_name: &str,
        method_name: Arc<str>,
        file: Arc<str>,
        line: u32,
        frame_type: Option<FrameType>,
    ) -> Self {
        Self {
            class_name: Arc::from(class_name),
            method_name,
            file,
            line,
            frame_type,
        }
    }

    /// Element emitted verbatim from a host frame.
    pub fn from_native(frame: &NativeFrame) -> Self {
        Self::new(
            &frame.class_name,
            Arc::from(&*frame.method_name),
            Arc::from(&*frame.file),
            frame.line,
            None,
        )
    }

    /// `file:line:in 'method'`
    pub fn mri_line(&self) -> String {
        format!("{}:{}:in '{}'", self.file, self.line, self.method_name)
    }
}

impl fmt::Display for RubyStackTraceElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mri_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_reused_after_pop() {
        let mut stack = BacktraceStack::new();
        let file: Arc<str> = Arc::from("main.rb");
        stack.push(&Arc::from("<main>"), &file, 1);
        stack.push(&Arc::from("foo"), &file, 4);
        stack.pop();
        stack.push(&Arc::from("bar"), &file, 9);
        stack.set_line(10);
        assert_eq!(stack.depth(), 2);
        let snapshot = stack.snapshot();
        assert_eq!(&*snapshot[1].method, "bar");
        assert_eq!(snapshot[1].line, 10);
        assert_eq!(snapshot[0].line, 1);
    }

    #[test]
    fn frame_types_shape_names() {
        assert_eq!(&*FrameType::Block.display_name("each_pair"), "block in each_pair");
        assert_eq!(&*FrameType::Eval.display_name(""), "<main>");
        assert_eq!(&*FrameType::Root.display_name("ignored"), "<main>");
    }
}
