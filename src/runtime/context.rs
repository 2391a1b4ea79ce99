//=====================================================
// File: runtime/context.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Per-thread interpreter state
// Objective: Own the frame stack, the logical and host backtrace stacks, the
//            optional profiler tree and the cooperative interrupt flag
//=====================================================

use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::Runtime;
use super::class::ClassId;
use super::exception::RubyException;
use super::frame::{Frame, FrameId};
use super::value::{RObject, Value};
use crate::backtrace::{BacktraceData, BacktraceElement, BacktraceStack, Gather, NativeFrame};
use crate::interp::Unwind;
use crate::profile::ProfileData;

/// Cross-thread handle that requests a kill at the next `THREAD_POLL`.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn kill(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// State of one interpreted call stack. Never shared between threads.
pub struct ThreadContext {
    runtime: Arc<Runtime>,
    frames: Vec<Frame>,
    backtrace: BacktraceStack,
    /// Host frames, outermost first.
    native: Vec<NativeFrame>,
    profile: Option<ProfileData>,
    last_profile: Option<ProfileData>,
    interrupt: Arc<AtomicBool>,
    output: Option<String>,
    next_frame_id: u64,
    top_self: Value,
}

impl ThreadContext {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        let profile = runtime
            .config()
            .profiling
            .then(|| ProfileData::new(runtime.profiler_entry_serial()));
        Self {
            runtime,
            frames: Vec::new(),
            backtrace: BacktraceStack::new(),
            native: Vec::new(),
            profile,
            last_profile: None,
            interrupt: Arc::new(AtomicBool::new(false)),
            output: None,
            next_frame_id: 1,
            top_self: Value::Object(Rc::new(RObject {
                class: ClassId::OBJECT,
            })),
        }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// The `main` object scripts run against.
    pub fn top_self(&self) -> &Value {
        &self.top_self
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            flag: Arc::clone(&self.interrupt),
        }
    }

    /// Consume a pending interrupt request.
    pub(crate) fn take_interrupt(&self) -> bool {
        self.interrupt.swap(false, Ordering::AcqRel)
    }

    // Section 1.0 - output capture

    /// Route `puts` into a buffer instead of stdout.
    pub fn capture_output(&mut self) {
        self.output.get_or_insert_with(String::new);
    }

    pub fn take_output(&mut self) -> String {
        self.output.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub fn write_line(&mut self, line: &str) {
        match self.output.as_mut() {
            Some(buffer) => {
                buffer.push_str(line);
                buffer.push('\n');
            }
            None => println!("{line}"),
        }
    }

    // Section 2.0 - profiling

    pub fn start_profiling(&mut self) {
        if self.profile.is_none() {
            self.profile = Some(ProfileData::new(self.runtime.profiler_entry_serial()));
        }
    }

    pub fn stop_profiling(&mut self) -> Option<ProfileData> {
        self.profile.take()
    }

    pub fn is_profiling(&self) -> bool {
        self.profile.is_some()
    }

    pub fn profile(&self) -> Option<&ProfileData> {
        self.profile.as_ref()
    }

    pub fn profile_mut(&mut self) -> Option<&mut ProfileData> {
        self.profile.as_mut()
    }

    pub(crate) fn replace_profile(&mut self, profile: Option<ProfileData>) -> Option<ProfileData> {
        std::mem::replace(&mut self.profile, profile)
    }

    /// Result of the most recent `profile { }` block.
    pub fn last_profile(&self) -> Option<&ProfileData> {
        self.last_profile.as_ref()
    }

    pub fn take_last_profile(&mut self) -> Option<ProfileData> {
        self.last_profile.take()
    }

    pub(crate) fn set_last_profile(&mut self, profile: Option<ProfileData>) {
        self.last_profile = profile;
    }

    // Section 3.0 - frames

    pub(crate) fn next_frame_id(&mut self) -> FrameId {
        let id = FrameId(self.next_frame_id);
        self.next_frame_id += 1;
        id
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_frame_active(&self, id: FrameId) -> bool {
        self.frames.iter().rev().any(|frame| frame.id == id)
    }

    /// Serial of the innermost method frame, `0` outside any method.
    pub fn current_serial(&self) -> u32 {
        self.frames.last().map(|frame| frame.serial).unwrap_or(0)
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop_frame(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub(crate) fn truncate_frames(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    // Section 4.0 - backtrace stacks

    pub(crate) fn push_element(&mut self, method: &Arc<str>, file: &Arc<str>, line: u32) {
        self.backtrace.push(method, file, line);
    }

    pub(crate) fn set_line(&mut self, line: u32) {
        self.backtrace.set_line(line);
    }

    pub fn backtrace_depth(&self) -> usize {
        self.backtrace.depth()
    }

    pub(crate) fn truncate_backtrace(&mut self, depth: usize) {
        self.backtrace.truncate(depth);
    }

    pub fn current_element(&self) -> Option<&BacktraceElement> {
        self.backtrace.current()
    }

    /// Logical frames, outermost first.
    pub fn backtrace_snapshot(&self) -> Vec<BacktraceElement> {
        self.backtrace.snapshot()
    }

    pub(crate) fn push_native(&mut self, frame: NativeFrame) {
        self.native.push(frame);
    }

    pub fn native_depth(&self) -> usize {
        self.native.len()
    }

    pub(crate) fn truncate_native(&mut self, depth: usize) {
        self.native.truncate(depth);
    }

    /// Host frames, innermost first, without the innermost `skip`.
    pub fn native_snapshot(&self, skip: usize) -> Vec<NativeFrame> {
        self.native.iter().rev().skip(skip).cloned().collect()
    }

    pub fn capture_backtrace(&self, gather: Gather, skip_native: usize) -> BacktraceData {
        gather.backtrace_data(self.native_snapshot(skip_native), self.backtrace_snapshot())
    }

    // Section 5.0 - exceptions

    /// Exception of `class` whose backtrace starts below the innermost
    /// `skip_native` host frames.
    pub fn exception_skipping(
        &self,
        class: ClassId,
        message: impl Into<String>,
        skip_native: usize,
    ) -> Rc<RubyException> {
        let gather = self.runtime.config().backtrace.style;
        let exception = RubyException::new(class, self.runtime.class_name(class), message)
            .with_backtrace(self.capture_backtrace(gather, skip_native));
        Rc::new(exception)
    }

    pub fn new_exception(&self, class: ClassId, message: impl Into<String>) -> Rc<RubyException> {
        self.exception_skipping(class, message, 0)
    }

    /// Unwind raising a fresh exception of `class`.
    pub fn raise(&self, class: ClassId, message: impl Into<String>) -> Unwind {
        Unwind::Raise(self.new_exception(class, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtrace::FrameType;
    use crate::config::RuntimeConfig;

    #[test]
    fn interrupt_is_consumed_once() {
        let ctx = ThreadContext::new(Runtime::new(RuntimeConfig::default()));
        let handle = ctx.interrupt_handle();
        assert!(!ctx.take_interrupt());
        handle.kill();
        assert!(handle.is_pending());
        assert!(ctx.take_interrupt());
        assert!(!ctx.take_interrupt());
    }

    #[test]
    fn snapshots_put_innermost_native_frame_first() {
        let mut ctx = ThreadContext::new(Runtime::new(RuntimeConfig::default()));
        ctx.push_native(NativeFrame::interpreter(FrameType::Root));
        ctx.push_native(NativeFrame::interpreter(FrameType::Method));
        let snapshot = ctx.native_snapshot(0);
        assert_eq!(snapshot[0].method_name, "interpret_method");
        assert_eq!(ctx.native_snapshot(1).len(), 1);
    }

    #[test]
    fn captured_output_is_drained() {
        let mut ctx = ThreadContext::new(Runtime::new(RuntimeConfig::default()));
        ctx.capture_output();
        ctx.write_line("one");
        ctx.write_line("two");
        assert_eq!(ctx.take_output(), "one\ntwo\n");
        assert_eq!(ctx.take_output(), "");
    }
}
