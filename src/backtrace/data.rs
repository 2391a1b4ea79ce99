//=====================================================
// File: backtrace/data.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Immutable backtrace snapshot and the merge walk
// Objective: Interleave host frames with logical interpreter frames into one
//            ordered trace, computed once per snapshot
//=====================================================

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::element::{
    BacktraceElement, FrameType, NativeFrame, NativeFrameKind, RubyStackTraceElement,
};
use super::trace_type::Gather;

/// Native plus logical stacks captured together.
///
/// `native` is innermost first; `logical` is outermost first and the merge
/// consumes it from its end.
#[derive(Debug)]
pub struct BacktraceData {
    native: Vec<NativeFrame>,
    logical: Vec<BacktraceElement>,
    gather: Gather,
    full_trace: bool,
    mask_native: bool,
    merged: OnceCell<Vec<RubyStackTraceElement>>,
}

impl BacktraceData {
    pub fn new(
        native: Vec<NativeFrame>,
        logical: Vec<BacktraceElement>,
        full_trace: bool,
        mask_native: bool,
    ) -> Self {
        let gather = match (full_trace, mask_native) {
            (true, _) => Gather::Full,
            (false, true) => Gather::Caller,
            (false, false) => Gather::Normal,
        };
        Self {
            native,
            logical,
            gather,
            full_trace,
            mask_native,
            merged: OnceCell::new(),
        }
    }

    pub fn for_gather(
        gather: Gather,
        native: Vec<NativeFrame>,
        logical: Vec<BacktraceElement>,
    ) -> Self {
        let (full_trace, mask_native) = gather.flags();
        let mut data = Self::new(native, logical, full_trace, mask_native);
        data.gather = gather;
        data
    }

    /// Same snapshot, different gather strategy.
    pub fn regather(&self, gather: Gather) -> Self {
        Self::for_gather(gather, self.native.clone(), self.logical.clone())
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), false, false)
    }

    pub fn gather(&self) -> Gather {
        self.gather
    }

    pub fn native(&self) -> &[NativeFrame] {
        &self.native
    }

    pub fn logical(&self) -> &[BacktraceElement] {
        &self.logical
    }

    pub fn is_full_trace(&self) -> bool {
        self.full_trace
    }

    pub fn masks_native(&self) -> bool {
        self.mask_native
    }

    /// Merged trace, innermost first. Computed on first use.
    pub fn stack_trace(&self) -> &[RubyStackTraceElement] {
        self.merged.get_or_init(|| {
            if self.gather == Gather::Raw {
                self.native.iter().map(RubyStackTraceElement::from_native).collect()
            } else {
                self.construct()
            }
        })
    }

    fn construct(&self) -> Vec<RubyStackTraceElement> {
        let mut trace = Vec::with_capacity(self.native.len());
        let mut cursor = self.logical.len() as isize - 1;
        let mut dup: Option<(Arc<str>, Arc<str>)> = None;

        let mut index = 0;
        while index < self.native.len() {
            let frame = &self.native[index];
            index += 1;
            match &frame.kind {
                NativeFrameKind::Compiled { method } => {
                    let file: Arc<str> = Arc::from(&*frame.file);
                    if self.mask_native {
                        if let Some((class_name, name)) = dup.take() {
                            trace.push(RubyStackTraceElement::new(
                                &class_name,
                                name,
                                Arc::clone(&file),
                                frame.line,
                                None,
                            ));
                        }
                    }
                    trace.push(RubyStackTraceElement::new(
                        &frame.class_name,
                        Arc::clone(method),
                        file,
                        frame.line,
                        Some(FrameType::Method),
                    ));
                    while self
                        .native
                        .get(index)
                        .is_some_and(|next| next.kind == NativeFrameKind::Synthetic)
                    {
                        index += 1;
                    }
                }
                NativeFrameKind::Host { bound } if self.full_trace || bound.is_some() => {
                    let name = bound
                        .clone()
                        .unwrap_or_else(|| Arc::from(&*frame.method_name));
                    if self.mask_native {
                        dup = Some((Arc::from(&*frame.class_name), name));
                    } else {
                        trace.push(RubyStackTraceElement::new(
                            &frame.class_name,
                            name,
                            Arc::from(&*frame.file),
                            frame.line,
                            None,
                        ));
                    }
                }
                NativeFrameKind::Interpreter(frame_type) if cursor >= 0 => {
                    let element = &self.logical[cursor as usize];
                    cursor -= 1;
                    if self.mask_native {
                        if let Some((class_name, name)) = dup.take() {
                            trace.push(RubyStackTraceElement::new(
                                &class_name,
                                name,
                                Arc::clone(&element.file),
                                element.line,
                                None,
                            ));
                        }
                    }
                    trace.push(RubyStackTraceElement::new(
                        &frame.class_name,
                        frame_type.display_name(&element.method),
                        Arc::clone(&element.file),
                        element.line,
                        Some(*frame_type),
                    ));
                }
                _ => {}
            }
        }
        trace
    }

    /// Merged trace without its innermost `skip` entries.
    pub fn partial_trace(&self, skip: usize) -> &[RubyStackTraceElement] {
        let trace = self.stack_trace();
        &trace[skip.min(trace.len())..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(method: &str, line: u32) -> BacktraceElement {
        BacktraceElement {
            method: Arc::from(method),
            file: Arc::from("main.rb"),
            line,
        }
    }

    fn plumbing() -> NativeFrame {
        NativeFrame::host(
            "solvra_interp::ir::call_site",
            "CallSite::call",
            "src/ir/call_site.rs",
            None,
        )
    }

    #[test]
    fn compiled_frames_gobble_synthetic_helpers() {
        let native = vec![
            NativeFrame::compiled("fast", "lib.rb", 3),
            NativeFrame::synthetic("compiled::fast", "fast$helper"),
            NativeFrame::synthetic("compiled::fast", "fast$varargs"),
            NativeFrame::interpreter(FrameType::Root),
        ];
        let data = BacktraceData::new(native, vec![element("<main>", 1)], false, false);
        let names: Vec<&str> = data.stack_trace().iter().map(|e| &*e.method_name).collect();
        assert_eq!(names, ["fast", "<main>"]);
    }

    #[test]
    fn masked_bound_frame_is_emitted_at_next_ruby_location() {
        let native = vec![
            NativeFrame::interpreter(FrameType::Block),
            NativeFrame::host(
                "solvra_interp::runtime::builtins::array",
                "array_each",
                "src/runtime/builtins.rs",
                Some(Arc::from("each")),
            ),
            plumbing(),
            NativeFrame::interpreter(FrameType::Method),
        ];
        let logical = vec![element("foo", 2), element("foo", 3)];
        let masked = BacktraceData::new(native.clone(), logical.clone(), false, true);
        let lines: Vec<String> = masked.stack_trace().iter().map(|e| e.mri_line()).collect();
        assert_eq!(
            lines,
            [
                "main.rb:3:in 'block in foo'",
                "main.rb:2:in 'each'",
                "main.rb:2:in 'foo'",
            ]
        );

        let plain = BacktraceData::new(native, logical, false, false);
        assert_eq!(plain.stack_trace()[1].mri_line(), "src/runtime/builtins.rs:0:in 'each'");
        assert_eq!(plain.stack_trace().len(), 3);
    }

    #[test]
    fn missing_logical_frames_never_panic() {
        let native = vec![
            NativeFrame::interpreter(FrameType::Method),
            NativeFrame::interpreter(FrameType::Method),
        ];
        let data = BacktraceData::new(native, vec![element("only", 7)], true, false);
        assert_eq!(data.stack_trace().len(), 1);
        assert!(BacktraceData::empty().stack_trace().is_empty());
    }

    #[test]
    fn raw_gather_keeps_every_native_frame() {
        let native = vec![NativeFrame::interpreter(FrameType::Method), plumbing()];
        let data = BacktraceData::for_gather(Gather::Raw, native, vec![element("foo", 1)]);
        let trace = data.stack_trace();
        assert_eq!(trace.len(), 2);
        assert_eq!(&*trace[1].method_name, "CallSite::call");
        assert!(trace.iter().all(|e| e.frame_type.is_none()));
    }
}
