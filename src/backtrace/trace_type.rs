//=====================================================
// File: backtrace/trace_type.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Backtrace gather strategies and output formats
// Objective: Select which frames a snapshot keeps and render merged traces
//            in MRI, Rubinius or colourised JRuby layouts
//=====================================================

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::data::BacktraceData;
use super::element::{BacktraceElement, FrameType, NativeFrame, RubyStackTraceElement};

const RED: &str = "\x1b[31m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const CYAN: &str = "\x1b[36m";
const CLEAR: &str = "\x1b[0m";

/// Which frames a backtrace keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gather {
    /// Every host frame, untranslated.
    Raw,
    /// Interpreted frames plus bound core methods.
    #[default]
    Normal,
    /// Interpreted frames plus every host frame.
    Full,
    /// Normal, with core method frames folded into their caller's location.
    Caller,
}

impl Gather {
    /// `(full_trace, mask_native)` passed to the merge.
    pub fn flags(self) -> (bool, bool) {
        match self {
            Gather::Raw | Gather::Full => (true, false),
            Gather::Normal => (false, false),
            Gather::Caller => (false, true),
        }
    }

    pub fn backtrace_data(
        self,
        native: Vec<NativeFrame>,
        logical: Vec<BacktraceElement>,
    ) -> BacktraceData {
        BacktraceData::for_gather(self, native, logical)
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "raw" => Some(Gather::Raw),
            "normal" => Some(Gather::Normal),
            "full" => Some(Gather::Full),
            "caller" => Some(Gather::Caller),
            _ => None,
        }
    }
}

/// How traces are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Mri,
    Jruby,
    Rubinius,
}

impl Format {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mri" => Some(Format::Mri),
            "jruby" => Some(Format::Jruby),
            "rubinius" => Some(Format::Rubinius),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraceType {
    gather: Gather,
    format: Format,
}

impl TraceType {
    pub fn new(gather: Gather, format: Format) -> Self {
        Self { gather, format }
    }

    pub fn gather(&self) -> Gather {
        self.gather
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Merged trace of `data` as this trace type gathers it.
    pub fn trace_for<'a>(
        &self,
        data: &'a BacktraceData,
        regathered: &'a mut Option<BacktraceData>,
    ) -> &'a [RubyStackTraceElement] {
        if data.gather() == self.gather {
            data.stack_trace()
        } else {
            regathered.insert(data.regather(self.gather)).stack_trace()
        }
    }

    /// Render an exception header followed by its frames.
    pub fn render_exception(
        &self,
        class_name: &str,
        message: &str,
        frames: &[RubyStackTraceElement],
        color: bool,
    ) -> String {
        match self.format {
            Format::Mri => render_mri(class_name, message, frames),
            Format::Rubinius => render_rubinius(class_name, message, frames),
            Format::Jruby => render_jruby(class_name, message, frames, color),
        }
    }

    /// One string per frame, as `caller` and `backtrace` expose them.
    pub fn render_frames(frames: &[RubyStackTraceElement]) -> Vec<String> {
        frames.iter().map(RubyStackTraceElement::mri_line).collect()
    }
}

fn render_mri(class_name: &str, message: &str, frames: &[RubyStackTraceElement]) -> String {
    let mut out = String::new();
    match frames.split_first() {
        Some((first, rest)) => {
            let _ = writeln!(out, "{}: {message} ({class_name})", first.mri_line());
            for frame in rest {
                let _ = writeln!(out, "\tfrom {}", frame.mri_line());
            }
        }
        None => {
            let _ = writeln!(out, "{message} ({class_name})");
        }
    }
    out
}

fn render_rubinius(class_name: &str, message: &str, frames: &[RubyStackTraceElement]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "An exception has occurred:");
    let _ = writeln!(out, "    {message} ({class_name})");
    let _ = writeln!(out);
    let _ = writeln!(out, "Backtrace:");
    let width = frames
        .iter()
        .map(|frame| frame.method_name.chars().count())
        .max()
        .unwrap_or(0);
    for frame in frames {
        let _ = writeln!(
            out,
            "  {:>width$} at {}:{}",
            frame.method_name,
            frame.file,
            frame.line
        );
    }
    out
}

/// Frames grouped under the file they run in; interpreted frames are
/// highlighted, host frames dimmed.
fn render_jruby(
    class_name: &str,
    message: &str,
    frames: &[RubyStackTraceElement],
    color: bool,
) -> String {
    let paint = |code: &'static str| if color { code } else { "" };
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}{class_name}{}: {}{message}{}",
        paint(RED),
        paint(CLEAR),
        paint(BOLD),
        paint(CLEAR)
    );
    let mut current_file: Option<&str> = None;
    for frame in frames {
        if current_file != Some(&*frame.file) {
            let _ = writeln!(out, "  {}{}{}", paint(CYAN), frame.file, paint(CLEAR));
            current_file = Some(&*frame.file);
        }
        let shade = match frame.frame_type {
            Some(FrameType::Method | FrameType::Root) => paint(BOLD),
            Some(FrameType::Block | FrameType::Eval) => "",
            None => paint(DIM),
        };
        let _ = writeln!(
            out,
            "    {shade}{:>5}{} {}",
            frame.line,
            paint(CLEAR),
            frame.method_name
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn frame(method: &str, file: &str, line: u32) -> RubyStackTraceElement {
        RubyStackTraceElement::new(
            "solvra_interp::interp",
            Arc::from(method),
            Arc::from(file),
            line,
            Some(FrameType::Method),
        )
    }

    fn sample() -> Vec<RubyStackTraceElement> {
        vec![frame("bar", "main.rb", 9), frame("foo", "main.rb", 5), frame("<main>", "main.rb", 12)]
    }

    #[test]
    fn mri_layout_puts_message_on_first_frame() {
        let text = TraceType::default().render_exception("RuntimeError", "boom", &sample(), false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "main.rb:9:in 'bar': boom (RuntimeError)");
        assert_eq!(lines[1], "\tfrom main.rb:5:in 'foo'");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn rubinius_layout_right_aligns_method_names() {
        let trace = TraceType::new(Gather::Normal, Format::Rubinius);
        let text = trace.render_exception("RuntimeError", "boom", &sample(), false);
        assert!(text.contains("     bar at main.rb:9"));
        assert!(text.contains("  <main> at main.rb:12"));
    }

    #[test]
    fn jruby_layout_groups_by_file() {
        let mut frames = sample();
        frames.insert(1, frame("helper", "lib.rb", 2));
        let trace = TraceType::new(Gather::Normal, Format::Jruby);
        let text = trace.render_exception("RuntimeError", "boom", &frames, false);
        assert_eq!(text.matches("  main.rb\n").count(), 2);
        assert_eq!(text.matches("  lib.rb\n").count(), 1);
        assert!(!text.contains('\x1b'));
        let colored = trace.render_exception("RuntimeError", "boom", &frames, true);
        assert!(colored.contains(RED));
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(Gather::parse("CALLER"), Some(Gather::Caller));
        assert_eq!(Format::parse("Rubinius"), Some(Format::Rubinius));
        assert_eq!(Format::parse("yaml"), None);
    }
}
