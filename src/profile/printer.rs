//=====================================================
// File: profile/printer.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Profile reports over the read-only query surface
// Objective: Flat and call-graph text tables plus a JSON document with the
//            per-method aggregates and the compressed call tree
//=====================================================

use std::fmt::Write as _;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use super::data::ProfileData;
use super::invocation::InvocationId;
use super::method_data::MethodData;
use super::methods::ProfiledMethods;

const RULE: &str =
    "--------------------------------------------------------------------------------";

/// Report layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterKind {
    Flat,
    Graph,
    Json,
}

impl PrinterKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "flat" => Some(PrinterKind::Flat),
            "graph" => Some(PrinterKind::Graph),
            "json" => Some(PrinterKind::Json),
            _ => None,
        }
    }
}

fn millis(nanos: u64) -> f64 {
    nanos as f64 / 1_000_000.0
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

#[derive(Debug, Serialize)]
struct JsonReport {
    generated_at: String,
    total_time_ns: u64,
    methods: Vec<JsonMethod>,
    tree: Vec<JsonNode>,
}

#[derive(Debug, Serialize)]
struct JsonMethod {
    serial: u32,
    name: String,
    total_time_ns: u64,
    self_time_ns: u64,
    child_time_ns: u64,
    calls: u64,
    parents: Vec<u32>,
    children: Vec<u32>,
}

#[derive(Debug, Serialize)]
struct JsonNode {
    serial: u32,
    name: String,
    duration_ns: u64,
    count: u64,
    depth: u32,
    children: Vec<JsonNode>,
}

pub struct ProfilePrinter<'a> {
    data: &'a ProfileData,
    methods: &'a ProfiledMethods,
}

impl<'a> ProfilePrinter<'a> {
    /// Computes results before taking the read-only view.
    pub fn new(data: &'a mut ProfileData, methods: &'a ProfiledMethods) -> Self {
        data.compute_results();
        Self { data, methods }
    }

    pub fn render(&self, kind: PrinterKind) -> String {
        match kind {
            PrinterKind::Flat => self.flat(),
            PrinterKind::Graph => self.graph(),
            PrinterKind::Json => self.json(),
        }
    }

    /// Methods ordered by total time, heaviest first.
    fn ranked(&self) -> Vec<MethodData<'a>> {
        let mut methods: Vec<MethodData<'a>> = self
            .data
            .serials()
            .into_iter()
            .map(|serial| self.data.method_data(serial))
            .collect();
        methods.sort_by(|a, b| {
            b.total_time()
                .cmp(&a.total_time())
                .then(a.serial().cmp(&b.serial()))
        });
        methods
    }

    pub fn flat(&self) -> String {
        let total = self.data.total_time();
        let mut out = String::new();
        let _ = writeln!(out, "Total time: {:.3} ms", millis(total));
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:>8} {:>12} {:>12} {:>12} {:>8}  name",
            "%self", "total(ms)", "self(ms)", "child(ms)", "calls"
        );
        let _ = writeln!(out, "{RULE}");
        for method in self.ranked() {
            let _ = writeln!(
                out,
                "{:>7.2}% {:>12.3} {:>12.3} {:>12.3} {:>8}  {}",
                percent(method.self_time(), total),
                millis(method.total_time()),
                millis(method.self_time()),
                millis(method.child_time()),
                method.total_calls(),
                self.methods.display_name(method.serial())
            );
        }
        out
    }

    /// Time over `timed` (outermost nodes only) and calls over every node in `counted`.
    fn sums(&self, timed: &[InvocationId], counted: &[InvocationId]) -> (u64, u64, u64) {
        let mut total = 0u64;
        let mut children = 0u64;
        for id in timed {
            let node = self.data.invocation(*id);
            total += node.duration();
            children += node
                .children()
                .values()
                .map(|child| self.data.invocation(*child).duration())
                .sum::<u64>();
        }
        let calls = counted.iter().map(|id| self.data.invocation(*id).count()).sum();
        (total, total.saturating_sub(children), calls)
    }

    pub fn graph(&self) -> String {
        let total = self.data.total_time();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>7} {:>7} {:>12} {:>12} {:>12} {:>12}  name",
            "%total", "%self", "total(ms)", "self(ms)", "child(ms)", "calls"
        );
        let _ = writeln!(out, "{RULE}");
        for method in self.ranked() {
            let calls = method.total_calls();
            for parent in method.parents() {
                let (time, self_time, count) = self.sums(
                    &method.root_invocations_from_parent(parent),
                    &method.invocations_from_parent(parent),
                );
                let _ = writeln!(
                    out,
                    "{:>15} {:>12.3} {:>12.3} {:>12.3} {:>12}      {}",
                    "",
                    millis(time),
                    millis(self_time),
                    millis(time.saturating_sub(self_time)),
                    format!("{count}/{calls}"),
                    self.methods.display_name(parent)
                );
            }
            let _ = writeln!(
                out,
                "{:>6.1}% {:>6.1}% {:>12.3} {:>12.3} {:>12.3} {:>12}  {}",
                percent(method.total_time(), total),
                percent(method.self_time(), total),
                millis(method.total_time()),
                millis(method.self_time()),
                millis(method.child_time()),
                calls,
                self.methods.display_name(method.serial())
            );
            for child in method.children() {
                let child_calls = self.data.method_data(child).total_calls();
                let (time, self_time, count) = self.sums(
                    &method.root_invocations_of_child(child),
                    &method.invocations_of_child(child),
                );
                let _ = writeln!(
                    out,
                    "{:>15} {:>12.3} {:>12.3} {:>12.3} {:>12}      {}",
                    "",
                    millis(time),
                    millis(self_time),
                    millis(time.saturating_sub(self_time)),
                    format!("{count}/{child_calls}"),
                    self.methods.display_name(child)
                );
            }
            let _ = writeln!(out, "{RULE}");
        }
        out
    }

    fn node(&self, id: InvocationId) -> JsonNode {
        let invocation = self.data.invocation(id);
        JsonNode {
            serial: invocation.serial(),
            name: self.methods.display_name(invocation.serial()).to_string(),
            duration_ns: invocation.duration(),
            count: invocation.count(),
            depth: invocation.recursive_depth(),
            children: invocation
                .children()
                .values()
                .map(|child| self.node(*child))
                .collect(),
        }
    }

    pub fn json(&self) -> String {
        let top = self.data.results_top();
        let report = JsonReport {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            total_time_ns: self.data.total_time(),
            methods: self
                .ranked()
                .into_iter()
                .map(|method| JsonMethod {
                    serial: method.serial(),
                    name: self.methods.display_name(method.serial()).to_string(),
                    total_time_ns: method.total_time(),
                    self_time_ns: method.self_time(),
                    child_time_ns: method.child_time(),
                    calls: method.total_calls(),
                    parents: method.parents().into_iter().collect(),
                    children: method.children().into_iter().collect(),
                })
                .collect(),
            tree: self
                .data
                .invocation(top)
                .children()
                .values()
                .map(|child| self.node(*child))
                .collect(),
        };
        serde_json::to_string_pretty(&report)
            .unwrap_or_else(|err| format!("{{\"error\":\"{err}\"}}"))
    }
}
