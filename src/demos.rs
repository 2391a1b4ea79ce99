//=====================================================
// File: demos.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Built-in demo programs for the CLI
// Objective: Hand-assembled scopes exercising calls, recursion, closures,
//            non-local control flow, rescue/ensure and backtraces
//=====================================================

use std::sync::Arc;

use crate::ir::{
    BranchCond, CallType, HandlerKind, Instr, Operand, Scope, ScopeBuilder, Signature, Variable,
};

const FILE: &str = "demo.rb";

pub struct Demo {
    pub name: &'static str,
    pub summary: &'static str,
    build: fn() -> Arc<Scope>,
}

impl Demo {
    /// Build a fresh script scope for this demo.
    pub fn script(&self) -> Arc<Scope> {
        (self.build)()
    }
}

const DEMOS: &[Demo] = &[
    Demo {
        name: "fib",
        summary: "recursive fib(20), a good profiler target",
        build: || fib(20),
    },
    Demo {
        name: "raise",
        summary: "uncaught RuntimeError raised two calls deep",
        build: raise,
    },
    Demo {
        name: "ensure",
        summary: "rescue and ensure around a failing call",
        build: ensure,
    },
    Demo {
        name: "break",
        summary: "break out of Array#each with a value",
        build: break_from_each,
    },
    Demo {
        name: "return",
        summary: "return from a method inside a block",
        build: return_from_block,
    },
    Demo {
        name: "lambda",
        summary: "lambda return and strict arity",
        build: lambda,
    },
    Demo {
        name: "caller",
        summary: "print the caller stack from a nested method",
        build: caller,
    },
];

pub fn all() -> &'static [Demo] {
    DEMOS
}

pub fn find(name: &str) -> Option<&'static Demo> {
    DEMOS.iter().find(|demo| demo.name == name)
}

fn var(local: &crate::ir::LocalVar) -> Variable {
    Variable::Local(local.clone())
}

fn define(script: &mut ScopeBuilder, scope: Arc<Scope>) {
    script.emit(Instr::DefineMethod {
        name: Arc::clone(scope.name()),
        scope,
    });
}

/// `def fib(n); return n if n < 2; fib(n - 1) + fib(n - 2); end`
pub fn fib_method() -> Arc<Scope> {
    let mut b = ScopeBuilder::method("fib", FILE, 1);
    b.set_signature(Signature::required(1));
    b.method_prologue();
    let n = b.local("n");
    b.emit(Instr::RecvPreReqdArg {
        result: var(&n),
        index: 0,
    });
    b.line(2).thread_poll();
    let small = b.temp();
    b.call(Some(small.into()), "<", n.clone().into(), vec![Operand::int(2)]);
    let recurse = b.new_label();
    b.branch(BranchCond::Falsy, small.into(), recurse);
    // Locals are gone once the binding is popped.
    let base = b.temp();
    b.copy(base.into(), n.clone().into());
    b.method_epilogue(base.into());

    b.label(recurse).line(3);
    let (a, b1) = (b.temp(), b.temp());
    b.call(Some(a.into()), "-", n.clone().into(), vec![Operand::int(1)]);
    b.fcall(Some(b1.into()), "fib", vec![a.into()]);
    let (c, d) = (b.temp(), b.temp());
    b.call(Some(c.into()), "-", n.into(), vec![Operand::int(2)]);
    b.fcall(Some(d.into()), "fib", vec![c.into()]);
    let sum = b.temp();
    b.call(Some(sum.into()), "+", b1.into(), vec![d.into()]);
    b.method_epilogue(sum.into());
    b.build()
}

/// `puts fib(n)`
pub fn fib(n: i64) -> Arc<Scope> {
    let mut s = ScopeBuilder::script(FILE);
    s.method_prologue();
    define(&mut s, fib_method());
    s.line(6);
    let result = s.temp();
    s.fcall(Some(result.into()), "fib", vec![Operand::int(n)]);
    s.fcall(None, "puts", vec![result.into()]);
    s.method_epilogue(result.into());
    s.build()
}

/// `def bar; raise "boom"; end` at line 1.
fn bar_raising() -> Arc<Scope> {
    let mut bar = ScopeBuilder::method("bar", FILE, 1);
    bar.method_prologue();
    bar.line(2).fcall(None, "raise", vec![Operand::str("boom")]);
    bar.method_epilogue(Operand::nil());
    bar.build()
}

/// `def foo; bar; end` at line 4.
fn foo_calling_bar() -> Arc<Scope> {
    let mut foo = ScopeBuilder::method("foo", FILE, 4);
    foo.method_prologue();
    let result = foo.temp();
    foo.line(5).fcall(Some(result.into()), "bar", Vec::new());
    foo.method_epilogue(result.into());
    foo.build()
}

pub fn raise() -> Arc<Scope> {
    let mut s = ScopeBuilder::script(FILE);
    s.method_prologue();
    define(&mut s, bar_raising());
    define(&mut s, foo_calling_bar());
    s.line(7).fcall(None, "foo", Vec::new());
    s.method_epilogue(Operand::nil());
    s.build()
}

/// ```text
/// begin
///   foo
/// rescue RuntimeError => e
///   puts "rescued", e.message
/// ensure
///   puts "ensure ran"
/// end
/// ```
pub fn ensure() -> Arc<Scope> {
    let mut s = ScopeBuilder::script(FILE);
    s.method_prologue();
    define(&mut s, bar_raising());
    define(&mut s, foo_calling_bar());

    let start = s.new_label();
    let end = s.new_label();
    let rescue = s.new_label();
    let reraise = s.new_label();
    let ensure_fault = s.new_label();
    let ensure_body = s.new_label();
    let (pending, exception, matched, message) = (s.temp(), s.temp(), s.temp(), s.temp());

    s.label(start);
    s.line(8).fcall(None, "foo", Vec::new());
    s.label(end);
    s.copy(pending.into(), Operand::nil()).jump(ensure_body);

    s.label(rescue);
    s.emit(Instr::RecvException {
        result: exception.into(),
    });
    s.emit(Instr::RescueMatch {
        result: matched.into(),
        exception: exception.into(),
        class_name: Arc::from("RuntimeError"),
    });
    s.branch(BranchCond::Falsy, matched.into(), reraise);
    s.call(Some(message.into()), "message", exception.into(), Vec::new());
    s.line(10)
        .fcall(None, "puts", vec![Operand::str("rescued"), message.into()]);
    s.copy(pending.into(), Operand::nil()).jump(ensure_body);
    s.label(reraise);
    s.emit(Instr::Throw {
        exception: exception.into(),
    });

    s.label(ensure_fault);
    s.emit(Instr::RecvException {
        result: pending.into(),
    });
    s.label(ensure_body);
    s.line(12)
        .fcall(None, "puts", vec![Operand::str("ensure ran")]);
    s.emit(Instr::Throw {
        exception: pending.into(),
    });
    s.method_epilogue(Operand::nil());

    s.protect(start, end, rescue, HandlerKind::Rescue);
    s.protect(start, ensure_fault, ensure_fault, HandlerKind::Ensure);
    s.build()
}

/// `puts [1, 2, 3].each { |x| break x * 10 if x == 2 }`
pub fn break_from_each() -> Arc<Scope> {
    let mut s = ScopeBuilder::script(FILE);
    let mut block = ScopeBuilder::closure(&s, 1);
    block.set_signature(Signature::required(1));
    let x = block.declare_local("x");
    block.emit(Instr::RecvPreReqdArg {
        result: var(&x),
        index: 0,
    });
    let (hit, scaled) = (block.temp(), block.temp());
    let skip = block.new_label();
    block.call(Some(hit.into()), "==", x.clone().into(), vec![Operand::int(2)]);
    block.branch(BranchCond::Falsy, hit.into(), skip);
    block.call(Some(scaled.into()), "*", x.into(), vec![Operand::int(10)]);
    block.emit(Instr::Break {
        value: scaled.into(),
    });
    block.label(skip).ret(Operand::nil());
    let block = block.build();

    s.method_prologue();
    let (list, closure, result) = (s.temp(), s.temp(), s.temp());
    s.emit(Instr::BuildArray {
        result: list.into(),
        elements: vec![Operand::int(1), Operand::int(2), Operand::int(3)],
    });
    s.emit(Instr::BuildClosure {
        result: closure.into(),
        scope: block,
        lambda: false,
    });
    s.line(1).emit(Instr::call(
        Some(result.into()),
        "each",
        CallType::Normal,
        list.into(),
        Vec::new(),
        Some(closure.into()),
    ));
    s.fcall(None, "puts", vec![result.into()]);
    s.method_epilogue(result.into());
    s.build()
}

/// ```text
/// def find_two
///   [1, 2, 3].each { |x| return x if x == 2 }
///   nil
/// end
/// puts find_two
/// ```
pub fn return_from_block() -> Arc<Scope> {
    let mut m = ScopeBuilder::method("find_two", FILE, 1);
    let mut block = ScopeBuilder::closure(&m, 2);
    block.set_signature(Signature::required(1));
    let x = block.declare_local("x");
    block.emit(Instr::RecvPreReqdArg {
        result: var(&x),
        index: 0,
    });
    let hit = block.temp();
    let skip = block.new_label();
    block.call(Some(hit.into()), "==", x.clone().into(), vec![Operand::int(2)]);
    block.branch(BranchCond::Falsy, hit.into(), skip);
    block.emit(Instr::NonLocalReturn { value: x.into() });
    block.label(skip).ret(Operand::nil());
    let block = block.build();

    m.method_prologue();
    let (list, closure) = (m.temp(), m.temp());
    m.emit(Instr::BuildArray {
        result: list.into(),
        elements: vec![Operand::int(1), Operand::int(2), Operand::int(3)],
    });
    m.emit(Instr::BuildClosure {
        result: closure.into(),
        scope: block,
        lambda: false,
    });
    m.line(2).emit(Instr::call(
        None,
        "each",
        CallType::Normal,
        list.into(),
        Vec::new(),
        Some(closure.into()),
    ));
    m.line(3).method_epilogue(Operand::nil());
    let method = m.build();

    let mut s = ScopeBuilder::script(FILE);
    s.method_prologue();
    define(&mut s, method);
    let result = s.temp();
    s.line(5).fcall(Some(result.into()), "find_two", Vec::new());
    s.fcall(None, "puts", vec![result.into()]);
    s.method_epilogue(result.into());
    s.build()
}

/// ```text
/// add = lambda { |a, b| return a + b }
/// puts add.call(1, 2)
/// add.call(1)
/// ```
pub fn lambda() -> Arc<Scope> {
    let mut s = ScopeBuilder::script(FILE);
    let mut block = ScopeBuilder::closure(&s, 1);
    block.set_signature(Signature::required(2));
    let a = block.declare_local("a");
    let b = block.declare_local("b");
    block.emit(Instr::RecvPreReqdArg {
        result: var(&a),
        index: 0,
    });
    block.emit(Instr::RecvPreReqdArg {
        result: var(&b),
        index: 1,
    });
    let sum = block.temp();
    block.call(Some(sum.into()), "+", a.into(), vec![b.into()]);
    block.emit(Instr::NonLocalReturn { value: sum.into() });
    let block = block.build();

    s.method_prologue();
    let add = s.local("add");
    let (closure, three) = (s.temp(), s.temp());
    s.emit(Instr::BuildClosure {
        result: closure.into(),
        scope: block,
        lambda: true,
    });
    s.copy(var(&add), closure.into());
    s.line(2)
        .call(
            Some(three.into()),
            "call",
            add.clone().into(),
            vec![Operand::int(1), Operand::int(2)],
        );
    s.fcall(None, "puts", vec![three.into()]);
    s.line(3).call(None, "call", add.into(), vec![Operand::int(1)]);
    s.method_epilogue(Operand::nil());
    s.build()
}

/// `def bar; puts caller; end`, reached through `foo` from the top level.
pub fn caller() -> Arc<Scope> {
    let mut bar = ScopeBuilder::method("bar", FILE, 1);
    bar.method_prologue();
    let lines = bar.temp();
    bar.line(2).fcall(Some(lines.into()), "caller", Vec::new());
    bar.fcall(None, "puts", vec![lines.into()]);
    bar.method_epilogue(Operand::nil());

    let mut s = ScopeBuilder::script(FILE);
    s.method_prologue();
    define(&mut s, bar.build());
    define(&mut s, foo_calling_bar());
    s.line(7).fcall(None, "foo", Vec::new());
    s.method_epilogue(Operand::nil());
    s.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_demo_prepares() {
        for demo in all() {
            let scope = demo.script();
            scope
                .prepare_for_interpretation(false)
                .unwrap_or_else(|err| panic!("{}: {err}", demo.name));
        }
        assert!(find("fib").is_some());
        assert!(find("missing").is_none());
    }
}
