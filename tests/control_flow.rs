mod util;

use std::sync::Arc;

use solvra_interp::ir::{HandlerKind, Instr, Operand, Scope, ScopeBuilder};
use solvra_interp::{ExecError, Value, demos, run_script};

use util::{context, raised_class, run};

fn define(script: &mut ScopeBuilder, scope: Arc<Scope>) {
    script.emit(Instr::DefineMethod {
        name: Arc::clone(scope.name()),
        scope,
    });
}

/// `def make; proc { <body> }; end`, then `make.call` from the top level.
fn detached_proc(body: fn(Operand) -> Instr) -> Arc<Scope> {
    let mut make = ScopeBuilder::method("make", "detached.rb", 1);
    let mut block = ScopeBuilder::closure(&make, 2);
    block.emit(body(Operand::int(1)));
    let block = block.build();
    make.method_prologue();
    let closure = make.temp();
    make.emit(Instr::BuildClosure {
        result: closure.into(),
        scope: block,
        lambda: false,
    });
    make.method_epilogue(closure.into());

    let mut s = ScopeBuilder::script("detached.rb");
    s.method_prologue();
    define(&mut s, make.build());
    let made = s.temp();
    s.line(5).fcall(Some(made.into()), "make", Vec::new());
    s.line(6).call(None, "call", made.into(), Vec::new());
    s.method_epilogue(Operand::nil());
    s.build()
}

#[test]
fn break_from_each_yields_the_break_value() {
    let (outcome, output) = run(&demos::break_from_each());
    assert_eq!(outcome.expect("break"), Value::Integer(20));
    assert_eq!(output, "20\n");
}

#[test]
fn break_unwinds_through_an_interpreted_yield() {
    // def twice; yield 1; yield 2; :done; end
    let mut twice = ScopeBuilder::method("twice", "twice.rb", 1);
    twice.method_prologue();
    twice.emit(Instr::Yield {
        result: None,
        args: vec![Operand::int(1)],
    });
    twice.emit(Instr::Yield {
        result: None,
        args: vec![Operand::int(2)],
    });
    twice.method_epilogue(Operand::sym("done"));

    // puts twice { |x| break 9 }
    let mut s = ScopeBuilder::script("twice.rb");
    let mut block = ScopeBuilder::closure(&s, 6);
    block.emit(Instr::Break {
        value: Operand::int(9),
    });
    let block = block.build();
    s.method_prologue();
    define(&mut s, twice.build());
    let (closure, result) = (s.temp(), s.temp());
    s.emit(Instr::BuildClosure {
        result: closure.into(),
        scope: block,
        lambda: false,
    });
    s.fcall_with_block(Some(result.into()), "twice", Vec::new(), closure.into());
    s.fcall(None, "puts", vec![result.into()]);
    s.method_epilogue(result.into());

    let (outcome, output) = run(&s.build());
    assert_eq!(outcome.expect("break"), Value::Integer(9));
    assert_eq!(output, "9\n");
}

#[test]
fn return_inside_a_block_returns_from_the_method() {
    let (outcome, output) = run(&demos::return_from_block());
    assert_eq!(outcome.expect("return"), Value::Integer(2));
    assert_eq!(output, "2\n");
}

#[test]
fn lambdas_return_locally_and_check_arity() {
    let (outcome, output) = run(&demos::lambda());
    assert_eq!(output, "3\n");
    assert_eq!(raised_class(&outcome), "ArgumentError");
    let message = outcome
        .expect_err("arity")
        .exception()
        .map(|e| e.message().to_string());
    assert_eq!(
        message.as_deref(),
        Some("wrong number of arguments (given 1, expected 2)")
    );
}

#[test]
fn break_from_a_detached_proc_is_a_local_jump_error() {
    let scope = detached_proc(|value| Instr::Break { value });
    let (outcome, _) = run(&scope);
    assert_eq!(raised_class(&outcome), "LocalJumpError");
    let message = outcome
        .expect_err("detached")
        .exception()
        .map(|e| e.message().to_string());
    assert_eq!(message.as_deref(), Some("break from proc-closure"));
}

#[test]
fn return_from_a_detached_proc_is_a_local_jump_error() {
    let scope = detached_proc(|value| Instr::NonLocalReturn { value });
    let (outcome, _) = run(&scope);
    assert_eq!(raised_class(&outcome), "LocalJumpError");
    let message = outcome
        .expect_err("detached")
        .exception()
        .map(|e| e.message().to_string());
    assert_eq!(message.as_deref(), Some("unexpected return"));
}

#[test]
fn rescue_and_ensure_both_run() {
    let (outcome, output) = run(&demos::ensure());
    assert_eq!(outcome.expect("rescued"), Value::Nil);
    assert_eq!(output, "rescued\nboom\nensure ran\n");
}

fn polling_loop(kind: HandlerKind) -> Arc<Scope> {
    let mut s = ScopeBuilder::script("loop.rb");
    s.method_prologue();
    let (start, top, end, handler) = (s.new_label(), s.new_label(), s.new_label(), s.new_label());
    let pending = s.temp();
    s.label(start).label(top).thread_poll().jump(top);
    s.label(end).label(handler);
    s.emit(Instr::RecvException {
        result: pending.into(),
    });
    s.fcall(None, "puts", vec![Operand::str("cleanup")]);
    s.emit(Instr::Throw {
        exception: pending.into(),
    });
    s.method_epilogue(Operand::nil());
    s.protect(start, end, handler, kind);
    s.build()
}

#[test]
fn kill_runs_ensure_handlers() {
    let mut ctx = context();
    ctx.interrupt_handle().kill();
    let outcome = run_script(&mut ctx, &polling_loop(HandlerKind::Ensure));
    assert!(matches!(outcome, Err(ExecError::Killed)));
    assert_eq!(ctx.take_output(), "cleanup\n");
    assert_eq!(ctx.frame_depth(), 0);
}

#[test]
fn kill_is_not_rescuable() {
    let mut ctx = context();
    ctx.interrupt_handle().kill();
    let outcome = run_script(&mut ctx, &polling_loop(HandlerKind::Rescue));
    let err = outcome.expect_err("killed");
    assert!(matches!(err, ExecError::Killed));
    assert_eq!(err.code_str(), "E102");
    assert_eq!(ctx.take_output(), "");
}

#[test]
fn block_given_reflects_the_callers_block() {
    // def given?; block_given?; end
    let mut given = ScopeBuilder::method("given?", "given.rb", 1);
    given.method_prologue();
    let answer = given.temp();
    given.fcall(Some(answer.into()), "block_given?", Vec::new());
    given.method_epilogue(answer.into());

    let mut s = ScopeBuilder::script("given.rb");
    let mut block = ScopeBuilder::closure(&s, 4);
    block.ret(Operand::nil());
    let block = block.build();
    s.method_prologue();
    define(&mut s, given.build());
    let (closure, with, without, both) = (s.temp(), s.temp(), s.temp(), s.temp());
    s.emit(Instr::BuildClosure {
        result: closure.into(),
        scope: block,
        lambda: false,
    });
    s.fcall_with_block(Some(with.into()), "given?", Vec::new(), closure.into());
    s.fcall(Some(without.into()), "given?", Vec::new());
    s.emit(Instr::BuildArray {
        result: both.into(),
        elements: vec![with.into(), without.into()],
    });
    s.method_epilogue(both.into());

    let (outcome, _) = run(&s.build());
    assert_eq!(
        outcome.expect("block_given?"),
        Value::array(vec![Value::Bool(true), Value::Bool(false)])
    );
}
