// Dispatch loop tests: arithmetic, arity, calls, eval bodies and hot counters

mod util;

use std::sync::Arc;

use solvra_interp::ir::{BranchCond, CallType, Instr, Operand, Scope, ScopeBuilder, Signature};
use solvra_interp::runtime::{ClassId, Visibility};
use solvra_interp::{ExecError, InterpError, RuntimeConfig, Value, call_method, demos, run_eval};

use util::{context, raised_class, run};

/// `def pick(a, b = 7); a + b; end`
fn pick_method() -> Arc<Scope> {
    let mut m = ScopeBuilder::method("pick", "pick.rb", 1);
    m.set_signature(Signature {
        pre: 1,
        opt: 1,
        ..Signature::NONE
    });
    m.method_prologue();
    let a = m.local("a");
    let b = m.local("b");
    m.emit(Instr::RecvPreReqdArg {
        result: a.clone().into(),
        index: 0,
    });
    m.emit(Instr::RecvOptArg {
        result: b.clone().into(),
        index: 0,
        pre: 1,
        post: 0,
    });
    let defaulted = m.new_label();
    m.branch(BranchCond::Undefined, b.clone().into(), defaulted);
    let given = m.new_label();
    m.jump(given);
    m.label(defaulted).copy(b.clone().into(), Operand::int(7));
    m.label(given);
    let sum = m.temp();
    m.call(Some(sum.into()), "+", a.into(), vec![b.into()]);
    m.method_epilogue(sum.into());
    m.build()
}

#[test]
fn fib_is_deterministic() {
    let scope = demos::fib(10);
    let (first, first_output) = run(&scope);
    let (second, second_output) = run(&scope);
    assert_eq!(first.expect("first run"), Value::Integer(55));
    assert_eq!(second.expect("second run"), Value::Integer(55));
    assert_eq!(first_output, "55\n");
    assert_eq!(first_output, second_output);
}

#[test]
fn results_are_stored_only_where_an_instruction_names_one() {
    let mut s = ScopeBuilder::script("store.rb");
    s.method_prologue();
    let (n, list, size, out) = (s.temp(), s.temp(), s.temp(), s.temp());
    s.copy(n.into(), Operand::int(5));
    // Discarded result: `n` keeps its value.
    s.call(None, "+", n.into(), vec![Operand::int(1)]);
    s.emit(Instr::BuildArray {
        result: list.into(),
        elements: vec![n.into(), Operand::int(2)],
    });
    s.call(Some(size.into()), "size", list.into(), Vec::new());
    s.emit(Instr::BuildArray {
        result: out.into(),
        elements: vec![n.into(), size.into()],
    });
    s.method_epilogue(out.into());

    let (outcome, _) = run(&s.build());
    let expected = Value::array(vec![Value::Integer(5), Value::Integer(2)]);
    assert_eq!(outcome.expect("stored values"), expected);
}

#[test]
fn arity_is_enforced_for_methods() {
    let mut ctx = context();
    let method = pick_method();
    ctx.runtime()
        .define_method(ClassId::OBJECT, "pick", method, Visibility::Public);
    let top = ctx.top_self().clone();
    for given in 0..4usize {
        let args: Vec<Value> = (0..given as i64).map(Value::Integer).collect();
        let outcome = call_method(&mut ctx, &top, "pick", &args, None);
        match given {
            1 => assert_eq!(outcome.expect("one argument"), Value::Integer(7)),
            2 => assert_eq!(outcome.expect("two arguments"), Value::Integer(1)),
            _ => {
                let err = outcome.expect_err("arity error");
                let exception = err.exception().expect("raised");
                assert_eq!(exception.class_name(), "ArgumentError");
                assert_eq!(
                    exception.message(),
                    format!("wrong number of arguments (given {given}, expected 1..2)")
                );
            }
        }
    }
}

#[test]
fn optional_arguments_take_defaults() {
    let mut ctx = context();
    ctx.runtime()
        .define_method(ClassId::OBJECT, "pick", pick_method(), Visibility::Public);
    let top = ctx.top_self().clone();
    let defaulted = call_method(&mut ctx, &top, "pick", &[Value::Integer(1)], None);
    assert_eq!(defaulted.expect("pick(1)"), Value::Integer(8));
    let both = [Value::Integer(1), Value::Integer(2)];
    let explicit = call_method(&mut ctx, &top, "pick", &both, None);
    assert_eq!(explicit.expect("pick(1, 2)"), Value::Integer(3));
}

#[test]
fn falling_off_a_method_is_an_internal_error() {
    let mut m = ScopeBuilder::method("loose", "loose.rb", 1);
    m.method_prologue();
    let mut ctx = context();
    ctx.runtime()
        .define_method(ClassId::OBJECT, "loose", m.build(), Visibility::Public);
    let top = ctx.top_self().clone();
    let err = call_method(&mut ctx, &top, "loose", &[], None).expect_err("fell off");
    assert!(matches!(err, ExecError::Internal(InterpError::FellOffEnd { .. })));
    assert_eq!(err.code_str(), "E104");
    assert_eq!(ctx.frame_depth(), 0);
    assert_eq!(ctx.backtrace_depth(), 0);
    assert_eq!(ctx.native_depth(), 0);
}

#[test]
fn eval_scopes_fall_through_to_nil() {
    let mut ctx = context();
    let mut eval = ScopeBuilder::eval("(eval)", "(eval)", 1);
    eval.emit(Instr::PushBinding);
    let x = eval.local("x");
    eval.copy(x.into(), Operand::int(3));
    let outcome = run_eval(&mut ctx, &eval.build(), Value::Integer(1));
    assert_eq!(outcome.expect("eval"), Value::Nil);
}

#[test]
fn unbalanced_pop_frame_is_reported() {
    let mut s = ScopeBuilder::script("pop.rb");
    s.emit(Instr::PopFrame);
    let (outcome, _) = run(&s.build());
    let err = outcome.expect_err("unbalanced");
    assert!(matches!(
        err,
        ExecError::Internal(InterpError::Unbalanced {
            operation: "POP_FRAME",
            ..
        })
    ));
}

#[test]
fn missing_and_private_methods_raise_no_method_error() {
    let mut s = ScopeBuilder::script("calls.rb");
    s.method_prologue();
    s.call(None, "puts", Operand::int(5), vec![Operand::str("x")]);
    s.method_epilogue(Operand::nil());
    let (outcome, output) = run(&s.build());
    assert_eq!(raised_class(&outcome), "NoMethodError");
    let err = outcome.expect_err("private");
    let message = err.exception().map(|e| e.message().to_string());
    assert_eq!(
        message.as_deref(),
        Some("private method 'puts' called for an instance of Integer")
    );
    assert!(output.is_empty());

    let mut s = ScopeBuilder::script("calls.rb");
    s.method_prologue();
    s.fcall(None, "nope", Vec::new());
    s.method_epilogue(Operand::nil());
    let (outcome, _) = run(&s.build());
    assert_eq!(raised_class(&outcome), "NoMethodError");
}

#[test]
fn super_calls_start_above_the_defining_class() {
    let mut ctx = context();
    let runtime = ctx.runtime().clone();
    let animal = runtime.define_class("Animal", ClassId::OBJECT);
    let dog = runtime.define_class("Dog", animal);

    let mut base = ScopeBuilder::method("speak", "animal.rb", 1);
    base.method_prologue().method_epilogue(Operand::str("..."));
    runtime.define_method(animal, "speak", base.build(), Visibility::Public);

    let mut derived = ScopeBuilder::method("speak", "dog.rb", 1);
    derived.method_prologue();
    let inherited = derived.temp();
    derived.emit(Instr::call(
        Some(inherited.into()),
        "speak",
        CallType::Super,
        Operand::SelfValue,
        Vec::new(),
        None,
    ));
    derived.method_epilogue(inherited.into());
    runtime.define_method(dog, "speak", derived.build(), Visibility::Public);

    let outcome = call_method(&mut ctx, &Value::object(dog), "speak", &[], None);
    assert_eq!(outcome.expect("super"), Value::str("..."));
}

#[test]
fn yield_without_a_block_is_a_local_jump_error() {
    let mut m = ScopeBuilder::method("each_one", "yield.rb", 1);
    m.method_prologue();
    m.emit(Instr::Yield {
        result: None,
        args: vec![Operand::int(1)],
    });
    m.method_epilogue(Operand::nil());
    let mut ctx = context();
    ctx.runtime()
        .define_method(ClassId::OBJECT, "each_one", m.build(), Visibility::Public);
    let top = ctx.top_self().clone();
    let err = call_method(&mut ctx, &top, "each_one", &[], None).expect_err("no block");
    let exception = err.exception().expect("raised");
    assert_eq!(exception.class_name(), "LocalJumpError");
    assert_eq!(exception.message(), "no block given (yield)");
}

#[test]
fn thread_poll_sampling_counts_hot_scopes() {
    let config = RuntimeConfig::default().with_thread_poll_sampling(true);
    let mut ctx = util::context_with(config);
    let outcome = solvra_interp::run_script(&mut ctx, &demos::fib(10));
    assert_eq!(outcome.expect("fib"), Value::Integer(55));
    let hot = ctx.runtime().hot_scopes(1);
    assert_eq!(hot.len(), 1);
    // fib(10) makes 177 calls, each polling once.
    assert_eq!(hot[0].1, 177);
    assert!(ctx.runtime().hot_scopes(178).is_empty());
}
