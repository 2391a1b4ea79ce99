mod util;

use std::sync::Arc;

use solvra_interp::ir::{Instr, Operand, Scope, ScopeBuilder};
use solvra_interp::profile::{PrinterKind, ProfileData, ProfilePrinter};
use solvra_interp::runtime::ClassId;
use solvra_interp::{RuntimeConfig, ThreadContext, Value, demos, run_script};

use util::context_with;

fn profiled_fib(config: RuntimeConfig, n: i64) -> (ThreadContext, ProfileData) {
    let mut ctx = context_with(config);
    ctx.start_profiling();
    run_script(&mut ctx, &demos::fib(n)).expect("fib");
    let data = ctx.stop_profiling().expect("profile attached");
    (ctx, data)
}

fn fib_serial(ctx: &ThreadContext) -> u32 {
    ctx.runtime()
        .find_method(ClassId::OBJECT, "fib")
        .expect("fib defined")
        .serial
}

/// `profile { fib(5) }`
fn profile_block() -> Arc<Scope> {
    let mut s = ScopeBuilder::script("profile.rb");
    let mut block = ScopeBuilder::closure(&s, 2);
    let result = block.temp();
    block.fcall(Some(result.into()), "fib", vec![Operand::int(5)]);
    block.ret(result.into());
    let block = block.build();

    s.method_prologue();
    let method = demos::fib_method();
    s.emit(Instr::DefineMethod {
        name: Arc::clone(method.name()),
        scope: method,
    });
    let closure = s.temp();
    s.emit(Instr::BuildClosure {
        result: closure.into(),
        scope: block,
        lambda: false,
    });
    let value = s.temp();
    s.fcall_with_block(Some(value.into()), "profile", Vec::new(), closure.into());
    s.method_epilogue(value.into());
    s.build()
}

#[test]
fn recursion_is_counted_once() {
    let (ctx, mut data) = profiled_fib(RuntimeConfig::default(), 5);
    data.compute_results();
    let fib = data.method_data(fib_serial(&ctx));
    assert_eq!(fib.total_calls(), 15);
    assert!(
        fib.invocations()
            .iter()
            .any(|id| data.invocation(*id).recursive_depth() > 1)
    );
    assert!(fib.total_time() <= data.total_time());
    assert!(fib.self_time() <= fib.total_time());
    assert!(fib.parents().contains(&fib_serial(&ctx)));
}

#[test]
fn computing_results_twice_is_stable() {
    let (ctx, mut data) = profiled_fib(RuntimeConfig::default(), 6);
    let first_top = data.compute_results();
    let first_total = data.total_time();
    let first_calls = data.method_data(fib_serial(&ctx)).total_calls();
    let second_top = data.compute_results();
    assert_eq!(first_top, second_top);
    assert_eq!(first_total, data.total_time());
    assert_eq!(first_calls, data.method_data(fib_serial(&ctx)).total_calls());
}

#[test]
fn profile_block_hides_its_own_entry() {
    let mut ctx = context_with(RuntimeConfig::default());
    let outcome = run_script(&mut ctx, &profile_block());
    assert_eq!(outcome.expect("profile"), Value::Integer(5));
    assert!(!ctx.is_profiling());

    let entry = ctx.runtime().profiler_entry_serial();
    let fib = fib_serial(&ctx);
    let mut data = ctx.take_last_profile().expect("last profile");
    let top = data.compute_results();
    assert_eq!(data.invocation(top).serial(), entry);
    let serials = data.serials();
    assert!(serials.contains(&fib));
    assert!(!serials.contains(&entry));
    assert_eq!(data.method_data(fib).total_calls(), 15);
}

#[test]
fn registry_bound_stops_tracking_new_methods() {
    let config = RuntimeConfig::default().with_max_profiled_methods(3);
    let (ctx, mut data) = profiled_fib(config, 5);
    let methods = ctx.runtime().profiled_methods();
    assert_eq!(methods.len(), 3);
    assert_eq!(methods.warnings_issued(), 1);

    let fib = fib_serial(&ctx);
    assert!(!methods.contains(fib));
    data.compute_results();
    assert!(!data.serials().contains(&fib));
}

#[test]
fn registered_methods_keep_profiling_once_the_registry_is_full() {
    // Seven slots cover the Kernel and Object built-ins plus `Integer#+`.
    let config = RuntimeConfig::default().with_max_profiled_methods(7);
    let (ctx, mut data) = profiled_fib(config, 5);
    let methods = ctx.runtime().profiled_methods();
    assert_eq!(methods.len(), 7);
    assert_eq!(methods.warnings_issued(), 1);

    let add = ctx
        .runtime()
        .find_method(ClassId::INTEGER, "+")
        .expect("Integer#+")
        .serial;
    let sub = ctx
        .runtime()
        .find_method(ClassId::INTEGER, "-")
        .expect("Integer#-")
        .serial;
    assert!(methods.contains(add));
    assert!(!methods.contains(sub));
    assert!(!methods.contains(fib_serial(&ctx)));

    data.compute_results();
    assert!(data.serials().contains(&add));
    assert!(!data.serials().contains(&sub));
    assert_eq!(data.method_data(add).total_calls(), 7);
}

#[test]
fn contexts_can_start_profiled() {
    let ctx = context_with(RuntimeConfig::default().with_profiling(true));
    assert!(ctx.is_profiling());
}

#[test]
fn printers_render_a_real_run() {
    let (ctx, mut data) = profiled_fib(RuntimeConfig::default(), 6);
    let printer = ProfilePrinter::new(&mut data, ctx.runtime().profiled_methods());

    let flat = printer.render(PrinterKind::Flat);
    assert!(flat.contains("Object#fib"), "{flat}");
    assert!(flat.contains("Integer#+"), "{flat}");

    let graph = printer.render(PrinterKind::Graph);
    assert!(graph.contains("Object#fib"), "{graph}");

    let json = printer.render(PrinterKind::Json);
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert!(parsed.is_object());
}
