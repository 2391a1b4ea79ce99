//=====================================================
// File: interp/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Entry points into the IR interpreter
// Objective: Set up method, block, script and eval activations with their
//            frame, backtrace and profiler bookkeeping around the dispatch loop
//=====================================================

mod args;
mod dispatch;
mod signal;

use std::rc::Rc;
use std::sync::Arc;

pub use signal::Unwind;

use crate::backtrace::{FrameType, NativeFrame};
use crate::error::ExecError;
use crate::ir::{Scope, ScopeKind};
use crate::profile;
use crate::runtime::{
    Block, ClassId, DynamicMethod, DynamicScope, MethodBody, ThreadContext, Value, Visibility,
};

use dispatch::Activation;

const CALL_SITE_HOST: &str = "solvra_interp::ir::call_site";

/// Run a script (or eval) scope against the top-level `self`.
pub fn run_script(ctx: &mut ThreadContext, scope: &Arc<Scope>) -> Result<Value, ExecError> {
    let self_value = ctx.top_self().clone();
    run_toplevel(ctx, scope, self_value).map_err(Unwind::into_exec_error)
}

/// Run an eval scope against `self_value`.
pub fn run_eval(
    ctx: &mut ThreadContext,
    scope: &Arc<Scope>,
    self_value: Value,
) -> Result<Value, ExecError> {
    run_toplevel(ctx, scope, self_value).map_err(Unwind::into_exec_error)
}

/// Call `name` on `receiver` from the host. Private methods are allowed.
pub fn call_method(
    ctx: &mut ThreadContext,
    receiver: &Value,
    name: &str,
    args: &[Value],
    block: Option<&Rc<Block>>,
) -> Result<Value, ExecError> {
    let class = receiver.class_id();
    let Some(method) = ctx.runtime().find_method(class, name) else {
        let class_name = ctx.runtime().class_name(class);
        let exception = ctx.new_exception(
            ClassId::NO_METHOD_ERROR,
            format!("undefined method '{name}' for an instance of {class_name}"),
        );
        return Err(ExecError::Raised(exception));
    };
    invoke_method(ctx, &method, receiver.clone(), args, block.cloned())
        .map_err(Unwind::into_exec_error)
}

/// Call a block from the host, as `Proc#call` would.
pub fn call_block(
    ctx: &mut ThreadContext,
    block: &Rc<Block>,
    args: &[Value],
) -> Result<Value, ExecError> {
    yield_block(ctx, block, args.to_vec(), None).map_err(Unwind::into_exec_error)
}

fn run_toplevel(
    ctx: &mut ThreadContext,
    scope: &Arc<Scope>,
    self_value: Value,
) -> Result<Value, Unwind> {
    let prepared = scope.prepare_for_interpretation(false)?;
    let frame_id = ctx.next_frame_id();
    let act = Activation::new(scope, prepared, self_value, &[], frame_id);
    let frame_type = match scope.kind() {
        ScopeKind::Eval => FrameType::Eval,
        _ => FrameType::Root,
    };
    let element = frame_type.display_name(scope.name());
    run_activation(ctx, act, frame_type, &element)
}

/// Invoke a resolved method. Pushes the call-site host frame (and the
/// built-in's own frame for natives) and reports to the profiler when the
/// method is tracked.
pub(crate) fn invoke_method(
    ctx: &mut ThreadContext,
    method: &Arc<DynamicMethod>,
    receiver: Value,
    args: &[Value],
    block: Option<Rc<Block>>,
) -> Result<Value, Unwind> {
    let native_depth = ctx.native_depth();
    ctx.push_native(NativeFrame::host(
        CALL_SITE_HOST,
        "CallSite::call",
        "src/ir/call_site.rs",
        None,
    ));

    let tracked = ctx.runtime().profiled_methods().contains(method.serial);
    let caller_serial = ctx.current_serial();
    let start = profile::now();
    let previous = if tracked {
        ctx.profile_mut().map(|data| data.profile_enter(method.serial))
    } else {
        None
    };

    let result = match &method.body {
        MethodBody::Interpreted(scope) => {
            interpret_method(ctx, method, scope, receiver, args, block)
        }
        MethodBody::Native(native) => {
            let bound = ctx
                .runtime()
                .bound_methods()
                .lookup(native.host_class, native.host_method);
            ctx.push_native(NativeFrame::host(
                native.host_class,
                native.host_method,
                native.host_file,
                bound,
            ));
            (native.func)(ctx, &receiver, args, block.as_ref())
        }
    };
    ctx.truncate_native(native_depth);

    if tracked {
        match (previous, ctx.profile_mut()) {
            (Some(previous), Some(data)) => data.profile_exit(previous, start),
            // Profiling started while this call was running.
            (None, Some(data)) => data.profile_exit(caller_serial, start),
            _ => {}
        }
    }
    result
}

fn interpret_method(
    ctx: &mut ThreadContext,
    method: &DynamicMethod,
    scope: &Arc<Scope>,
    receiver: Value,
    args: &[Value],
    block: Option<Rc<Block>>,
) -> Result<Value, Unwind> {
    let prepared = scope.prepare_for_interpretation(false)?;
    let frame_id = ctx.next_frame_id();
    let mut act = Activation::new(scope, prepared, receiver, args, frame_id);
    act.block = block;
    act.klass = method.owner;
    act.method_name = Arc::clone(&method.name);
    act.serial = method.serial;
    act.visibility = method.visibility;
    run_activation(ctx, act, FrameType::Method, &method.name)
}

/// Run a block body. Lambdas check arity strictly; procs spread a lone
/// array argument and pad or drop the rest.
pub(crate) fn yield_block(
    ctx: &mut ThreadContext,
    block: &Rc<Block>,
    args: Vec<Value>,
    block_arg: Option<Rc<Block>>,
) -> Result<Value, Unwind> {
    let scope = block.scope();
    let signature = scope.signature();
    let args = if block.is_lambda() {
        if let Some(message) = args::arity_error(&signature, args.len()) {
            return Err(ctx.raise(ClassId::ARGUMENT_ERROR, message));
        }
        args
    } else {
        args::splat_block_args(&signature, args)
    };

    let prepared = scope.prepare_for_interpretation(block.is_lambda())?;
    let self_value = block.self_value().clone();
    let mut act = Activation::new(scope, prepared, self_value, &args, block.frame_id());
    act.block = block_arg.or_else(|| block.outer_block().cloned());
    act.closure = Some(Rc::clone(block));
    act.klass = block.klass();
    act.method_name = Arc::clone(scope.method_name());
    act.serial = block.serial();
    act.visibility = Visibility::Public;
    act.bindings
        .push(DynamicScope::new(scope.local_count(), Some(Rc::clone(block.binding()))));
    run_activation(ctx, act, FrameType::Block, scope.method_name())
}

/// Push the logical element and the interpreter marker, run the loop, then
/// restore every stack to its depth on entry whatever the outcome.
fn run_activation(
    ctx: &mut ThreadContext,
    mut act: Activation<'_>,
    frame_type: FrameType,
    element: &Arc<str>,
) -> Result<Value, Unwind> {
    let frames = ctx.frame_depth();
    let backtrace = ctx.backtrace_depth();
    let native = ctx.native_depth();
    ctx.push_element(element, act.scope.file(), act.scope.line());
    ctx.push_native(NativeFrame::interpreter(frame_type));

    let owns_frame = act.closure.is_none();
    let frame_id = act.frame_id;
    let result = dispatch::interpret(ctx, &mut act);

    ctx.truncate_frames(frames);
    ctx.truncate_backtrace(backtrace);
    ctx.truncate_native(native);

    match result {
        Err(Unwind::NonLocalReturn { target, value }) if owns_frame && target == frame_id => {
            Ok(value)
        }
        Err(Unwind::Break { target, .. }) if owns_frame && target == frame_id => {
            Err(ctx.raise(ClassId::LOCAL_JUMP_ERROR, "break from proc-closure"))
        }
        other => other,
    }
}
