//=====================================================
// File: runtime/builtins.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Core library methods implemented on the host
// Objective: Install Kernel, Integer, Array, Proc and Exception built-ins
//            plus the `profile { }` entry point every runtime starts with
//=====================================================

use std::rc::Rc;

use super::class::{ClassId, NativeFn, NativeMethod, Visibility};
use super::context::ThreadContext;
use super::frame::Block;
use super::value::Value;
use super::Runtime;
use crate::backtrace::Gather;
use crate::interp::{Unwind, yield_block};
use crate::profile::{self, ProfileData};

const KERNEL: &str = "solvra_interp::runtime::builtins::kernel";
const INTEGER: &str = "solvra_interp::runtime::builtins::integer";
const ARRAY: &str = "solvra_interp::runtime::builtins::array";
const PROC: &str = "solvra_interp::runtime::builtins::proc";
const OBJECT: &str = "solvra_interp::runtime::builtins::object";

struct Builtin {
    class: ClassId,
    name: &'static str,
    visibility: Visibility,
    host_class: &'static str,
    host_method: &'static str,
    func: NativeFn,
}

const fn private(name: &'static str, host_method: &'static str, func: NativeFn) -> Builtin {
    Builtin {
        class: ClassId::OBJECT,
        name,
        visibility: Visibility::Private,
        host_class: KERNEL,
        host_method,
        func,
    }
}

const fn public(
    class: ClassId,
    name: &'static str,
    host_class: &'static str,
    host_method: &'static str,
    func: NativeFn,
) -> Builtin {
    Builtin {
        class,
        name,
        visibility: Visibility::Public,
        host_class,
        host_method,
        func,
    }
}

const BUILTINS: &[Builtin] = &[
    private("raise", "raise", kernel_raise),
    private("caller", "caller", kernel_caller),
    private("puts", "puts", kernel_puts),
    private("block_given?", "block_given", kernel_block_given),
    public(ClassId::OBJECT, "==", OBJECT, "equal", object_equal),
    public(ClassId::OBJECT, "class", OBJECT, "class", object_class),
    public(ClassId::INTEGER, "+", INTEGER, "add", integer_add),
    public(ClassId::INTEGER, "-", INTEGER, "sub", integer_sub),
    public(ClassId::INTEGER, "*", INTEGER, "mul", integer_mul),
    public(ClassId::INTEGER, "/", INTEGER, "div", integer_div),
    public(ClassId::INTEGER, "<", INTEGER, "lt", integer_lt),
    public(ClassId::INTEGER, ">", INTEGER, "gt", integer_gt),
    public(ClassId::INTEGER, "<=", INTEGER, "le", integer_le),
    public(ClassId::INTEGER, "==", INTEGER, "eq", integer_eq),
    public(ClassId::INTEGER, "times", INTEGER, "times", integer_times),
    public(ClassId::ARRAY, "each", ARRAY, "each", array_each),
    public(ClassId::ARRAY, "[]", ARRAY, "aref", array_aref),
    public(ClassId::ARRAY, "size", ARRAY, "size", array_size),
    public(ClassId::ARRAY, "<<", ARRAY, "push", array_push),
    public(ClassId::PROC, "call", PROC, "call", proc_call),
    public(ClassId::EXCEPTION, "message", OBJECT, "message", exception_message),
];

/// Install every built-in and return the serial of `profile`.
pub(super) fn install(runtime: &Runtime) -> u32 {
    for builtin in BUILTINS {
        runtime.define_native(
            builtin.class,
            builtin.name,
            builtin.visibility,
            NativeMethod {
                host_class: builtin.host_class,
                host_method: builtin.host_method,
                host_file: file!(),
                func: builtin.func,
            },
        );
    }
    let entry = runtime.define_native(
        ClassId::OBJECT,
        "profile",
        Visibility::Private,
        NativeMethod {
            host_class: KERNEL,
            host_method: "profile",
            host_file: file!(),
            func: kernel_profile,
        },
    );
    entry.serial
}

// Section 1.0 - Kernel

fn kernel_raise(
    ctx: &mut ThreadContext,
    _receiver: &Value,
    args: &[Value],
    _block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    let (class, message) = match args {
        [] => (ClassId::RUNTIME_ERROR, "unhandled exception".to_string()),
        [Value::Exception(exception)] => return Err(Unwind::Raise(Rc::clone(exception))),
        [Value::Str(message)] => (ClassId::RUNTIME_ERROR, message.to_string()),
        [Value::Symbol(name), rest @ ..] => {
            let runtime = ctx.runtime();
            let class = runtime
                .find_class(name)
                .filter(|class| runtime.is_a(*class, ClassId::EXCEPTION));
            let Some(class) = class else {
                return Err(ctx.raise(ClassId::TYPE_ERROR, "exception class/object expected"));
            };
            let message = match rest.first() {
                Some(message) => message.to_display(),
                None => name.to_string(),
            };
            (class, message)
        }
        _ => return Err(ctx.raise(ClassId::TYPE_ERROR, "exception class/object expected")),
    };
    // Skip this built-in's own host frame so the trace starts at the caller.
    Err(Unwind::Raise(ctx.exception_skipping(class, message, 1)))
}

fn kernel_caller(
    ctx: &mut ThreadContext,
    _receiver: &Value,
    _args: &[Value],
    _block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    let data = ctx.capture_backtrace(Gather::Caller, 0);
    // Drop the host frames above the calling method, then the calling
    // method itself.
    let lines = data
        .stack_trace()
        .iter()
        .skip_while(|element| element.frame_type.is_none())
        .skip(1)
        .map(|element| Value::str(&element.mri_line()))
        .collect();
    Ok(Value::array(lines))
}

fn kernel_puts(
    ctx: &mut ThreadContext,
    _receiver: &Value,
    args: &[Value],
    _block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    fn emit(ctx: &mut ThreadContext, value: &Value) {
        match value {
            Value::Array(items) => {
                let items = items.borrow().clone();
                items.iter().for_each(|item| emit(ctx, item));
            }
            other => ctx.write_line(&other.to_display()),
        }
    }
    if args.is_empty() {
        ctx.write_line("");
    }
    args.iter().for_each(|arg| emit(ctx, arg));
    Ok(Value::Nil)
}

fn kernel_block_given(
    ctx: &mut ThreadContext,
    _receiver: &Value,
    _args: &[Value],
    _block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    let given = ctx
        .current_frame()
        .is_some_and(|frame| frame.block.is_some());
    Ok(Value::Bool(given))
}

/// `profile { ... }`: run the block under a fresh invocation tree and keep
/// the tree as the context's last profile. An enclosing session is parked
/// and restored afterwards.
fn kernel_profile(
    ctx: &mut ThreadContext,
    _receiver: &Value,
    _args: &[Value],
    block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    let Some(block) = block else {
        return Err(ctx.raise(ClassId::ARGUMENT_ERROR, "profile requires a block"));
    };
    let entry = ctx.runtime().profiler_entry_serial();
    let outer = ctx.replace_profile(Some(ProfileData::new(entry)));
    let start = profile::now();
    if let Some(data) = ctx.profile_mut() {
        data.profile_enter(entry);
    }
    let result = yield_block(ctx, block, Vec::new(), None);
    if let Some(data) = ctx.profile_mut() {
        data.profile_exit(0, start);
    }
    let data = ctx.replace_profile(outer);
    ctx.set_last_profile(data);
    result
}

// Section 2.0 - Object, Proc and Exception

fn object_equal(
    _ctx: &mut ThreadContext,
    receiver: &Value,
    args: &[Value],
    _block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    Ok(Value::Bool(args.first().is_some_and(|other| other == receiver)))
}

fn object_class(
    ctx: &mut ThreadContext,
    receiver: &Value,
    _args: &[Value],
    _block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    Ok(Value::symbol(&ctx.runtime().class_name(receiver.class_id())))
}

fn proc_call(
    ctx: &mut ThreadContext,
    receiver: &Value,
    args: &[Value],
    block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    match receiver {
        Value::Proc(proc) => yield_block(ctx, proc, args.to_vec(), block.cloned()),
        _ => Err(ctx.raise(ClassId::TYPE_ERROR, "receiver is not a Proc")),
    }
}

fn exception_message(
    _ctx: &mut ThreadContext,
    receiver: &Value,
    _args: &[Value],
    _block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    match receiver {
        Value::Exception(exception) => Ok(Value::str(exception.message())),
        other => Ok(Value::str(&other.to_display())),
    }
}

// Section 3.0 - Integer

fn integer_operands(
    ctx: &ThreadContext,
    receiver: &Value,
    args: &[Value],
) -> Result<(i64, i64), Unwind> {
    let lhs = receiver.as_integer();
    let rhs = args.first().and_then(Value::as_integer);
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => Ok((lhs, rhs)),
        _ => {
            let given = args
                .first()
                .map(|arg| ctx.runtime().class_name(arg.class_id()).to_string())
                .unwrap_or_else(|| "nothing".to_string());
            Err(ctx.raise(
                ClassId::TYPE_ERROR,
                format!("{given} can't be coerced into Integer"),
            ))
        }
    }
}

macro_rules! integer_op {
    ($name:ident, |$lhs:ident, $rhs:ident| $body:expr) => {
        fn $name(
            ctx: &mut ThreadContext,
            receiver: &Value,
            args: &[Value],
            _block: Option<&Rc<Block>>,
        ) -> Result<Value, Unwind> {
            let ($lhs, $rhs) = integer_operands(ctx, receiver, args)?;
            Ok($body)
        }
    };
}

integer_op!(integer_add, |lhs, rhs| Value::Integer(lhs.wrapping_add(rhs)));
integer_op!(integer_sub, |lhs, rhs| Value::Integer(lhs.wrapping_sub(rhs)));
integer_op!(integer_mul, |lhs, rhs| Value::Integer(lhs.wrapping_mul(rhs)));
integer_op!(integer_lt, |lhs, rhs| Value::Bool(lhs < rhs));
integer_op!(integer_gt, |lhs, rhs| Value::Bool(lhs > rhs));
integer_op!(integer_le, |lhs, rhs| Value::Bool(lhs <= rhs));

fn integer_eq(
    _ctx: &mut ThreadContext,
    receiver: &Value,
    args: &[Value],
    _block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    Ok(Value::Bool(args.first().is_some_and(|other| other == receiver)))
}

fn integer_div(
    ctx: &mut ThreadContext,
    receiver: &Value,
    args: &[Value],
    _block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    let (lhs, rhs) = integer_operands(ctx, receiver, args)?;
    if rhs == 0 {
        return Err(ctx.raise(ClassId::ZERO_DIVISION_ERROR, "divided by 0"));
    }
    Ok(Value::Integer(lhs.wrapping_div_euclid(rhs)))
}

fn integer_times(
    ctx: &mut ThreadContext,
    receiver: &Value,
    _args: &[Value],
    block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    let Some(block) = block else {
        return Err(ctx.raise(ClassId::LOCAL_JUMP_ERROR, "no block given (yield)"));
    };
    let count = receiver.as_integer().unwrap_or(0);
    for index in 0..count {
        yield_block(ctx, block, vec![Value::Integer(index)], None)?;
    }
    Ok(receiver.clone())
}

// Section 4.0 - Array

fn array_each(
    ctx: &mut ThreadContext,
    receiver: &Value,
    _args: &[Value],
    block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    let Value::Array(items) = receiver else {
        return Err(ctx.raise(ClassId::TYPE_ERROR, "receiver is not an Array"));
    };
    let Some(block) = block else {
        return Err(ctx.raise(ClassId::LOCAL_JUMP_ERROR, "no block given (yield)"));
    };
    let mut index = 0;
    // Re-read the length each pass; the block may push.
    loop {
        let item = items.borrow().get(index).cloned();
        let Some(item) = item else { break };
        yield_block(ctx, block, vec![item], None)?;
        index += 1;
    }
    Ok(receiver.clone())
}

fn array_aref(
    ctx: &mut ThreadContext,
    receiver: &Value,
    args: &[Value],
    _block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    let index = args.first().and_then(Value::as_integer);
    let (Value::Array(items), Some(index)) = (receiver, index) else {
        return Err(ctx.raise(ClassId::TYPE_ERROR, "no implicit conversion into Integer"));
    };
    let items = items.borrow();
    let len = items.len() as i64;
    let index = if index < 0 { len + index } else { index };
    let value = usize::try_from(index)
        .ok()
        .and_then(|index| items.get(index).cloned())
        .unwrap_or(Value::Nil);
    Ok(value)
}

fn array_size(
    _ctx: &mut ThreadContext,
    receiver: &Value,
    _args: &[Value],
    _block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    match receiver {
        Value::Array(items) => Ok(Value::Integer(items.borrow().len() as i64)),
        _ => Ok(Value::Integer(0)),
    }
}

fn array_push(
    ctx: &mut ThreadContext,
    receiver: &Value,
    args: &[Value],
    _block: Option<&Rc<Block>>,
) -> Result<Value, Unwind> {
    let Value::Array(items) = receiver else {
        return Err(ctx.raise(ClassId::TYPE_ERROR, "receiver is not an Array"));
    };
    items.borrow_mut().extend(args.iter().cloned());
    Ok(receiver.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::interp::call_method;

    fn context() -> ThreadContext {
        let mut ctx = ThreadContext::new(Runtime::new(RuntimeConfig::default()));
        ctx.capture_output();
        ctx
    }

    #[test]
    fn integer_arithmetic_and_errors() {
        let mut ctx = context();
        let sum = call_method(&mut ctx, &Value::Integer(2), "+", &[Value::Integer(3)], None);
        assert_eq!(sum.expect("sum"), Value::Integer(5));

        let err = call_method(&mut ctx, &Value::Integer(1), "/", &[Value::Integer(0)], None)
            .expect_err("division by zero");
        let exception = err.exception().expect("raised");
        assert_eq!(exception.class_name(), "ZeroDivisionError");

        let err = call_method(&mut ctx, &Value::Integer(1), "+", &[Value::str("x")], None)
            .expect_err("type error");
        assert_eq!(err.exception().map(|e| e.class_name()), Some("TypeError"));
    }

    #[test]
    fn integer_division_wraps_at_the_minimum() {
        let mut ctx = context();
        let minimum = Value::Integer(i64::MIN);
        let quotient = call_method(&mut ctx, &minimum, "/", &[Value::Integer(-1)], None);
        assert_eq!(quotient.expect("quotient"), Value::Integer(i64::MIN));

        let quotient = call_method(&mut ctx, &Value::Integer(7), "/", &[Value::Integer(2)], None);
        assert_eq!(quotient.expect("quotient"), Value::Integer(3));
    }

    #[test]
    fn raise_with_a_class_symbol() {
        let mut ctx = context();
        let top = ctx.top_self().clone();
        let err = call_method(
            &mut ctx,
            &top,
            "raise",
            &[Value::symbol("ArgumentError"), Value::str("bad")],
            None,
        )
        .expect_err("raised");
        let exception = err.exception().expect("exception");
        assert_eq!(exception.class_name(), "ArgumentError");
        assert_eq!(exception.message(), "bad");

        let err = call_method(&mut ctx, &top, "raise", &[Value::symbol("Integer")], None)
            .expect_err("not an exception class");
        assert_eq!(err.exception().map(|e| e.class_name()), Some("TypeError"));
    }

    #[test]
    fn puts_flattens_arrays() {
        let mut ctx = context();
        let top = ctx.top_self().clone();
        let list = Value::array(vec![Value::Integer(1), Value::str("two")]);
        call_method(&mut ctx, &top, "puts", &[list, Value::Nil], None).expect("puts");
        assert_eq!(ctx.take_output(), "1\ntwo\n\n");
    }

    #[test]
    fn array_indexing_wraps_negative_indices() {
        let mut ctx = context();
        let list = Value::array(vec![Value::Integer(1), Value::Integer(2)]);
        let last = call_method(&mut ctx, &list, "[]", &[Value::Integer(-1)], None).expect("aref");
        assert_eq!(last, Value::Integer(2));
        let missing = call_method(&mut ctx, &list, "[]", &[Value::Integer(5)], None).expect("aref");
        assert_eq!(missing, Value::Nil);
    }
}
