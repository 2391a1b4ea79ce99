//=====================================================
// File: interp/dispatch.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Instruction dispatch loop
// Objective: Execute one prepared scope activation, routing every fault to
//            the rescue or ensure handler that covers the faulting pc
//=====================================================

use std::rc::Rc;
use std::sync::Arc;

use super::signal::Unwind;
use super::{args, invoke_method, yield_block};
use crate::error::InterpError;
use crate::ir::{BranchCond, CallInstr, CallType, Instr, Operand, Prepared, Scope, Variable};
use crate::runtime::{
    Block, BlockParts, ClassId, DynamicScope, Frame, FrameId, ThreadContext, Value, Visibility,
};

/// Mutable state of one running scope.
pub(crate) struct Activation<'a> {
    pub scope: &'a Arc<Scope>,
    pub prepared: Arc<Prepared>,
    pub self_value: Value,
    pub args: &'a [Value],
    /// Block visible to `yield` and `RECV_CLOSURE`.
    pub block: Option<Rc<Block>>,
    /// The block being run, when this activation is a closure body.
    pub closure: Option<Rc<Block>>,
    pub frame_id: FrameId,
    pub klass: ClassId,
    pub method_name: Arc<str>,
    pub serial: u32,
    pub visibility: Visibility,
    pub temps: Vec<Value>,
    pub bindings: Vec<Rc<DynamicScope>>,
    pub frames_pushed: usize,
    /// Fault handed to the handler that is currently running.
    pub exception: Option<Unwind>,
}

impl<'a> Activation<'a> {
    pub fn new(
        scope: &'a Arc<Scope>,
        prepared: Arc<Prepared>,
        self_value: Value,
        args: &'a [Value],
        frame_id: FrameId,
    ) -> Self {
        let temps = vec![Value::Nil; prepared.temp_count()];
        Self {
            scope,
            prepared,
            self_value,
            args,
            block: None,
            closure: None,
            frame_id,
            klass: ClassId::OBJECT,
            method_name: Arc::clone(scope.name()),
            serial: 0,
            visibility: Visibility::Public,
            temps,
            bindings: Vec::new(),
            frames_pushed: 0,
            exception: None,
        }
    }

    fn binding(&self) -> Option<&Rc<DynamicScope>> {
        self.bindings.last()
    }

    fn is_proc(&self) -> bool {
        self.closure.as_ref().is_some_and(|block| !block.is_lambda())
    }

    fn is_lambda(&self) -> bool {
        self.closure.as_ref().is_some_and(|block| block.is_lambda())
    }

    fn read(&self, operand: &Operand) -> Result<Value, Unwind> {
        match operand {
            Operand::Const(constant) => Ok(Value::from(constant)),
            Operand::SelfValue => Ok(self.self_value.clone()),
            Operand::Var(Variable::Temp(temp)) => {
                self.temps.get(temp.0 as usize).cloned().ok_or_else(|| {
                    Unwind::from(InterpError::TempOutOfRange {
                        scope: self.scope.name().to_string(),
                        slot: temp.0,
                        count: self.temps.len(),
                    })
                })
            }
            Operand::Var(Variable::Local(local)) => self
                .binding()
                .and_then(|binding| binding.get(local.depth, local.slot))
                .ok_or_else(|| {
                    Unwind::from(InterpError::MissingBinding {
                        name: local.name.to_string(),
                        depth: local.depth,
                        slot: local.slot,
                    })
                }),
        }
    }

    fn read_all(&self, operands: &[Operand]) -> Result<Vec<Value>, Unwind> {
        operands.iter().map(|operand| self.read(operand)).collect()
    }

    fn store(&mut self, variable: &Variable, value: Value) -> Result<(), Unwind> {
        match variable {
            Variable::Temp(temp) => {
                let count = self.temps.len();
                let slot = self.temps.get_mut(temp.0 as usize).ok_or_else(|| {
                    InterpError::TempOutOfRange {
                        scope: self.scope.name().to_string(),
                        slot: temp.0,
                        count,
                    }
                })?;
                *slot = value;
                Ok(())
            }
            Variable::Local(local) => {
                let stored = self
                    .binding()
                    .is_some_and(|binding| binding.set(local.depth, local.slot, value));
                if stored {
                    Ok(())
                } else {
                    Err(InterpError::MissingBinding {
                        name: local.name.to_string(),
                        depth: local.depth,
                        slot: local.slot,
                    }
                    .into())
                }
            }
        }
    }

    fn store_opt(&mut self, variable: Option<&Variable>, value: Value) -> Result<(), Unwind> {
        match variable {
            Some(variable) => self.store(variable, value),
            None => Ok(()),
        }
    }

    fn unbalanced(&self, operation: &'static str) -> Unwind {
        InterpError::Unbalanced {
            operation,
            scope: self.scope.name().to_string(),
        }
        .into()
    }
}

enum Flow {
    Next,
    Jump(usize),
    Return(Value),
}

/// Run `act` until it returns or a fault escapes every handler.
pub(crate) fn interpret(
    ctx: &mut ThreadContext,
    act: &mut Activation<'_>,
) -> Result<Value, Unwind> {
    let prepared = Arc::clone(&act.prepared);
    let instrs = prepared.instrs();
    let mut pc = 0usize;
    loop {
        let Some(instr) = instrs.get(pc) else {
            if act.scope.kind().allows_fallthrough() {
                return Ok(Value::Nil);
            }
            return Err(InterpError::FellOffEnd {
                scope: act.scope.name().to_string(),
            }
            .into());
        };
        match execute(ctx, act, &prepared, instr) {
            Ok(Flow::Next) => pc += 1,
            Ok(Flow::Jump(target)) => pc = target,
            Ok(Flow::Return(value)) => return Ok(value),
            Err(unwind) => {
                let handler = if unwind.is_rescuable() {
                    prepared.rescuer_pc(pc)
                } else {
                    prepared.ensurer_pc(pc)
                };
                if handler < 0 {
                    return Err(unwind);
                }
                tracing::trace!(scope = %act.scope.name(), pc, handler, "entering handler");
                act.exception = Some(unwind);
                pc = handler as usize;
            }
        }
    }
}

fn execute(
    ctx: &mut ThreadContext,
    act: &mut Activation<'_>,
    prepared: &Prepared,
    instr: &Instr,
) -> Result<Flow, Unwind> {
    // Value-producing arms yield the value; the store into `instr.result()`
    // happens once below.
    let produced = match instr {
        Instr::Label(_) => None,
        Instr::Jump { target } => return Ok(Flow::Jump(prepared.target(*target))),
        Instr::Branch {
            cond,
            value,
            target,
        } => {
            let value = act.read(value)?;
            let taken = match cond {
                BranchCond::Equal(other) => value == act.read(other)?,
                BranchCond::NotEqual(other) => value != act.read(other)?,
                BranchCond::Truthy => value.is_truthy(),
                BranchCond::Falsy => !value.is_truthy(),
                BranchCond::Nil => value.is_nil(),
                BranchCond::Undefined => matches!(value, Value::Undefined),
            };
            if taken {
                return Ok(Flow::Jump(prepared.target(*target)));
            }
            None
        }
        Instr::Call(call) => Some(call_instr(ctx, act, call)?),
        Instr::Copy { source, .. } => Some(act.read(source)?),
        Instr::RecvPreReqdArg { index, .. } => Some(args::pre_reqd(act.args, *index)),
        Instr::RecvPostReqdArg {
            index,
            pre,
            opt,
            post,
            ..
        } => {
            let has_rest = act.scope.signature().rest;
            Some(args::post_reqd(act.args, *index, *pre, *opt, *post, has_rest))
        }
        Instr::RecvOptArg { index, pre, post, .. } => {
            Some(args::opt(act.args, *index, *pre, *post))
        }
        Instr::RecvRestArg { pre, opt, post, .. } => {
            Some(args::rest(act.args, *pre, *opt, *post))
        }
        Instr::RecvClosure { .. } => {
            Some(act.block.clone().map(Value::Proc).unwrap_or(Value::Nil))
        }
        Instr::RecvException { .. } => Some(match act.exception.take() {
            Some(Unwind::Raise(exception)) => Value::Exception(exception),
            Some(other) => Value::Signal(Rc::new(other)),
            None => Value::Nil,
        }),
        Instr::Return { value } => return Ok(Flow::Return(act.read(value)?)),
        Instr::NonLocalReturn { value } => {
            let value = act.read(value)?;
            return match act.closure.as_ref() {
                Some(block) if !block.is_lambda() => {
                    let target = block.frame_id();
                    if ctx.is_frame_active(target) {
                        Err(Unwind::NonLocalReturn { target, value })
                    } else {
                        Err(ctx.raise(ClassId::LOCAL_JUMP_ERROR, "unexpected return"))
                    }
                }
                _ => Ok(Flow::Return(value)),
            };
        }
        Instr::Break { value } => {
            let value = act.read(value)?;
            if act.is_lambda() {
                return Ok(Flow::Return(value));
            }
            let target = match act.closure.as_ref() {
                Some(block) => block.frame_id(),
                None => {
                    return Err(ctx.raise(ClassId::LOCAL_JUMP_ERROR, "break from proc-closure"));
                }
            };
            if !ctx.is_frame_active(target) {
                return Err(ctx.raise(ClassId::LOCAL_JUMP_ERROR, "break from proc-closure"));
            }
            return Err(Unwind::Break { target, value });
        }
        Instr::PushFrame => {
            ctx.push_frame(Frame {
                id: act.frame_id,
                self_value: act.self_value.clone(),
                klass: act.klass,
                name: Arc::clone(&act.method_name),
                serial: act.serial,
                block: act.block.clone(),
                visibility: act.visibility,
            });
            act.frames_pushed += 1;
            None
        }
        Instr::PopFrame => {
            if act.frames_pushed == 0 {
                return Err(act.unbalanced("POP_FRAME"));
            }
            ctx.pop_frame();
            act.frames_pushed -= 1;
            None
        }
        Instr::PushBinding => {
            let parent = act.closure.as_ref().map(|block| Rc::clone(block.binding()));
            act.bindings
                .push(DynamicScope::new(act.scope.local_count(), parent));
            None
        }
        Instr::PopBinding => {
            if act.bindings.pop().is_none() {
                return Err(act.unbalanced("POP_BINDING"));
            }
            None
        }
        Instr::CheckArity { signature } => {
            if !act.is_proc() {
                if let Some(message) = args::arity_error(signature, act.args.len()) {
                    return Err(ctx.raise(ClassId::ARGUMENT_ERROR, message));
                }
            }
            None
        }
        Instr::LineNumber { line } => {
            ctx.set_line(*line);
            None
        }
        Instr::ThreadPoll => {
            if ctx.take_interrupt() {
                tracing::trace!(scope = %act.scope.name(), "interrupt observed");
                return Err(Unwind::Kill);
            }
            if ctx.runtime().config().thread_poll_sampling {
                ctx.runtime().scope_counters().increment(act.scope.id());
            }
            None
        }
        Instr::BuildClosure {
            scope,
            lambda,
            ..
        } => {
            let binding = match act.binding() {
                Some(binding) => Rc::clone(binding),
                None => DynamicScope::new(0, None),
            };
            let block = Block::from_parts(BlockParts {
                scope: Arc::clone(scope),
                binding,
                self_value: act.self_value.clone(),
                frame_id: act.frame_id,
                klass: act.klass,
                serial: act.serial,
                outer_block: act.block.clone(),
                lambda: *lambda,
            });
            Some(Value::Proc(block))
        }
        Instr::BuildArray { elements, .. } => Some(Value::array(act.read_all(elements)?)),
        Instr::Yield { args, .. } => {
            let Some(block) = act.block.clone() else {
                return Err(ctx.raise(ClassId::LOCAL_JUMP_ERROR, "no block given (yield)"));
            };
            let values = act.read_all(args)?;
            Some(yield_block(ctx, &block, values, None)?)
        }
        Instr::DefineMethod { name, scope } => {
            ctx.runtime()
                .define_method(act.klass, name, Arc::clone(scope), Visibility::Public);
            None
        }
        Instr::RescueMatch {
            exception,
            class_name,
            ..
        } => {
            let matched = match act.read(exception)? {
                Value::Exception(exception) => {
                    let runtime = ctx.runtime();
                    runtime
                        .find_class(class_name)
                        .is_some_and(|class| runtime.is_a(exception.class_id(), class))
                }
                _ => false,
            };
            Some(Value::Bool(matched))
        }
        Instr::Throw { exception } => {
            return match act.read(exception)? {
                Value::Exception(exception) => Err(Unwind::Raise(exception)),
                Value::Signal(unwind) => Err(Rc::unwrap_or_clone(unwind)),
                Value::Nil => Ok(Flow::Next),
                Value::Str(message) => Err(ctx.raise(ClassId::RUNTIME_ERROR, &*message)),
                _ => Err(ctx.raise(ClassId::TYPE_ERROR, "exception class/object expected")),
            };
        }
    };
    if let Some(value) = produced {
        act.store_opt(instr.result(), value)?;
    }
    Ok(Flow::Next)
}

fn call_instr(
    ctx: &mut ThreadContext,
    act: &Activation<'_>,
    call: &CallInstr,
) -> Result<Value, Unwind> {
    let call_type = call.call_type();
    let receiver = match call_type {
        CallType::Normal => act.read(&call.receiver)?,
        CallType::Functional | CallType::Super => act.self_value.clone(),
    };
    let args = act.read_all(&call.args)?;
    let block = match call.block.as_ref().map(|operand| act.read(operand)).transpose()? {
        None | Some(Value::Nil) => None,
        Some(Value::Proc(block)) => Some(block),
        Some(other) => {
            let class = ctx.runtime().class_name(other.class_id());
            return Err(ctx.raise(
                ClassId::TYPE_ERROR,
                format!("wrong argument type {class} (expected Proc)"),
            ));
        }
    };

    let name = call.site.name();
    let class = match call_type {
        CallType::Super => match ctx.runtime().superclass(act.klass) {
            Some(superclass) => superclass,
            None => {
                return Err(ctx.raise(
                    ClassId::NO_METHOD_ERROR,
                    format!("super: no superclass method '{name}'"),
                ));
            }
        },
        _ => receiver.class_id(),
    };
    let Some(method) = call.site.resolve(ctx.runtime(), class) else {
        let target = describe_receiver(ctx, &receiver);
        return Err(ctx.raise(
            ClassId::NO_METHOD_ERROR,
            format!("undefined method '{name}' for {target}"),
        ));
    };
    if method.visibility == Visibility::Private && call_type == CallType::Normal {
        let target = describe_receiver(ctx, &receiver);
        return Err(ctx.raise(
            ClassId::NO_METHOD_ERROR,
            format!("private method '{name}' called for {target}"),
        ));
    }

    let passed_block = block.is_some();
    match invoke_method(ctx, &method, receiver, &args, block) {
        Err(Unwind::Break { target, value }) if target == act.frame_id => {
            if passed_block {
                Ok(value)
            } else {
                Err(ctx.raise(ClassId::LOCAL_JUMP_ERROR, "break from proc-closure"))
            }
        }
        other => other,
    }
}

fn describe_receiver(ctx: &ThreadContext, receiver: &Value) -> String {
    match receiver {
        Value::Nil => "nil".to_string(),
        Value::Bool(value) => value.to_string(),
        other => format!("an instance of {}", ctx.runtime().class_name(other.class_id())),
    }
}
