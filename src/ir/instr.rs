//=====================================================
// File: ir/instr.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Closed set of tagged IR instructions
// Objective: Describe every operation the dispatch loop executes, and expose
//            result slots and jump targets uniformly
//=====================================================

use std::sync::Arc;

use super::call_site::{CallSite, CallType};
use super::operand::{Label, Operand, Variable};
use super::scope::{Scope, Signature};

/// Operation kind of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Label,
    Jump,
    Branch,
    Call,
    Copy,
    RecvPreReqdArg,
    RecvPostReqdArg,
    RecvOptArg,
    RecvRestArg,
    RecvClosure,
    RecvException,
    Return,
    NonLocalReturn,
    Break,
    PushFrame,
    PopFrame,
    PushBinding,
    PopBinding,
    CheckArity,
    LineNumber,
    ThreadPoll,
    BuildClosure,
    BuildArray,
    Yield,
    DefineMethod,
    RescueMatch,
    Throw,
}

impl Operation {
    /// Argument receipt is only valid right after the frame/arity prologue.
    pub fn is_arg_receive(self) -> bool {
        matches!(
            self,
            Operation::RecvPreReqdArg
                | Operation::RecvPostReqdArg
                | Operation::RecvOptArg
                | Operation::RecvRestArg
                | Operation::RecvClosure
        )
    }

    pub fn transfers_control(self) -> bool {
        matches!(
            self,
            Operation::Jump
                | Operation::Branch
                | Operation::Return
                | Operation::NonLocalReturn
                | Operation::Break
                | Operation::Throw
        )
    }
}

/// Condition tested by a branch instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchCond {
    Equal(Operand),
    NotEqual(Operand),
    Truthy,
    Falsy,
    Nil,
    /// Taken when an optional argument was not supplied.
    Undefined,
}

#[derive(Debug, Clone)]
pub struct CallInstr {
    pub result: Option<Variable>,
    pub site: CallSite,
    pub receiver: Operand,
    pub args: Vec<Operand>,
    pub block: Option<Operand>,
}

impl CallInstr {
    pub fn call_type(&self) -> CallType {
        self.site.call_type()
    }
}

#[derive(Debug, Clone)]
pub enum Instr {
    /// Pseudo-instruction marking a jump target; removed by preparation.
    Label(Label),
    Jump {
        target: Label,
    },
    Branch {
        cond: BranchCond,
        value: Operand,
        target: Label,
    },
    Call(Box<CallInstr>),
    Copy {
        result: Variable,
        source: Operand,
    },
    RecvPreReqdArg {
        result: Variable,
        index: u32,
    },
    RecvPostReqdArg {
        result: Variable,
        index: u32,
        pre: u32,
        opt: u32,
        post: u32,
    },
    RecvOptArg {
        result: Variable,
        index: u32,
        pre: u32,
        post: u32,
    },
    RecvRestArg {
        result: Variable,
        pre: u32,
        opt: u32,
        post: u32,
    },
    RecvClosure {
        result: Variable,
    },
    RecvException {
        result: Variable,
    },
    Return {
        value: Operand,
    },
    NonLocalReturn {
        value: Operand,
    },
    Break {
        value: Operand,
    },
    PushFrame,
    PopFrame,
    PushBinding,
    PopBinding,
    CheckArity {
        signature: Signature,
    },
    LineNumber {
        line: u32,
    },
    ThreadPoll,
    BuildClosure {
        result: Variable,
        scope: Arc<Scope>,
        lambda: bool,
    },
    BuildArray {
        result: Variable,
        elements: Vec<Operand>,
    },
    Yield {
        result: Option<Variable>,
        args: Vec<Operand>,
    },
    DefineMethod {
        name: Arc<str>,
        scope: Arc<Scope>,
    },
    RescueMatch {
        result: Variable,
        exception: Operand,
        class_name: Arc<str>,
    },
    Throw {
        exception: Operand,
    },
}

impl Instr {
    pub fn call(
        result: Option<Variable>,
        name: &str,
        call_type: CallType,
        receiver: Operand,
        args: Vec<Operand>,
        block: Option<Operand>,
    ) -> Self {
        Instr::Call(Box::new(CallInstr {
            result,
            site: CallSite::new(name, call_type),
            receiver,
            args,
            block,
        }))
    }

    pub fn operation(&self) -> Operation {
        match self {
            Instr::Label(_) => Operation::Label,
            Instr::Jump { .. } => Operation::Jump,
            Instr::Branch { .. } => Operation::Branch,
            Instr::Call(_) => Operation::Call,
            Instr::Copy { .. } => Operation::Copy,
            Instr::RecvPreReqdArg { .. } => Operation::RecvPreReqdArg,
            Instr::RecvPostReqdArg { .. } => Operation::RecvPostReqdArg,
            Instr::RecvOptArg { .. } => Operation::RecvOptArg,
            Instr::RecvRestArg { .. } => Operation::RecvRestArg,
            Instr::RecvClosure { .. } => Operation::RecvClosure,
            Instr::RecvException { .. } => Operation::RecvException,
            Instr::Return { .. } => Operation::Return,
            Instr::NonLocalReturn { .. } => Operation::NonLocalReturn,
            Instr::Break { .. } => Operation::Break,
            Instr::PushFrame => Operation::PushFrame,
            Instr::PopFrame => Operation::PopFrame,
            Instr::PushBinding => Operation::PushBinding,
            Instr::PopBinding => Operation::PopBinding,
            Instr::CheckArity { .. } => Operation::CheckArity,
            Instr::LineNumber { .. } => Operation::LineNumber,
            Instr::ThreadPoll => Operation::ThreadPoll,
            Instr::BuildClosure { .. } => Operation::BuildClosure,
            Instr::BuildArray { .. } => Operation::BuildArray,
            Instr::Yield { .. } => Operation::Yield,
            Instr::DefineMethod { .. } => Operation::DefineMethod,
            Instr::RescueMatch { .. } => Operation::RescueMatch,
            Instr::Throw { .. } => Operation::Throw,
        }
    }

    /// Destination written by this instruction, if any.
    pub fn result(&self) -> Option<&Variable> {
        match self {
            Instr::Call(call) => call.result.as_ref(),
            Instr::Yield { result, .. } => result.as_ref(),
            Instr::Copy { result, .. }
            | Instr::RecvPreReqdArg { result, .. }
            | Instr::RecvPostReqdArg { result, .. }
            | Instr::RecvOptArg { result, .. }
            | Instr::RecvRestArg { result, .. }
            | Instr::RecvClosure { result }
            | Instr::RecvException { result }
            | Instr::BuildClosure { result, .. }
            | Instr::BuildArray { result, .. }
            | Instr::RescueMatch { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Static jump target, for jumps and branches.
    pub fn jump_target(&self) -> Option<Label> {
        match self {
            Instr::Jump { target } | Instr::Branch { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Operands read by this instruction.
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Instr::Branch { cond, value, .. } => match cond {
                BranchCond::Equal(other) | BranchCond::NotEqual(other) => vec![value, other],
                _ => vec![value],
            },
            Instr::Call(call) => {
                let mut operands = Vec::with_capacity(call.args.len() + 2);
                operands.push(&call.receiver);
                operands.extend(call.args.iter());
                operands.extend(call.block.iter());
                operands
            }
            Instr::Copy { source, .. } => vec![source],
            Instr::Return { value } | Instr::NonLocalReturn { value } | Instr::Break { value } => {
                vec![value]
            }
            Instr::BuildArray { elements, .. } => elements.iter().collect(),
            Instr::Yield { args, .. } => args.iter().collect(),
            Instr::RescueMatch { exception, .. } | Instr::Throw { exception } => vec![exception],
            _ => Vec::new(),
        }
    }

    /// Highest temporary index touched, as a read or a write.
    pub fn max_temp(&self) -> Option<u32> {
        let written = self.result().and_then(Variable::temp_index);
        self.operands()
            .into_iter()
            .filter_map(Operand::temp_index)
            .chain(written)
            .max()
    }
}
