//=====================================================
// File: ir/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Instruction, operand and scope model
// Objective: Re-export the IR surface consumed by the dispatch loop
//=====================================================

mod builder;
mod call_site;
mod instr;
mod operand;
mod scope;

pub use builder::ScopeBuilder;
pub use call_site::{CallSite, CallType};
pub use instr::{BranchCond, CallInstr, Instr, Operation};
pub use operand::{Constant, Label, LocalVar, Operand, TempVar, Variable};
pub use scope::{
    ExceptionRegion, HandlerKind, Prepared, Scope, ScopeError, ScopeId, ScopeKind, Signature,
};
