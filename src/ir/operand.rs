//=====================================================
// File: ir/operand.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Operands consumed and produced by IR instructions
// Objective: Keep constants thread-safe so prepared scopes can be shared,
//            while variables address frame temporaries and bindings
//=====================================================

use std::fmt;
use std::sync::Arc;

/// Jump target. Resolved to a program counter when the scope is prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Temporary register, local to one activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TempVar(pub u32);

/// Local variable in a binding chain. `depth` counts hops out through
/// enclosing closure bindings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalVar {
    pub name: Arc<str>,
    pub depth: u32,
    pub slot: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Variable {
    Temp(TempVar),
    Local(LocalVar),
}

impl Variable {
    pub fn temp_index(&self) -> Option<u32> {
        match self {
            Variable::Temp(temp) => Some(temp.0),
            Variable::Local(_) => None,
        }
    }
}

impl From<TempVar> for Variable {
    fn from(value: TempVar) -> Self {
        Variable::Temp(value)
    }
}

impl From<LocalVar> for Variable {
    fn from(value: LocalVar) -> Self {
        Variable::Local(value)
    }
}

/// Literal operand. `Send + Sync`, materialised into a `Value` on read.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Str(Arc<str>),
    Symbol(Arc<str>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Const(Constant),
    Var(Variable),
    SelfValue,
}

impl Operand {
    pub fn nil() -> Self {
        Operand::Const(Constant::Nil)
    }

    pub fn int(value: i64) -> Self {
        Operand::Const(Constant::Integer(value))
    }

    pub fn str(value: &str) -> Self {
        Operand::Const(Constant::Str(Arc::from(value)))
    }

    pub fn sym(value: &str) -> Self {
        Operand::Const(Constant::Symbol(Arc::from(value)))
    }

    pub fn bool(value: bool) -> Self {
        Operand::Const(Constant::Bool(value))
    }

    pub fn temp_index(&self) -> Option<u32> {
        match self {
            Operand::Var(variable) => variable.temp_index(),
            _ => None,
        }
    }
}

impl From<TempVar> for Operand {
    fn from(value: TempVar) -> Self {
        Operand::Var(Variable::Temp(value))
    }
}

impl From<LocalVar> for Operand {
    fn from(value: LocalVar) -> Self {
        Operand::Var(Variable::Local(value))
    }
}

impl From<Variable> for Operand {
    fn from(value: Variable) -> Self {
        Operand::Var(value)
    }
}

impl From<Constant> for Operand {
    fn from(value: Constant) -> Self {
        Operand::Const(value)
    }
}
