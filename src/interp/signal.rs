//=====================================================
// File: interp/signal.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Non-local control flow carried through the dispatch loop
// Objective: Typed unwind payloads returned as `Err`, split into the one
//            rescuable kind and the signals only ensure handlers may see
//=====================================================

use std::rc::Rc;

use crate::error::{ExecError, InterpError};
use crate::runtime::{FrameId, RubyException, Value};

#[derive(Debug, Clone)]
pub enum Unwind {
    /// A language-level exception.
    Raise(Rc<RubyException>),
    /// `break` from a proc, unwinding to the call that passed the block in
    /// frame `target`.
    Break { target: FrameId, value: Value },
    /// `return` from a proc, unwinding to the method activation `target`.
    NonLocalReturn { target: FrameId, value: Value },
    /// Cancellation requested through an interrupt handle.
    Kill,
    /// Internal interpreter fault.
    Fatal(InterpError),
}

impl Unwind {
    /// Only language exceptions reach rescue handlers.
    pub fn is_rescuable(&self) -> bool {
        matches!(self, Unwind::Raise(_))
    }

    pub fn exception(&self) -> Option<&Rc<RubyException>> {
        match self {
            Unwind::Raise(exception) => Some(exception),
            _ => None,
        }
    }

    /// Convert an unwind that escaped the outermost activation.
    pub fn into_exec_error(self) -> ExecError {
        match self {
            Unwind::Raise(exception) => ExecError::Raised(exception),
            Unwind::Break { .. } => ExecError::LocalJump("break from proc-closure".to_string()),
            Unwind::NonLocalReturn { .. } => ExecError::LocalJump("unexpected return".to_string()),
            Unwind::Kill => ExecError::Killed,
            Unwind::Fatal(err) => ExecError::Internal(err),
        }
    }
}

impl From<InterpError> for Unwind {
    fn from(err: InterpError) -> Self {
        Unwind::Fatal(err)
    }
}

impl From<crate::ir::ScopeError> for Unwind {
    fn from(err: crate::ir::ScopeError) -> Self {
        Unwind::Fatal(InterpError::Scope(err))
    }
}
