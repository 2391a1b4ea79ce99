//=====================================================
// File: error.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Error taxonomy for the interpreter core
// Objective: Separate internal interpreter faults from language-level
//            exceptions and expose stable error codes to embedders
//=====================================================

use std::rc::Rc;

use thiserror::Error;

use crate::backtrace::TraceType;
use crate::ir::ScopeError;
use crate::runtime::RubyException;

/// Internal faults raised by the interpreter itself.
///
/// These never reach user-level `rescue` clauses; the dispatch loop routes
/// them through ensure handlers only.
#[derive(Debug, Clone, Error)]
pub enum InterpError {
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error("scope '{scope}' fell off the end of its instructions without returning")]
    FellOffEnd { scope: String },
    #[error("temporary slot {slot} out of range in scope '{scope}' ({count} slots)")]
    TempOutOfRange {
        scope: String,
        slot: u32,
        count: usize,
    },
    #[error("local variable '{name}' (depth {depth}, slot {slot}) has no binding")]
    MissingBinding { name: String, depth: u32, slot: u32 },
    #[error("{operation} executed without a matching push in scope '{scope}'")]
    Unbalanced {
        operation: &'static str,
        scope: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Raised,
    Killed,
    LocalJump,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Raised => "E101",
            ErrorCode::Killed => "E102",
            ErrorCode::LocalJump => "E103",
            ErrorCode::Internal => "E104",
        }
    }
}

/// Outcome of a top-level invocation that did not return normally.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{} ({})", .0.message(), .0.class_name())]
    Raised(Rc<RubyException>),
    #[error("execution killed")]
    Killed,
    #[error("{0}")]
    LocalJump(String),
    #[error(transparent)]
    Internal(#[from] InterpError),
}

impl ExecError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ExecError::Raised(_) => ErrorCode::Raised,
            ExecError::Killed => ErrorCode::Killed,
            ExecError::LocalJump(_) => ErrorCode::LocalJump,
            ExecError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    /// The unhandled exception object, when there is one.
    pub fn exception(&self) -> Option<&Rc<RubyException>> {
        match self {
            ExecError::Raised(exception) => Some(exception),
            _ => None,
        }
    }

    /// Render the fault for a terminal, using the exception's merged
    /// backtrace when one was captured.
    pub fn render(&self, trace_type: TraceType, color: bool) -> String {
        match self {
            ExecError::Raised(exception) => exception.render(trace_type, color),
            other => format!("{}: {other}", other.code_str()),
        }
    }
}

//=====================================================
// End of file
//=====================================================
