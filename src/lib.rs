//=====================================================
// File: lib.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: solvra_interp library root
// Objective: Expose the IR interpreter, the invocation profiler and the
//            backtrace reconstructor to the CLI and to embedders
//=====================================================

pub mod backtrace;
pub mod config;
pub mod demos;
pub mod error;
pub mod interp;
pub mod ir;
pub mod logging;
pub mod profile;
pub mod runtime;

pub use config::RuntimeConfig;
pub use error::{ErrorCode, ExecError, InterpError};
pub use interp::{Unwind, call_block, call_method, run_eval, run_script};
pub use runtime::{Runtime, ThreadContext, Value};

//=====================================================
// End of file
//=====================================================
