//=====================================================
// File: tests/util/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Shared helpers for the integration suites
// Objective: Build runtimes and contexts with captured output and run
//            scopes to completion
//=====================================================

#![allow(dead_code)]

use std::sync::Arc;

use solvra_interp::ir::Scope;
use solvra_interp::{ExecError, Runtime, RuntimeConfig, ThreadContext, Value, run_script};

pub fn context_with(config: RuntimeConfig) -> ThreadContext {
    let mut ctx = ThreadContext::new(Runtime::new(config));
    ctx.capture_output();
    ctx
}

pub fn context() -> ThreadContext {
    context_with(RuntimeConfig::default())
}

/// Run `scope` in a fresh context; returns the outcome and captured output.
pub fn run(scope: &Arc<Scope>) -> (Result<Value, ExecError>, String) {
    run_with(RuntimeConfig::default(), scope)
}

pub fn run_with(config: RuntimeConfig, scope: &Arc<Scope>) -> (Result<Value, ExecError>, String) {
    let mut ctx = context_with(config);
    let outcome = run_script(&mut ctx, scope);
    (outcome, ctx.take_output())
}

/// Class name of the raised exception, panicking on any other outcome.
pub fn raised_class(outcome: &Result<Value, ExecError>) -> String {
    match outcome {
        Err(ExecError::Raised(exception)) => exception.class_name().to_string(),
        other => panic!("expected a raised exception, got {other:?}"),
    }
}
