// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Request-level failures of the enclave pipeline.
//!
//! Every variant here is recoverable: it ends up in `ExecutionResponse.error`
//! and never tears down the connection that carried the request.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// The module still declares imports after template processing.
    #[error("unresolved imports (missing secrets?): {}", .missing.join(", "))]
    UnresolvedImports { missing: Vec<String> },

    #[error("function '{0}' not found in WASM module")]
    FunctionNotFound(String),

    #[error("'{0}' is not a function")]
    NotAFunction(String),

    #[error("function '{function}' expects {expected} i32 argument(s), got {provided}")]
    ArgumentMismatch {
        function: String,
        expected: usize,
        provided: usize,
    },

    /// The guest trapped (unreachable, overflow, out of fuel, ...).
    #[error("WASM function call failed: {0}")]
    ExecutionTrap(String),

    #[error("unexpected return type from WASM function: {0}")]
    UnexpectedReturnType(String),

    #[error("cannot convert secret '{name}' to {kind}")]
    UnsupportedSecretType { name: String, kind: String },

    #[error("unsupported WASM type: {0}")]
    UnsupportedWasmType(String),

    #[error("failed to compile WAT to WASM: {0}")]
    CompileError(String),

    #[error("failed to decode WASM bytecode: {0}")]
    InvalidBinaryEncoding(String),

    #[error("failed to create WASM module: {0}")]
    InvalidModule(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;
