// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the enclave's compile and execute pipeline.

use std::fmt::{Display, Formatter};
use std::time::Duration;

/// A request reached the pipeline.
///
/// # Log Level
/// `info!`
///
/// # Example
/// ```
/// use wasm_enclave::observability::messages::enclave::RequestReceived;
///
/// let msg = RequestReceived {
///     function: "square",
///     args: &[7],
///     code_len: 120,
///     secret_count: 0,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct RequestReceived<'a> {
    pub function: &'a str,
    pub args: &'a [i32],
    pub code_len: usize,
    pub secret_count: usize,
}

impl Display for RequestReceived<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Received execution request: function={}, args={:?}, code={} bytes, secrets={}",
            self.function, self.args, self.code_len, self.secret_count
        )
    }
}

/// The source was WAT and has been compiled.
///
/// # Log Level
/// `info!`
pub struct ModuleCompiled<'a> {
    pub compiler: &'a str,
    pub wasm_size: usize,
}

impl Display for ModuleCompiled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Compiled WAT with {} to {} bytes of WASM",
            self.compiler, self.wasm_size
        )
    }
}

/// The source was an encoded binary and has been decoded.
///
/// # Log Level
/// `info!`
pub struct BinaryDecoded<'a> {
    pub encoding: &'a str,
    pub wasm_size: usize,
}

impl Display for BinaryDecoded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Decoded {} bytes of WASM from {}",
            self.wasm_size, self.encoding
        )
    }
}

/// Secrets came with a binary module and cannot be injected.
///
/// # Log Level
/// `warn!`
pub struct SecretsIgnored {
    pub secret_count: usize,
}

impl Display for SecretsIgnored {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ignoring {} secret(s): binary modules are not templates",
            self.secret_count
        )
    }
}

/// A scratch file could not be removed.
///
/// # Log Level
/// `warn!` - the request outcome is unaffected
pub struct ScratchCleanupFailed<'a> {
    pub path: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ScratchCleanupFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to remove scratch file '{}': {}",
            self.path, self.error
        )
    }
}

/// The function returned a value.
///
/// # Log Level
/// `info!`
pub struct ExecutionCompleted<'a> {
    pub function: &'a str,
    pub args: &'a [i32],
    pub result: i32,
    pub duration: Duration,
}

impl Display for ExecutionCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "WASM execution success: {}({:?}) = {} in {:?}",
            self.function, self.args, self.result, self.duration
        )
    }
}

/// The pipeline failed at some stage.
///
/// # Log Level
/// `error!`
pub struct ExecutionFailed<'a> {
    pub function: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ExecutionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "WASM execution of '{}' failed: {}", self.function, self.error)
    }
}
