// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Everything that runs inside the enclave.
//!
//! A request flows `source::classify` -> `template::inject` ->
//! `compile::WatCompiler` -> `engine::ExecutionEngine`; `pipeline::Pipeline`
//! ties the stages together and is the executor's request handler.

pub mod compile;
pub mod engine;
pub mod pipeline;
pub mod source;
pub mod template;

pub use compile::{create_compiler, BuiltinCompiler, ExternalCompiler, WatCompiler};
pub use engine::ExecutionEngine;
pub use pipeline::Pipeline;
