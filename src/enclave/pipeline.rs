// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The enclave's request pipeline: classify, inject, compile, execute.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ExecutorConfig;
use crate::enclave::compile::{create_compiler, WatCompiler};
use crate::enclave::engine::ExecutionEngine;
use crate::enclave::source::{classify, ModuleSource};
use crate::enclave::template::inject;
use crate::errors::{ExecutionError, ExecutionResult};
use crate::observability::messages::enclave::{
    BinaryDecoded, ExecutionCompleted, ExecutionFailed, ModuleCompiled, RequestReceived,
    SecretsIgnored,
};
use crate::protocol::{ExecutionRequest, ExecutionResponse};
use crate::traits::RequestHandler;

/// Cheap to clone; every clone shares one compiler and one engine.
#[derive(Clone)]
pub struct Pipeline {
    compiler: Arc<dyn WatCompiler>,
    engine: Arc<ExecutionEngine>,
}

impl Pipeline {
    pub fn new(compiler: Box<dyn WatCompiler>, engine: ExecutionEngine) -> Self {
        Self {
            compiler: Arc::from(compiler),
            engine: Arc::new(engine),
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> ExecutionResult<Self> {
        let engine = ExecutionEngine::new(config.fuel_level())?;
        Ok(Self::new(create_compiler(&config.compiler), engine))
    }

    /// Runs one request to completion on the calling thread.
    pub fn execute(&self, req: &ExecutionRequest) -> ExecutionResult<i32> {
        let wasm = match classify(&req.code)? {
            ModuleSource::Text(text) => {
                let processed = inject(&text, &req.secrets)?;
                let wasm = self.compiler.compile(&processed)?;
                tracing::info!(
                    "{}",
                    ModuleCompiled {
                        compiler: self.compiler.name(),
                        wasm_size: wasm.len(),
                    }
                );
                wasm
            }
            ModuleSource::Binary { bytes, encoding } => {
                tracing::info!(
                    "{}",
                    BinaryDecoded {
                        encoding: encoding.as_str(),
                        wasm_size: bytes.len(),
                    }
                );
                if !req.secrets.is_empty() {
                    tracing::warn!(
                        "{}",
                        SecretsIgnored {
                            secret_count: req.secrets.len(),
                        }
                    );
                }
                bytes
            }
        };

        self.engine.run(&wasm, &req.function, &req.args)
    }
}

#[async_trait]
impl RequestHandler for Pipeline {
    async fn handle(&self, req: ExecutionRequest) -> ExecutionResponse {
        tracing::info!(
            "{}",
            RequestReceived {
                function: &req.function,
                args: &req.args,
                code_len: req.code.len(),
                secret_count: req.secrets.len(),
            }
        );

        let id = req.id;
        let function = req.function.clone();
        let pipeline = self.clone();
        let started = Instant::now();

        // Compilation and execution block; keep them off the reactor.
        let outcome = tokio::task::spawn_blocking(move || {
            let result = pipeline.execute(&req);
            (req, result)
        })
        .await;

        let (req, result) = match outcome {
            Ok(done) => done,
            Err(join_error) => {
                let error = ExecutionError::Internal(join_error.to_string());
                tracing::error!(
                    "{}",
                    ExecutionFailed {
                        function: &function,
                        error: &error,
                    }
                );
                return ExecutionResponse::failure(format!("WASM execution failed: {}", error))
                    .with_id(id);
            }
        };

        match result {
            Ok(value) => {
                tracing::info!(
                    "{}",
                    ExecutionCompleted {
                        function: &req.function,
                        args: &req.args,
                        result: value,
                        duration: started.elapsed(),
                    }
                );
                ExecutionResponse::success(value).with_id(id)
            }
            Err(error) => {
                tracing::error!(
                    "{}",
                    ExecutionFailed {
                        function: &req.function,
                        error: &error,
                    }
                );
                ExecutionResponse::failure(format!("WASM execution failed: {}", error)).with_id(id)
            }
        }
    }

    fn name(&self) -> &'static str {
        "enclave-pipeline"
    }
}
