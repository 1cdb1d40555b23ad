// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Execution Engine: runs one exported function of a closed core module.
//!
//! Every call compiles the module and instantiates it in a fresh `Store`, so
//! nothing a guest does survives into the next call. The shared `Engine` only
//! holds configuration.
//!
//! ## Wasmtime configuration
//! - `consume_fuel(true)`: bounds guest execution; running out is a trap
//! - `epoch_interruption(false)`: no spurious "interrupt" traps
//! - threads, SIMD, multi-memory, memory64 and the component model are off

use wasmtime::{Config, Engine, Instance, Module, Store, Val, ValType};

use crate::errors::{ExecutionError, ExecutionResult};

pub struct ExecutionEngine {
    engine: Engine,
    fuel: u64,
}

impl ExecutionEngine {
    pub fn new(fuel: u64) -> ExecutionResult<Self> {
        let mut config = Config::new();
        config.wasm_threads(false);
        config.wasm_simd(false);
        config.wasm_relaxed_simd(false);
        config.wasm_multi_memory(false);
        config.wasm_memory64(false);
        config.wasm_component_model(false);
        config.consume_fuel(true);
        config.epoch_interruption(false);

        let engine = Engine::new(&config)
            .map_err(|e| ExecutionError::Internal(format!("engine creation failed: {}", e)))?;

        Ok(Self { engine, fuel })
    }

    pub fn fuel(&self) -> u64 {
        self.fuel
    }

    /// Loads `wasm`, calls `function` with `args` and returns its single `i32`.
    pub fn run(&self, wasm: &[u8], function: &str, args: &[i32]) -> ExecutionResult<i32> {
        let module = Module::new(&self.engine, wasm)
            .map_err(|e| ExecutionError::InvalidModule(format!("{:#}", e)))?;

        let unresolved: Vec<String> = module
            .imports()
            .map(|import| format!("{}.{}", import.module(), import.name()))
            .collect();
        if !unresolved.is_empty() {
            return Err(ExecutionError::UnresolvedImports {
                missing: unresolved,
            });
        }

        let mut store = Store::new(&self.engine, ());
        store
            .set_fuel(self.fuel)
            .map_err(|e| ExecutionError::Internal(format!("failed to set fuel: {}", e)))?;

        // A start function may trap during instantiation.
        let instance = Instance::new(&mut store, &module, &[])
            .map_err(|e| ExecutionError::ExecutionTrap(format!("{:#}", e)))?;

        let export = instance
            .get_export(&mut store, function)
            .ok_or_else(|| ExecutionError::FunctionNotFound(function.to_string()))?;
        let func = export
            .into_func()
            .ok_or_else(|| ExecutionError::NotAFunction(function.to_string()))?;

        let ty = func.ty(&store);
        let params: Vec<ValType> = ty.params().collect();
        if params.len() != args.len() {
            return Err(ExecutionError::ArgumentMismatch {
                function: function.to_string(),
                expected: params.len(),
                provided: args.len(),
            });
        }
        if let Some((index, param)) = params
            .iter()
            .enumerate()
            .find(|(_, param)| !matches!(param, ValType::I32))
        {
            return Err(ExecutionError::UnsupportedWasmType(format!(
                "parameter {} of '{}' is {}",
                index, function, param
            )));
        }

        let results: Vec<ValType> = ty.results().collect();
        if results.len() != 1 || !matches!(results[0], ValType::I32) {
            return Err(ExecutionError::UnexpectedReturnType(describe_types(&results)));
        }

        let params: Vec<Val> = args.iter().map(|&arg| Val::I32(arg)).collect();
        let mut returned = [Val::I32(0)];
        func.call(&mut store, &params, &mut returned)
            .map_err(|e| ExecutionError::ExecutionTrap(format!("{:#}", e)))?;

        match returned[0] {
            Val::I32(value) => Ok(value),
            ref other => Err(ExecutionError::UnexpectedReturnType(format!("{:?}", other))),
        }
    }
}

fn describe_types(types: &[ValType]) -> String {
    let names: Vec<String> = types.iter().map(|ty| ty.to_string()).collect();
    format!("({})", names.join(", "))
}
