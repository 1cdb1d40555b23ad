// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A request to run one exported function of a (possibly templated) module.
///
/// `code` is either WAT text, which may contain placeholder imports, or an
/// encoded binary module (base64 or hex). The older field names `wasm_code`
/// and `function_name` are accepted on input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    #[serde(alias = "wasm_code")]
    pub code: String,
    #[serde(alias = "function_name")]
    pub function: String,
    #[serde(default)]
    pub args: Vec<i32>,
    #[serde(default)]
    pub secrets: HashMap<String, String>,
    /// Correlation id, set by callers that multiplex a connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, function: impl Into<String>, args: Vec<i32>) -> Self {
        Self {
            code: code.into(),
            function: function.into(),
            args,
            secrets: HashMap::new(),
            id: None,
        }
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }

    pub fn with_secrets(mut self, secrets: HashMap<String, String>) -> Self {
        self.secrets.extend(secrets);
        self
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}

/// Outcome of one request. `error` empty means `result` is meaningful.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    #[serde(default)]
    pub result: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl ExecutionResponse {
    pub fn success(result: i32) -> Self {
        Self {
            result,
            error: String::new(),
            id: None,
        }
    }

    /// A failed outcome. `result` is always zero so a failure can't pass for a value.
    pub fn failure(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error.push_str("unknown error");
        }
        Self {
            result: 0,
            error,
            id: None,
        }
    }

    pub fn with_id(mut self, id: Option<u64>) -> Self {
        self.id = id;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }

    pub fn outcome(&self) -> Result<i32, &str> {
        if self.error.is_empty() {
            Ok(self.result)
        } else {
            Err(&self.error)
        }
    }
}
