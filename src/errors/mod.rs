// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod codec;
mod config;
mod execution;
mod relay;

pub use codec::CodecError;
pub use config::ConfigError;
pub use execution::{ExecutionError, ExecutionResult};
pub use relay::RelayError;
