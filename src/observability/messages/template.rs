// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for secret injection events.

use std::fmt::{Display, Formatter};

/// A placeholder was bound to a secret.
///
/// # Log Level
/// `debug!` - carries a masked value only
pub struct SecretInjected<'a> {
    pub name: &'a str,
    pub kind: &'a str,
    pub masked_value: &'a str,
}

impl Display for SecretInjected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Injecting secret '{}' as {} (value {})",
            self.name, self.kind, self.masked_value
        )
    }
}

/// A placeholder has no secret and stays an import.
///
/// # Log Level
/// `warn!`
pub struct SecretMissing<'a> {
    pub name: &'a str,
}

impl Display for SecretMissing<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Secret '{}' not provided, keeping import", self.name)
    }
}

/// Template processing finished.
///
/// # Log Level
/// `info!`
///
/// # Example
/// ```
/// use wasm_enclave::observability::messages::template::TemplateProcessed;
///
/// let msg = TemplateProcessed {
///     injected: 2,
///     original_len: 180,
///     processed_len: 176,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct TemplateProcessed {
    pub injected: usize,
    pub original_len: usize,
    pub processed_len: usize,
}

impl Display for TemplateProcessed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Injected {} secret(s): {} -> {} bytes of WAT",
            self.injected, self.original_len, self.processed_len
        )
    }
}
