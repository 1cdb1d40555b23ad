// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Secret injection for WAT templates.
//!
//! Each placeholder import whose name has a secret is rewritten in place to a
//! constant-initialized global:
//!
//! ```text
//! (import "env" "SECRET_KEY" (global $key i32))
//!   => (global $key i32 (i32.const 42))
//! ```
//!
//! Placeholders without a secret are left alone and surface later as
//! unresolved imports. Secrets that match no placeholder are ignored.

mod coercion;
mod scanner;

pub use coercion::{coerce, mask_secret, string_hash, NumericKind};
pub use scanner::{find_placeholders, Placeholder};
pub(crate) use scanner::skip_leading_trivia;

use std::collections::HashMap;

use crate::errors::ExecutionResult;
use crate::observability::messages::template::{SecretInjected, SecretMissing, TemplateProcessed};

/// A placeholder paired with the literal that replaces it. Lives only for the
/// duration of one `inject` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretBinding {
    pub placeholder: Placeholder,
    pub kind: NumericKind,
    pub literal: String,
}

impl SecretBinding {
    /// The inline global definition that takes the import's place.
    pub fn definition(&self) -> String {
        format!(
            "(global ${} {} ({}.const {}))",
            self.placeholder.ident, self.kind, self.kind, self.literal
        )
    }
}

/// Resolves every placeholder that has a secret. Placeholders in the result
/// are in source order and never overlap.
pub fn resolve_bindings(
    source: &str,
    secrets: &HashMap<String, String>,
) -> ExecutionResult<Vec<SecretBinding>> {
    let mut bindings = Vec::new();

    for placeholder in find_placeholders(source) {
        let Some(secret) = secrets.get(&placeholder.name) else {
            tracing::warn!("{}", SecretMissing { name: &placeholder.name });
            continue;
        };

        let kind: NumericKind = placeholder.kind.parse()?;
        let literal = coerce(&placeholder.name, secret, kind)?;
        tracing::debug!(
            "{}",
            SecretInjected {
                name: &placeholder.name,
                kind: kind.as_str(),
                masked_value: &mask_secret(secret),
            }
        );
        bindings.push(SecretBinding {
            placeholder,
            kind,
            literal,
        });
    }

    Ok(bindings)
}

/// Rewrites `source` with every resolvable placeholder replaced.
///
/// Replacement is positional, so textually identical declarations are each
/// replaced exactly once and unrelated text is copied through untouched.
pub fn inject(source: &str, secrets: &HashMap<String, String>) -> ExecutionResult<String> {
    let bindings = resolve_bindings(source, secrets)?;
    if bindings.is_empty() {
        return Ok(source.to_string());
    }

    let mut output = String::with_capacity(source.len());
    let mut copied_to = 0;
    for binding in &bindings {
        output.push_str(&source[copied_to..binding.placeholder.span.start]);
        output.push_str(&binding.definition());
        copied_to = binding.placeholder.span.end;
    }
    output.push_str(&source[copied_to..]);

    tracing::info!(
        "{}",
        TemplateProcessed {
            injected: bindings.len(),
            original_len: source.len(),
            processed_len: output.len(),
        }
    );

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExecutionError;

    fn secrets(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_injects_numeric_secret() {
        let source = r#"(module (import "env" "SECRET_KEY" (global $key i32)) (func (export "get") (result i32) global.get $key))"#;
        let output = inject(source, &secrets(&[("SECRET_KEY", "5")])).unwrap();
        assert_eq!(
            output,
            r#"(module (global $key i32 (i32.const 5)) (func (export "get") (result i32) global.get $key))"#
        );
    }

    #[test]
    fn test_injection_is_deterministic() {
        let source = r#"(module (import "env" "API_KEY" (global $api i32)) (import "env" "N" (global $n i64)))"#;
        let values = secrets(&[("API_KEY", "sk-abc123def456"), ("N", "hello")]);
        assert_eq!(inject(source, &values).unwrap(), inject(source, &values).unwrap());
    }

    #[test]
    fn test_missing_secret_leaves_declaration() {
        let source = r#"(module (import "env" "DB_PASSWORD" (global $pw i32)))"#;
        assert_eq!(inject(source, &secrets(&[("OTHER", "1")])).unwrap(), source);
    }

    #[test]
    fn test_non_template_passes_through() {
        let source = r#"(module (func (export "square") (param i32) (result i32) local.get 0 local.get 0 i32.mul))"#;
        assert_eq!(inject(source, &secrets(&[("K", "1")])).unwrap(), source);
    }

    #[test]
    fn test_repeated_identical_declarations_each_replaced_once() {
        let decl = r#"(import "env" "K" (global $k i32))"#;
        let source = format!("(module {decl}\n{decl})");
        let output = inject(&source, &secrets(&[("K", "9")])).unwrap();
        assert_eq!(
            output,
            "(module (global $k i32 (i32.const 9))\n(global $k i32 (i32.const 9)))"
        );
    }

    #[test]
    fn test_mixed_resolved_and_unresolved() {
        let source = r#"(module (import "env" "A" (global $a i32)) (import "env" "B" (global $b f32)))"#;
        let output = inject(source, &secrets(&[("B", "1.5")])).unwrap();
        assert_eq!(
            output,
            r#"(module (import "env" "A" (global $a i32)) (global $b f32 (f32.const 1.5)))"#
        );
    }

    #[test]
    fn test_float_secret_without_fallback_fails() {
        let source = r#"(module (import "env" "RATE" (global $r f64)))"#;
        let error = inject(source, &secrets(&[("RATE", "fast")])).unwrap_err();
        assert!(matches!(error, ExecutionError::UnsupportedSecretType { .. }));
    }

    #[test]
    fn test_unsupported_kind_with_secret_fails() {
        let source = r#"(module (import "env" "V" (global $v v128)))"#;
        let error = inject(source, &secrets(&[("V", "1")])).unwrap_err();
        assert_eq!(error, ExecutionError::UnsupportedWasmType("v128".to_string()));
    }
}
