// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Turning secret strings into WAT numeric literals.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::errors::{ExecutionError, ExecutionResult};

/// The four scalar types a placeholder global may be declared with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NumericKind {
    I32,
    I64,
    F32,
    F64,
}

impl NumericKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl Display for NumericKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NumericKind {
    type Err = ExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i32" => Ok(Self::I32),
            "i64" => Ok(Self::I64),
            "f32" => Ok(Self::F32),
            "f64" => Ok(Self::F64),
            other => Err(ExecutionError::UnsupportedWasmType(other.to_string())),
        }
    }
}

/// Renders `secret` as a literal suitable for `(<kind>.const <literal>)`.
///
/// Integers that parse in range are used as-is; anything else falls back to
/// [`string_hash`]. Floats have no fallback.
pub fn coerce(name: &str, secret: &str, kind: NumericKind) -> ExecutionResult<String> {
    match kind {
        NumericKind::I32 => Ok(match secret.parse::<i32>() {
            Ok(value) => value.to_string(),
            Err(_) => string_hash(secret).to_string(),
        }),
        NumericKind::I64 => Ok(match secret.parse::<i64>() {
            Ok(value) => value.to_string(),
            Err(_) => i64::from(string_hash(secret)).to_string(),
        }),
        NumericKind::F32 => {
            let value = secret
                .trim()
                .parse::<f32>()
                .map_err(|_| unsupported(name, kind))?;
            if value.is_infinite() && !names_infinity(secret) {
                return Err(unsupported(name, kind));
            }
            Ok(float_literal(value.is_nan(), value.is_infinite(), value.is_sign_negative(), || {
                format!("{:?}", value)
            }))
        }
        NumericKind::F64 => {
            let value = secret
                .trim()
                .parse::<f64>()
                .map_err(|_| unsupported(name, kind))?;
            if value.is_infinite() && !names_infinity(secret) {
                return Err(unsupported(name, kind));
            }
            Ok(float_literal(value.is_nan(), value.is_infinite(), value.is_sign_negative(), || {
                format!("{:?}", value)
            }))
        }
    }
}

/// `hash = hash * 31 + c` over the string's scalar values, in wrapping 32-bit
/// arithmetic, then made non-negative. `i32::MIN` has no positive counterpart
/// and maps to `i32::MAX`.
pub fn string_hash(s: &str) -> i32 {
    let hash = s
        .chars()
        .fold(0i32, |hash, c| hash.wrapping_mul(31).wrapping_add(c as i32));
    if hash < 0 {
        hash.checked_neg().unwrap_or(i32::MAX)
    } else {
        hash
    }
}

/// Masks a secret for log output.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", head, tail)
}

fn unsupported(name: &str, kind: NumericKind) -> ExecutionError {
    ExecutionError::UnsupportedSecretType {
        name: name.to_string(),
        kind: kind.to_string(),
    }
}

fn names_infinity(secret: &str) -> bool {
    let lowered = secret.trim().trim_start_matches(['+', '-']).to_ascii_lowercase();
    lowered == "inf" || lowered == "infinity"
}

fn float_literal(nan: bool, infinite: bool, negative: bool, finite: impl FnOnce() -> String) -> String {
    match (nan, infinite, negative) {
        (true, _, _) => "nan".to_string(),
        (false, true, true) => "-inf".to_string(),
        (false, true, false) => "inf".to_string(),
        _ => finite(),
    }
}
