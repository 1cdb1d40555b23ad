// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Classifies submitted code as WAT text or an encoded binary module.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use wasmparser::{Encoding, Parser, Payload};

use crate::enclave::template::skip_leading_trivia;
use crate::errors::{ExecutionError, ExecutionResult};

/// WASM magic bytes: "\0asm"
const WASM_MAGIC: &[u8] = b"\0asm";

#[derive(Debug, Clone, PartialEq)]
pub enum ModuleSource {
    /// WAT text, possibly a template.
    Text(String),
    /// Already-compiled module bytes.
    Binary { bytes: Vec<u8>, encoding: BinaryEncoding },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryEncoding {
    Base64,
    Hex,
}

impl BinaryEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base64 => "base64",
            Self::Hex => "hex",
        }
    }
}

/// WAT starts with a paren, once leading comments are skipped, and mentions a
/// module or function.
pub fn is_wat_text(code: &str) -> bool {
    skip_leading_trivia(code).starts_with('(') && (code.contains("module") || code.contains("func"))
}

pub fn classify(code: &str) -> ExecutionResult<ModuleSource> {
    if is_wat_text(code) {
        return Ok(ModuleSource::Text(code.to_string()));
    }
    let (bytes, encoding) = decode_binary(code)?;
    ensure_core_module(&bytes)?;
    Ok(ModuleSource::Binary { bytes, encoding })
}

/// Base64 first, then hex. Whitespace anywhere in the input is ignored.
pub fn decode_binary(encoded: &str) -> ExecutionResult<(Vec<u8>, BinaryEncoding)> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(ExecutionError::InvalidBinaryEncoding(
            "empty module source".to_string(),
        ));
    }

    // Hex digits are also valid base64, so prefer whichever decoding yields
    // a WASM header.
    let from_base64 = STANDARD.decode(&cleaned);
    if let Ok(bytes) = &from_base64 {
        if bytes.starts_with(WASM_MAGIC) {
            return Ok((bytes.clone(), BinaryEncoding::Base64));
        }
    }
    if let Some(bytes) = decode_hex(&cleaned) {
        if from_base64.is_err() || bytes.starts_with(WASM_MAGIC) {
            return Ok((bytes, BinaryEncoding::Hex));
        }
    }

    from_base64
        .map(|bytes| (bytes, BinaryEncoding::Base64))
        .map_err(|e| ExecutionError::InvalidBinaryEncoding(e.to_string()))
}

fn decode_hex(cleaned: &str) -> Option<Vec<u8>> {
    if cleaned.len() % 2 != 0 || !cleaned.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    cleaned
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}

/// Rejects component-model binaries; only core modules can be run.
fn ensure_core_module(bytes: &[u8]) -> ExecutionResult<()> {
    let header = Parser::new(0).parse_all(bytes).next();
    match header {
        Some(Ok(Payload::Version {
            encoding: Encoding::Module,
            ..
        })) => Ok(()),
        Some(Ok(Payload::Version {
            encoding: Encoding::Component,
            ..
        })) => Err(ExecutionError::InvalidModule(
            "component binaries are not supported".to_string(),
        )),
        Some(Err(e)) => Err(ExecutionError::InvalidModule(e.to_string())),
        _ => Err(ExecutionError::InvalidModule(
            "missing WASM header".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_MODULE: [u8; 8] = [0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];

    #[test]
    fn test_detects_wat_text() {
        assert!(is_wat_text("(module)"));
        assert!(is_wat_text("  \n(module (func))"));
        assert!(is_wat_text("(func $f)"));
        assert!(!is_wat_text("AGFzbQEAAAA="));
        assert!(!is_wat_text("(just parens)"));
    }

    #[test]
    fn test_detects_wat_after_leading_comments() {
        assert!(is_wat_text(";; a template\n(module)"));
        assert!(is_wat_text("(; header ;)\n  ;; more\n(module (func))"));
        assert!(matches!(
            classify(";; greeting\n(module)"),
            Ok(ModuleSource::Text(_))
        ));
    }

    #[test]
    fn test_decodes_base64_module() {
        let source = classify("AGFz bQEA\nAAA=").unwrap();
        assert_eq!(
            source,
            ModuleSource::Binary {
                bytes: EMPTY_MODULE.to_vec(),
                encoding: BinaryEncoding::Base64
            }
        );
    }

    #[test]
    fn test_falls_back_to_hex() {
        let (bytes, encoding) = decode_binary("0061736d01000000").unwrap();
        assert_eq!(bytes, EMPTY_MODULE);
        assert_eq!(encoding, BinaryEncoding::Hex);
    }

    #[test]
    fn test_undecodable_input() {
        assert!(matches!(
            decode_binary("not base64 or hex!"),
            Err(ExecutionError::InvalidBinaryEncoding(_))
        ));
        assert!(matches!(
            decode_binary("   "),
            Err(ExecutionError::InvalidBinaryEncoding(_))
        ));
    }

    #[test]
    fn test_decoded_garbage_is_not_a_module() {
        // "aGVsbG8=" is base64 for "hello"
        assert!(matches!(
            classify("aGVsbG8="),
            Err(ExecutionError::InvalidModule(_))
        ));
    }

    #[test]
    fn test_component_binary_rejected() {
        let component = [0x00, 0x61, 0x73, 0x6D, 0x0d, 0x00, 0x01, 0x00];
        let encoded = STANDARD.encode(component);
        assert!(matches!(
            classify(&encoded),
            Err(ExecutionError::InvalidModule(_))
        ));
    }
}
