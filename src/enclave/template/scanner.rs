// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Locates placeholder imports in WAT source.
//!
//! A placeholder is an import of a global with a bare scalar type:
//!
//! ```text
//! (import "env" "API_KEY" (global $api_key i32))
//! ```
//!
//! The scanner walks the text once, stepping over comments and string
//! literals, and reports each placeholder with its byte span so the caller can
//! splice replacements by position instead of searching for substrings.

use std::ops::Range;

/// One placeholder import found in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Byte range of the whole `(import ...)` form.
    pub span: Range<usize>,
    /// The import's module string (usually `env`).
    pub module: String,
    /// The import's field string; this is the secret name.
    pub name: String,
    /// Global identifier without the leading `$`.
    pub ident: String,
    /// The declared type token, not yet validated.
    pub kind: String,
}

/// Returns every placeholder in source order. Never fails: text that does not
/// have the exact placeholder shape is simply not reported.
pub fn find_placeholders(source: &str) -> Vec<Placeholder> {
    let bytes = source.as_bytes();
    let mut found = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b';' if bytes.get(pos + 1) == Some(&b';') => {
                pos = skip_line_comment(bytes, pos);
            }
            b'(' if bytes.get(pos + 1) == Some(&b';') => {
                pos = skip_block_comment(bytes, pos);
            }
            b'"' => {
                pos = skip_string(bytes, pos).unwrap_or(bytes.len());
            }
            b'(' => match parse_placeholder(source, pos) {
                Some(placeholder) => {
                    pos = placeholder.span.end;
                    found.push(placeholder);
                }
                None => pos += 1,
            },
            _ => pos += 1,
        }
    }

    found
}

/// The source with leading whitespace and comments removed.
pub(crate) fn skip_leading_trivia(source: &str) -> &str {
    let bytes = source.as_bytes();
    let mut pos = 0;
    loop {
        while bytes.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
            pos += 1;
        }
        match (bytes.get(pos), bytes.get(pos + 1)) {
            (Some(b';'), Some(b';')) => pos = skip_line_comment(bytes, pos),
            (Some(b'('), Some(b';')) => pos = skip_block_comment(bytes, pos),
            _ => return &source[pos..],
        }
    }
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|offset| start + offset + 1)
        .unwrap_or(bytes.len())
}

/// Block comments nest in WAT.
fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut pos = start;
    while pos < bytes.len() {
        if bytes[pos] == b'(' && bytes.get(pos + 1) == Some(&b';') {
            depth += 1;
            pos += 2;
        } else if bytes[pos] == b';' && bytes.get(pos + 1) == Some(&b')') {
            depth -= 1;
            pos += 2;
            if depth == 0 {
                return pos;
            }
        } else {
            pos += 1;
        }
    }
    bytes.len()
}

/// Returns the index just past the closing quote, or `None` if unterminated.
fn skip_string(bytes: &[u8], start: usize) -> Option<usize> {
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'"' => return Some(pos + 1),
            _ => pos += 1,
        }
    }
    None
}

/// Cursor over one candidate form. Every method returns `None` on mismatch.
struct Cursor<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn bytes(&self) -> &'a [u8] {
        self.source.as_bytes()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) -> usize {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn require_whitespace(&mut self) -> Option<()> {
        (self.skip_whitespace() > 0).then_some(())
    }

    fn expect_byte(&mut self, expected: u8) -> Option<()> {
        (self.peek()? == expected).then(|| self.pos += 1)
    }

    fn expect_keyword(&mut self, keyword: &str) -> Option<()> {
        let end = self.pos + keyword.len();
        if self.source.get(self.pos..end)? != keyword {
            return None;
        }
        self.pos = end;
        Some(())
    }

    fn string(&mut self) -> Option<String> {
        if self.peek()? != b'"' {
            return None;
        }
        let end = skip_string(self.bytes(), self.pos)?;
        let content = &self.source[self.pos + 1..end - 1];
        self.pos = end;
        Some(content.to_string())
    }

    /// Reads until whitespace or a paren.
    fn token(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| !b.is_ascii_whitespace() && b != b'(' && b != b')')
        {
            self.pos += 1;
        }
        (self.pos > start).then(|| &self.source[start..self.pos])
    }
}

fn parse_placeholder(source: &str, start: usize) -> Option<Placeholder> {
    let mut cursor = Cursor { source, pos: start };

    cursor.expect_byte(b'(')?;
    cursor.skip_whitespace();
    cursor.expect_keyword("import")?;
    cursor.require_whitespace()?;
    let module = cursor.string()?;
    cursor.require_whitespace()?;
    let name = cursor.string()?;
    cursor.require_whitespace()?;

    cursor.expect_byte(b'(')?;
    cursor.skip_whitespace();
    cursor.expect_keyword("global")?;
    cursor.require_whitespace()?;
    cursor.expect_byte(b'$')?;
    let ident = cursor.token()?.to_string();
    cursor.require_whitespace()?;
    let kind = cursor.token()?;
    if !kind.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return None;
    }
    let kind = kind.to_string();
    cursor.skip_whitespace();
    cursor.expect_byte(b')')?;
    cursor.skip_whitespace();
    cursor.expect_byte(b')')?;

    Some(Placeholder {
        span: start..cursor.pos,
        module,
        name,
        ident,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_single_placeholder_with_span() {
        let source = r#"(module (import "env" "SECRET_KEY" (global $key i32)) (func))"#;
        let found = find_placeholders(source);

        assert_eq!(found.len(), 1);
        let placeholder = &found[0];
        assert_eq!(placeholder.module, "env");
        assert_eq!(placeholder.name, "SECRET_KEY");
        assert_eq!(placeholder.ident, "key");
        assert_eq!(placeholder.kind, "i32");
        assert_eq!(
            &source[placeholder.span.clone()],
            r#"(import "env" "SECRET_KEY" (global $key i32))"#
        );
    }

    #[test]
    fn test_tolerates_multiline_whitespace() {
        let source = "(module\n  (import \"env\"\n     \"RATE\"\n     (global $rate f64 ) )\n)";
        let found = find_placeholders(source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, "f64");
    }

    #[test]
    fn test_identical_declarations_are_reported_separately() {
        let decl = r#"(import "env" "K" (global $k i32))"#;
        let source = format!("(module {decl} {decl})");
        let found = find_placeholders(&source);
        assert_eq!(found.len(), 2);
        assert!(found[0].span.end <= found[1].span.start);
    }

    #[test]
    fn test_ignores_function_imports_and_mutable_globals() {
        let source = r#"(module
            (import "env" "log" (func $log (param i32)))
            (import "env" "COUNTER" (global $c (mut i32))))"#;
        assert!(find_placeholders(source).is_empty());
    }

    #[test]
    fn test_ignores_comments_and_strings() {
        let source = r#"(module
            ;; (import "env" "A" (global $a i32))
            (; (import "env" "B" (global $b i32)) (; nested ;) ;)
            (data "(import \"env\" \"C\" (global $c i32))")
            (import "env" "D" (global $d i64)))"#;
        let found = find_placeholders(source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "D");
    }

    #[test]
    fn test_reports_unknown_kind_for_caller_to_reject() {
        let source = r#"(module (import "env" "V" (global $v v128)))"#;
        let found = find_placeholders(source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, "v128");
    }

    #[test]
    fn test_skip_leading_trivia() {
        let source = "  ;; header\n(; block (; nested ;) ;)\n\t(module)";
        assert_eq!(skip_leading_trivia(source), "(module)");
        assert_eq!(skip_leading_trivia(";; only a comment"), "");
        assert_eq!(skip_leading_trivia("AGFzbQEAAAA="), "AGFzbQEAAAA=");
    }

    #[test]
    fn test_unterminated_input_does_not_panic() {
        for source in ["(import \"env", "(module (; open", "\"open", "(import \"env\" \"K\" (global $"] {
            assert!(find_placeholders(source).is_empty());
        }
    }
}
