//! Source scanner
//!
//! A single left-to-right automaton that splits Lua/Luau source into spans
//! tagged `Code`, `StringLiteral` or `Comment`. Later passes only rewrite
//! inside the span kinds they own, so a `--` inside a string or a quote
//! inside a comment can never be misread.
//!
//! Recognised forms:
//! - short strings `"..."` and `'...'` with backslash escapes
//! - Luau interpolated strings `` `...` ``
//! - long strings `[[...]]`, `[==[...]==]`
//! - line comments `-- ...` (the newline stays in the following code span)
//! - block comments `--[[...]]`, `--[=[...]=]`

use std::ops::Range;

use crate::error::{ObfuscateError, Result};

/// Syntactic role of a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanKind {
    Code,
    StringLiteral,
    Comment,
}

/// A contiguous region of source text
///
/// `start`/`end` are byte offsets into the original source. Spans created by
/// later passes keep the range of the text they replaced (or an empty range
/// at their insertion point).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub kind: SpanKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(kind: SpanKind, text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            start,
            end,
        }
    }

    /// Synthesized code at a position in the original source
    pub fn code_at(text: impl Into<String>, at: usize) -> Self {
        Self::new(SpanKind::Code, text, at, at)
    }

    pub fn is_code(&self) -> bool {
        self.kind == SpanKind::Code
    }
}

/// Concatenate span texts in order
pub fn render(spans: &[Span]) -> String {
    let mut out = String::with_capacity(spans.iter().map(|s| s.text.len()).sum());
    for span in spans {
        out.push_str(&span.text);
    }
    out
}

/// Split source text into code, string and comment spans
///
/// Concatenating the `text` of the returned spans yields `source` exactly.
pub fn scan(source: &str) -> Result<Vec<Span>> {
    let bytes = source.as_bytes();
    let mut spans = Vec::new();
    let mut code_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let (kind, end) = match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                let end = match long_bracket_level(bytes, i + 2) {
                    Some(level) => find_long_close(bytes, i + 2 + level + 2, level)
                        .ok_or(ObfuscateError::UnterminatedComment { offset: i })?,
                    None => line_end(bytes, i),
                };
                (SpanKind::Comment, end)
            }
            b'"' | b'\'' | b'`' => (SpanKind::StringLiteral, short_string_end(bytes, i)?),
            b'[' => match long_bracket_level(bytes, i) {
                Some(level) => {
                    let end = find_long_close(bytes, i + level + 2, level)
                        .ok_or(ObfuscateError::UnterminatedString { offset: i })?;
                    (SpanKind::StringLiteral, end)
                }
                None => {
                    i += 1;
                    continue;
                }
            },
            _ => {
                i += 1;
                continue;
            }
        };

        if code_start < i {
            spans.push(Span::new(SpanKind::Code, &source[code_start..i], code_start, i));
        }
        spans.push(Span::new(kind, &source[i..end], i, end));
        i = end;
        code_start = end;
    }

    if code_start < bytes.len() {
        spans.push(Span::new(
            SpanKind::Code,
            &source[code_start..],
            code_start,
            bytes.len(),
        ));
    }

    Ok(spans)
}

/// If `pos` opens a long bracket (`[`, `=`*, `[`), return its level
pub(crate) fn long_bracket_level(bytes: &[u8], pos: usize) -> Option<usize> {
    if bytes.get(pos) != Some(&b'[') {
        return None;
    }
    let mut level = 0;
    while bytes.get(pos + 1 + level) == Some(&b'=') {
        level += 1;
    }
    (bytes.get(pos + 1 + level) == Some(&b'[')).then_some(level)
}

/// Offset just past the `]=*]` closing a long bracket of `level`
fn find_long_close(bytes: &[u8], from: usize, level: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b']' {
            let mut j = i + 1;
            let mut eq = 0;
            while bytes.get(j) == Some(&b'=') {
                eq += 1;
                j += 1;
            }
            if eq == level && bytes.get(j) == Some(&b']') {
                return Some(j + 1);
            }
            i = j;
        } else {
            i += 1;
        }
    }
    None
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| from + p)
}

fn short_string_end(bytes: &[u8], start: usize) -> Result<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => break,
            b if b == quote => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(ObfuscateError::UnterminatedString { offset: start })
}

/// Byte ranges of the code inside the `{...}` holes of an interpolated
/// string literal
///
/// Quoted strings nested in a hole are left out of the ranges. Empty for
/// any literal that does not start with a backtick.
pub fn interpolation_holes(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut holes = Vec::new();
    if bytes.first() != Some(&b'`') {
        return holes;
    }

    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'{' => {
                i += 1;
                let mut start = i;
                let mut depth = 0usize;
                while i < bytes.len() {
                    match bytes[i] {
                        b'{' => depth += 1,
                        b'}' if depth == 0 => break,
                        b'}' => depth -= 1,
                        quote @ (b'"' | b'\'') => {
                            if start < i {
                                holes.push(start..i);
                            }
                            i += 1;
                            while i < bytes.len() && bytes[i] != quote {
                                i += if bytes[i] == b'\\' { 2 } else { 1 };
                            }
                            start = (i + 1).min(bytes.len());
                        }
                        _ => {}
                    }
                    i += 1;
                }
                let end = i.min(bytes.len());
                if start < end {
                    holes.push(start..end);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    holes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(spans: &[Span]) -> Vec<SpanKind> {
        spans.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn test_reconstruction_is_exact() {
        let sources = [
            "",
            "local x = 1",
            "print(\"a\" .. 'b') -- done\n",
            "local s = [[multi\nline]] --[==[ block\n]] ]==] return s",
            "local t = `hello {name}`\n",
            "x = a[b[1]]",
        ];
        for source in sources {
            let spans = scan(source).unwrap();
            assert_eq!(render(&spans), source);
            let mut pos = 0;
            for span in &spans {
                assert_eq!(span.start, pos);
                assert_eq!(&source[span.start..span.end], span.text);
                pos = span.end;
            }
            assert_eq!(pos, source.len());
        }
    }

    #[test]
    fn test_dashes_inside_string_are_not_comment() {
        let spans = scan(r#"local s = "hello -- not a comment""#).unwrap();
        assert_eq!(kinds(&spans), vec![SpanKind::Code, SpanKind::StringLiteral]);
        assert_eq!(spans[1].text, r#""hello -- not a comment""#);
    }

    #[test]
    fn test_quote_inside_comment_is_not_string() {
        let spans = scan("x = 1 -- it's fine\ny = 2").unwrap();
        assert_eq!(
            kinds(&spans),
            vec![SpanKind::Code, SpanKind::Comment, SpanKind::Code]
        );
        assert_eq!(spans[1].text, "-- it's fine");
        assert_eq!(spans[2].text, "\ny = 2");
    }

    #[test]
    fn test_escaped_quote_does_not_close() {
        let spans = scan(r#"s = "say \"hi\"" t = 'it\'s'"#).unwrap();
        let strings: Vec<_> = spans
            .iter()
            .filter(|s| s.kind == SpanKind::StringLiteral)
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(strings, vec![r#""say \"hi\"""#, r#"'it\'s'"#]);
    }

    #[test]
    fn test_escaped_backslash_before_quote() {
        let spans = scan(r#"s = "dir\\" .. x"#).unwrap();
        assert_eq!(spans[1].text, r#""dir\\""#);
        assert_eq!(spans[2].text, " .. x");
    }

    #[test]
    fn test_block_comment_levels() {
        let spans = scan("--[=[ a ]] b ]=]x").unwrap();
        assert_eq!(spans[0].kind, SpanKind::Comment);
        assert_eq!(spans[0].text, "--[=[ a ]] b ]=]");
        assert_eq!(spans[1].text, "x");
    }

    #[test]
    fn test_long_string_is_string_literal() {
        let spans = scan("s = [[ -- \"x\" ]]").unwrap();
        assert_eq!(kinds(&spans), vec![SpanKind::Code, SpanKind::StringLiteral]);
    }

    #[test]
    fn test_unterminated_string() {
        let err = scan("local s = \"oops").unwrap_err();
        assert!(matches!(err, ObfuscateError::UnterminatedString { offset: 10 }));
        assert!(scan("local s = 'line\nbreak'").is_err());
    }

    #[test]
    fn test_unterminated_long_forms() {
        assert!(matches!(
            scan("--[[ never closed").unwrap_err(),
            ObfuscateError::UnterminatedComment { offset: 0 }
        ));
        assert!(matches!(
            scan("x = [==[ open ]]").unwrap_err(),
            ObfuscateError::UnterminatedString { offset: 4 }
        ));
    }

    #[test]
    fn test_non_ascii_content() {
        let source = "local s = \"héllo ✓\" -- ünïcode\n";
        assert_eq!(render(&scan(source).unwrap()), source);
    }

    #[test]
    fn test_interpolation_holes() {
        let text = "`hi {name}, {#items} \\{not} {f(\"{x}\", y)}`";
        let holes: Vec<&str> = interpolation_holes(text).into_iter().map(|r| &text[r]).collect();
        assert_eq!(holes, vec!["name", "#items", "f(", ", y)"]);

        assert_eq!(interpolation_holes("`{ {a = 1} }`").len(), 1);
        assert!(interpolation_holes("\"{name}\"").is_empty());
        assert!(interpolation_holes("[[{name}]]").is_empty());
    }
}
