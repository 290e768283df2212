//! String table extraction
//!
//! Every constant string literal is moved into a single table declared
//! before the script body and replaced at its use site by `<table>[index]`.
//! Above the weakest preset each entry is stored XOR-encrypted with its own
//! key and decoded once when the table is built:
//!
//! ```lua
//! local _Dk = function(b, k) ... end
//! local _Tq = {[0] = _Dk({63, 18, 27, 27, 24}, 119)}
//! print(_Tq[0])
//! ```
//!
//! Interpolated strings (`` `...` ``) are not constants and stay in place.

use rand::Rng;

use crate::lexer::{is_keyword, tokenize, TokenKind};
use crate::names::Namespace;
use crate::request::LanguageVariant;
use crate::scanner::{long_bracket_level, Span, SpanKind};

/// How a literal was delimited in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `'...'` or `"..."`
    Quote(char),
    /// `[[...]]` with `level` equals signs
    Long { level: usize },
}

/// One extracted literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTableEntry {
    /// Key of the entry in the emitted table
    pub index: u32,
    /// Literal text between the delimiters, escapes untouched
    pub raw_content: String,
    pub delimiter: Delimiter,
    pub encryption_key: Option<u8>,
}

impl StringTableEntry {
    pub fn quote_char(&self) -> Option<char> {
        match self.delimiter {
            Delimiter::Quote(q) => Some(q),
            Delimiter::Long { .. } => None,
        }
    }

    /// Bytes the literal evaluates to at runtime
    pub fn decoded_bytes(&self) -> Vec<u8> {
        match self.delimiter {
            Delimiter::Quote(_) => unescape(&self.raw_content),
            Delimiter::Long { .. } => {
                let content = self.raw_content.as_str();
                let content = content
                    .strip_prefix("\r\n")
                    .or_else(|| content.strip_prefix('\n'))
                    .unwrap_or(content);
                content.as_bytes().to_vec()
            }
        }
    }

    /// Encrypted byte array stored in the table (plain bytes when unencrypted)
    pub fn payload(&self) -> Vec<u8> {
        let key = self.encryption_key.unwrap_or(0);
        self.decoded_bytes().iter().map(|b| b ^ key).collect()
    }

    /// The literal re-quoted exactly as it appeared
    pub fn literal(&self) -> String {
        match self.delimiter {
            Delimiter::Quote(q) => format!("{q}{}{q}", self.raw_content),
            Delimiter::Long { level } => {
                let eq = "=".repeat(level);
                format!("[{eq}[{}]{eq}]", self.raw_content)
            }
        }
    }

    /// Value expression for this entry's slot
    fn value_expression(&self, decoder: Option<&str>) -> String {
        match (self.encryption_key, decoder) {
            (Some(key), Some(decoder)) => {
                let bytes: Vec<String> = self.payload().iter().map(|b| b.to_string()).collect();
                format!("{}({{{}}}, {})", decoder, bytes.join(", "), key)
            }
            _ => self.literal(),
        }
    }
}

/// The extracted table for one invocation
#[derive(Debug, Clone)]
pub struct StringTable {
    pub name: String,
    /// Decoder function name, present only when entries are encrypted
    pub decoder: Option<String>,
    pub variant: LanguageVariant,
    pub entries: Vec<StringTableEntry>,
}

impl StringTable {
    /// Lua declaration of the decoder (if any) and the table itself
    pub fn declaration(&self) -> String {
        let mut out = String::new();
        if let Some(decoder) = &self.decoder {
            out.push_str(&decoder_function(decoder, self.variant));
            out.push('\n');
        }
        let slots: Vec<String> = self
            .entries
            .iter()
            .map(|e| format!("[{}] = {}", e.index, e.value_expression(self.decoder.as_deref())))
            .collect();
        out.push_str(&format!("local {} = {{{}}}", self.name, slots.join(", ")));
        out
    }
}

fn decoder_function(name: &str, variant: LanguageVariant) -> String {
    match variant {
        LanguageVariant::Luau => format!(
            "local function {name}(b, k) local o = {{}} for i = 1, #b do o[i] = string.char(bit32.bxor(b[i], k)) end return table.concat(o) end"
        ),
        // No bitwise operators in 5.1: XOR bit by bit with arithmetic
        LanguageVariant::Lua51 => format!(
            "local function {name}(b, k) local o = {{}} for i = 1, #b do local x, y, r, p = b[i], k, 0, 1 while x > 0 or y > 0 do if x % 2 ~= y % 2 then r = r + p end x, y, p = (x - x % 2) / 2, (y - y % 2) / 2, p * 2 end o[i] = string.char(r) end return table.concat(o) end"
        ),
    }
}

/// Extract string literals into a table
///
/// Returns the table and the spans with each extracted literal replaced by a
/// code span referencing its slot.
pub fn build_string_table<R: Rng>(
    spans: Vec<Span>,
    encrypt: bool,
    variant: LanguageVariant,
    namespace: &mut Namespace<'_>,
    rng: &mut R,
) -> (StringTable, Vec<Span>) {
    let name = namespace.fresh_helper(rng);
    let mut entries = Vec::new();
    let mut rewritten = Vec::with_capacity(spans.len());
    let mut call_position = false;

    for span in spans {
        match span.kind {
            SpanKind::Code => {
                if let Some(after) = ends_in_callee(&span.text) {
                    call_position = after;
                }
                rewritten.push(span);
            }
            SpanKind::Comment => rewritten.push(span),
            SpanKind::StringLiteral => {
                let Some((delimiter, raw_content)) = split_literal(&span.text) else {
                    // interpolated string: stays put, but can still be called on
                    call_position = true;
                    rewritten.push(span);
                    continue;
                };
                let index = entries.len() as u32;
                entries.push(StringTableEntry {
                    index,
                    raw_content: raw_content.to_string(),
                    delimiter,
                    encryption_key: encrypt.then(|| rng.gen_range(1..=255u8)),
                });
                let reference = if call_position {
                    join_call_gap(&mut rewritten);
                    format!("({}[{}])", name, index)
                } else {
                    format!("{}[{}]", name, index)
                };
                rewritten.push(Span::new(SpanKind::Code, reference, span.start, span.end));
                call_position = true;
            }
        }
    }

    let decoder = (encrypt && !entries.is_empty()).then(|| namespace.fresh_helper(rng));
    (
        StringTable {
            name,
            decoder,
            variant,
            entries,
        },
        rewritten,
    )
}

/// Whether a string right after `code` would be a call argument (`f "x"`)
///
/// `None` when `code` holds no significant token.
fn ends_in_callee(code: &str) -> Option<bool> {
    let last = tokenize(code).into_iter().rev().find(|t| !t.is_trivia())?;
    Some(match last.kind {
        TokenKind::Ident => !is_keyword(last.text),
        TokenKind::Punct => matches!(last.text, ")" | "]" | "}"),
        _ => false,
    })
}

/// Keep a parenthesized call argument on its callee's line
///
/// `f\n(x)` is ambiguous syntax in Lua 5.1 and Luau, so line breaks between
/// the callee and the argument become spaces and comments there are dropped.
fn join_call_gap(rewritten: &mut [Span]) {
    for span in rewritten.iter_mut().rev() {
        match span.kind {
            SpanKind::Comment => *span = Span::new(SpanKind::Code, " ", span.start, span.end),
            SpanKind::StringLiteral => return,
            SpanKind::Code => {
                let tail = tokenize(&span.text)
                    .into_iter()
                    .rev()
                    .find(|t| !t.is_trivia())
                    .map(|t| t.offset + t.text.len());
                let from = tail.unwrap_or(0);
                if span.text[from..].contains(['\n', '\r']) {
                    let joined = format!("{}{}", &span.text[..from], span.text[from..].replace(['\n', '\r'], " "));
                    *span = Span::new(SpanKind::Code, joined, span.start, span.end);
                }
                if tail.is_some() {
                    return;
                }
            }
        }
    }
}

fn split_literal(text: &str) -> Option<(Delimiter, &str)> {
    let first = text.chars().next()?;
    match first {
        '"' | '\'' if text.len() >= 2 => Some((Delimiter::Quote(first), &text[1..text.len() - 1])),
        '[' => {
            let level = long_bracket_level(text.as_bytes(), 0)?;
            let open = level + 2;
            Some((Delimiter::Long { level }, &text[open..text.len() - open]))
        }
        _ => None,
    }
}

/// Resolve Lua escape sequences of a short string body
pub fn unescape(raw: &str) -> Vec<u8> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 >= bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let c = bytes[i + 1];
        i += 2;
        match c {
            b'a' => out.push(7),
            b'b' => out.push(8),
            b'f' => out.push(12),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(11),
            b'\n' => out.push(b'\n'),
            b'z' => {
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
            }
            b'x' => match (hex_digit(bytes.get(i)), hex_digit(bytes.get(i + 1))) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 2;
                }
                _ => out.push(b'x'),
            },
            b'u' if bytes.get(i) == Some(&b'{') => {
                let close = raw[i..].find('}').map(|p| i + p);
                let ch = close
                    .and_then(|close| u32::from_str_radix(&raw[i + 1..close], 16).ok())
                    .and_then(char::from_u32);
                match (close, ch) {
                    (Some(close), Some(ch)) => {
                        let mut buf = [0u8; 4];
                        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                        i = close + 1;
                    }
                    _ => out.push(b'u'),
                }
            }
            d if d.is_ascii_digit() => {
                let mut value = u32::from(d - b'0');
                let mut taken = 1;
                while taken < 3 && i < bytes.len() && bytes[i].is_ascii_digit() {
                    value = value * 10 + u32::from(bytes[i] - b'0');
                    i += 1;
                    taken += 1;
                }
                out.push(value.min(255) as u8);
            }
            other => out.push(other),
        }
    }
    out
}

fn hex_digit(b: Option<&u8>) -> Option<u8> {
    let b = *b?;
    (b as char).to_digit(16).map(|d| d as u8)
}
