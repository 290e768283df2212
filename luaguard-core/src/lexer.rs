//! Token model for code spans
//!
//! Code spans never contain string or comment text, so tokenizing them only
//! needs identifiers, numbers, punctuation and whitespace.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Punct,
    Whitespace,
    Newline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset within the tokenized text
    pub offset: usize,
}

impl<'a> Token<'a> {
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Newline)
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }
}

pub const KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
    // Luau
    "continue",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

const MULTI_PUNCT: &[&str] = &[
    "...", "..=", "..", "==", "~=", "<=", ">=", "::", "//", "+=", "-=", "*=", "/=", "%=", "^=",
    "->",
];

pub fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

pub fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

pub fn tokenize(code: &str) -> Vec<Token<'_>> {
    let bytes = code.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let b = bytes[i];
        let kind = if b == b'\n' {
            i += 1;
            TokenKind::Newline
        } else if b.is_ascii_whitespace() {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() && bytes[i] != b'\n' {
                i += 1;
            }
            TokenKind::Whitespace
        } else if is_ident_start(b) {
            while i < bytes.len() && is_ident_char(bytes[i]) {
                i += 1;
            }
            TokenKind::Ident
        } else if b.is_ascii_digit()
            || (b == b'.' && bytes.get(i + 1).is_some_and(|c| c.is_ascii_digit()))
        {
            i = number_end(bytes, i);
            TokenKind::Number
        } else if let Some(p) = MULTI_PUNCT.iter().find(|p| code[i..].starts_with(**p)) {
            i += p.len();
            TokenKind::Punct
        } else {
            // whole char, so non-ASCII bytes never split a code point
            i += code[i..].chars().next().map_or(1, char::len_utf8);
            TokenKind::Punct
        };
        tokens.push(Token {
            kind,
            text: &code[start..i],
            offset: start,
        });
    }

    tokens
}

fn number_end(bytes: &[u8], start: usize) -> usize {
    let hex = bytes[start] == b'0' && matches!(bytes.get(start + 1), Some(b'x' | b'X'));
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        let exponent = if hex {
            matches!(b, b'p' | b'P')
        } else {
            matches!(b, b'e' | b'E')
        };
        if exponent && matches!(bytes.get(i + 1), Some(b'+' | b'-')) {
            i += 2;
        } else if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' {
            // `1..x` is concatenation, not a malformed number
            if b == b'.' && bytes.get(i + 1) == Some(&b'.') {
                break;
            }
            i += 1;
        } else {
            break;
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(code: &str) -> Vec<&str> {
        tokenize(code)
            .into_iter()
            .filter(|t| !t.is_trivia())
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_basic_statement() {
        assert_eq!(texts("local x = y ~= 3"), vec!["local", "x", "=", "y", "~=", "3"]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(texts("a = 1e-5 + 0x1F + .5"), vec!["a", "=", "1e-5", "+", "0x1F", "+", ".5"]);
        assert_eq!(texts("b = 0xE+1"), vec!["b", "=", "0xE", "+", "1"]);
        assert_eq!(texts("c = 1..x"), vec!["c", "=", "1", "..", "x"]);
    }

    #[test]
    fn test_varargs_and_methods() {
        assert_eq!(texts("f(...) obj:m()"), vec!["f", "(", "...", ")", "obj", ":", "m", "(", ")"]);
    }

    #[test]
    fn test_offsets_cover_input() {
        let code = "x\t= {a, b}\n";
        let rebuilt: String = tokenize(code).iter().map(|t| t.text).collect();
        assert_eq!(rebuilt, code);
        assert_eq!(tokenize(code).last().unwrap().kind, TokenKind::Newline);
    }

    #[test]
    fn test_keywords() {
        assert!(is_keyword("function"));
        assert!(is_keyword("continue"));
        assert!(!is_keyword("print"));
    }
}
