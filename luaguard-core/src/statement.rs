//! Lightweight statement splitter
//!
//! Groups the span stream into logical lines (split only at newlines inside
//! code spans, so a multi-line long string or block comment stays on the
//! line where it starts) and classifies each line well enough to know
//! where code can be wrapped or inserted without splitting a statement:
//!
//! - a line is *wrappable* when it is one or more complete simple
//!   statements at bracket depth 0 that neither continue the previous line
//!   nor continue on the next one, and it declares nothing and opens or
//!   closes no block;
//! - a *boundary* after a line is safe when both sides are complete
//!   statements and no `return`/`break` earlier in the same block is still
//!   waiting for that block to close.

use crate::lexer::{tokenize, TokenKind};
use crate::scanner::{Span, SpanKind};

const BLOCK_KEYWORDS: &[&str] = &[
    "if", "then", "else", "elseif", "end", "for", "while", "do", "repeat", "until", "function",
];

/// Keywords that leave an expression or statement unfinished at line end
const OPEN_ENDED_KEYWORDS: &[&str] = &[
    "and", "or", "not", "local", "return", "function", "if", "elseif", "while", "until", "for",
    "in", "goto",
];

/// Keywords that can only continue something started on an earlier line
const CONTINUING_KEYWORDS: &[&str] = &["and", "or", "then", "do", "in"];

/// Statements that must be the last one in their block
const EXIT_KEYWORDS: &[&str] = &["return", "break", "continue"];

const BLOCK_OPENERS: &[&str] = &["function", "do", "if", "repeat"];
const BLOCK_CLOSERS: &[&str] = &["end", "until"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sig {
    Word(String),
    Punct(String),
    Number,
    Atom,
}

/// One logical line and what the splitter learned about it
#[derive(Debug, Clone)]
pub struct LogicalLine {
    pub spans: Vec<Span>,
    /// Offset of the newline that ended this line in the original source
    pub newline_at: Option<usize>,
    first: Option<Sig>,
    second: Option<Sig>,
    last: Option<Sig>,
    depth_start: i32,
    depth_end: i32,
    has_block_keyword: bool,
    has_local: bool,
    has_label: bool,
    /// A block-final statement is open at the end of this line
    exit_pending: bool,
}

impl LogicalLine {
    /// A synthesized line of code
    pub fn synthetic(text: String, at: usize) -> Self {
        Self {
            spans: vec![Span::code_at(text, at)],
            newline_at: None,
            first: None,
            second: None,
            last: None,
            depth_start: 0,
            depth_end: 0,
            has_block_keyword: false,
            has_local: false,
            has_label: false,
            exit_pending: false,
        }
    }

    /// True when the line holds code or string tokens
    pub fn has_code(&self) -> bool {
        self.first.is_some()
    }

    /// Leading whitespace of the line
    pub fn indent(&self) -> &str {
        match self.spans.first() {
            Some(span) if span.is_code() => {
                let trimmed = span.text.trim_start_matches([' ', '\t']);
                &span.text[..span.text.len() - trimmed.len()]
            }
            _ => "",
        }
    }

    /// Offset in the original source where this line starts
    pub fn start(&self) -> usize {
        self.spans.first().map_or(0, |s| s.start)
    }

    pub fn end(&self) -> usize {
        self.spans.last().map_or(0, |s| s.end)
    }

    fn starts_continuation(&self) -> bool {
        match &self.first {
            Some(Sig::Word(w)) => CONTINUING_KEYWORDS.contains(&w.as_str()),
            Some(Sig::Punct(p)) => !matches!(p.as_str(), "::" | ";"),
            Some(Sig::Number) | Some(Sig::Atom) => true,
            None => false,
        }
    }

    fn ends_open(&self) -> bool {
        match &self.last {
            Some(Sig::Word(w)) => OPEN_ENDED_KEYWORDS.contains(&w.as_str()),
            Some(Sig::Punct(p)) => !matches!(p.as_str(), ")" | "]" | "}" | ";" | "..."),
            _ => false,
        }
    }

    fn is_type_declaration(&self) -> bool {
        matches!(&self.first, Some(Sig::Word(w)) if w == "type" || w == "export")
            && matches!(&self.second, Some(Sig::Word(_)))
    }
}

/// Split spans into logical lines
pub fn split_lines(spans: Vec<Span>) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut current: Vec<Span> = Vec::new();

    for span in spans {
        if !span.is_code() || !span.text.contains('\n') {
            current.push(span);
            continue;
        }
        let mut offset = span.start;
        let mut pieces = span.text.split('\n').peekable();
        while let Some(piece) = pieces.next() {
            if !piece.is_empty() {
                current.push(Span::new(SpanKind::Code, piece, offset, offset + piece.len()));
            }
            offset += piece.len();
            if pieces.peek().is_some() {
                lines.push((std::mem::take(&mut current), Some(offset)));
                offset += 1;
            }
        }
    }
    lines.push((current, None));

    let mut state = BlockState::default();
    lines
        .into_iter()
        .map(|(spans, newline_at)| analyze(spans, newline_at, &mut state))
        .collect()
}

/// Nesting carried from one line to the next
#[derive(Debug, Default)]
struct BlockState {
    brackets: i32,
    blocks: i32,
    /// Block depth of the innermost pending `return`/`break`
    exit_at: Option<i32>,
}

fn analyze(spans: Vec<Span>, newline_at: Option<usize>, state: &mut BlockState) -> LogicalLine {
    let mut sigs = Vec::new();
    let depth_start = state.brackets;
    let mut depth = depth_start;
    let mut line = LogicalLine::synthetic(String::new(), 0);

    for span in &spans {
        match span.kind {
            SpanKind::StringLiteral => sigs.push(Sig::Atom),
            SpanKind::Comment => {}
            SpanKind::Code => {
                for token in tokenize(&span.text) {
                    match token.kind {
                        TokenKind::Ident => {
                            let word = token.text;
                            line.has_block_keyword |= BLOCK_KEYWORDS.contains(&word);
                            line.has_local |= word == "local";
                            if BLOCK_OPENERS.contains(&word) {
                                state.blocks += 1;
                            } else if BLOCK_CLOSERS.contains(&word) {
                                state.blocks -= 1;
                                if state.exit_at.is_some_and(|d| state.blocks < d) {
                                    state.exit_at = None;
                                }
                            } else if EXIT_KEYWORDS.contains(&word) {
                                state.exit_at = Some(state.blocks);
                            }
                            sigs.push(Sig::Word(word.to_string()));
                        }
                        TokenKind::Number => sigs.push(Sig::Number),
                        TokenKind::Punct => {
                            match token.text {
                                "(" | "[" | "{" => depth += 1,
                                ")" | "]" | "}" => depth -= 1,
                                "::" => line.has_label = true,
                                _ => {}
                            }
                            sigs.push(Sig::Punct(token.text.to_string()));
                        }
                        TokenKind::Whitespace | TokenKind::Newline => {}
                    }
                }
            }
        }
    }

    line.spans = spans;
    line.newline_at = newline_at;
    line.depth_start = depth_start;
    line.depth_end = depth;
    line.exit_pending = state.exit_at.is_some();
    state.brackets = depth;
    line.second = sigs.get(1).cloned();
    line.first = sigs.first().cloned();
    line.last = sigs.pop();
    line
}

/// Rejoin lines with the newlines that separated them
pub fn join_lines(lines: Vec<LogicalLine>) -> Vec<Span> {
    let mut spans = Vec::new();
    let count = lines.len();
    for (index, line) in lines.into_iter().enumerate() {
        let at = line.newline_at.unwrap_or_else(|| line.end());
        spans.extend(line.spans);
        if index + 1 < count {
            spans.push(Span::new(SpanKind::Code, "\n", at, at + usize::from(line.newline_at.is_some())));
        }
    }
    spans
}

fn prev_code(lines: &[LogicalLine], index: usize) -> Option<&LogicalLine> {
    lines[..index].iter().rev().find(|l| l.has_code())
}

fn next_code(lines: &[LogicalLine], index: usize) -> Option<&LogicalLine> {
    lines[index + 1..].iter().find(|l| l.has_code())
}

/// Whether line `index` can be wrapped in a block on its own
pub fn is_wrappable(lines: &[LogicalLine], index: usize) -> bool {
    let line = &lines[index];
    if !line.has_code()
        || line.depth_start != 0
        || line.depth_end != 0
        || line.has_block_keyword
        || line.has_local
        || line.has_label
        || line.is_type_declaration()
        || line.starts_continuation()
        || line.ends_open()
    {
        return false;
    }
    if prev_code(lines, index).is_some_and(|p| p.ends_open() || p.depth_end != 0) {
        return false;
    }
    !next_code(lines, index).is_some_and(|n| n.starts_continuation())
}

/// Whether a new statement may be inserted right after line `index`
pub fn is_boundary_after(lines: &[LogicalLine], index: usize) -> bool {
    let line = &lines[index];
    if !line.has_code() || line.depth_end != 0 || line.ends_open() {
        return false;
    }
    if line.exit_pending {
        return false;
    }
    !next_code(lines, index).is_some_and(|n| n.starts_continuation())
}
