//! Identifier renaming
//!
//! One walk over the code spans resolves every name against a stack of
//! block scopes:
//! - `function`, `do`, `then` and `repeat` open a scope; `end` and `until`
//!   (once its condition ends) close one.
//! - A `local` name becomes visible after the statement's expression list,
//!   a `local function` name inside its own body, parameters inside the
//!   function and `for` variables inside the loop body.
//!
//! Each distinct declared name gets one fresh generated name. Only the
//! declarations and the occurrences that resolve to them are rewritten;
//! free names (globals, library tables), field names after `.`/`:` and
//! table constructor keys are never touched. Identifiers inside the `{...}`
//! holes of interpolated strings are resolved like any other use.

use std::collections::{HashMap, HashSet};

use rand::Rng;

use crate::lexer::{is_keyword, tokenize, TokenKind};
use crate::names::{Namespace, ReservedWords};
use crate::scanner::{interpolation_holes, Span, SpanKind};

/// Shape of generated names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenameStrength {
    /// Compact base-36 counter: `a`, `b`, ... `a0`
    Low,
    /// Hex counter from a random start: `_0x3a1`, `_0x3a4`, ...
    Medium,
    /// Look-alike characters: `lIl1lI1IlI1l`
    High,
}

/// One original name and its replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierBinding {
    pub original_name: String,
    pub generated_name: String,
}

/// Rename locally declared identifiers in the code spans
pub fn rename_identifiers<R: Rng>(
    spans: Vec<Span>,
    strength: RenameStrength,
    namespace: &mut Namespace<'_>,
    rng: &mut R,
) -> (Vec<Span>, Vec<IdentifierBinding>) {
    let (declared, sites) = {
        let toks = significant_tokens(&spans);
        let resolution = Resolver::new(&toks, namespace.reserved()).run();
        let binding_of: HashMap<&str, usize> = resolution
            .declared
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, i))
            .collect();
        let sites: Vec<(usize, Edit)> = resolution
            .sites
            .iter()
            .filter_map(|site| {
                let binding = *binding_of.get(site.name)?;
                Some((
                    site.span,
                    Edit {
                        offset: site.offset,
                        len: site.name.len(),
                        binding,
                    },
                ))
            })
            .collect();
        let declared: Vec<String> = resolution.declared.iter().map(|n| n.to_string()).collect();
        (declared, sites)
    };
    if declared.is_empty() {
        return (spans, Vec::new());
    }

    let mut generator = NameGenerator::new(strength, rng);
    let bindings: Vec<IdentifierBinding> = declared
        .into_iter()
        .map(|original_name| {
            let generated_name = loop {
                if let Some(candidate) = generator.next_candidate(rng) {
                    if namespace.claim(&candidate) {
                        break candidate;
                    }
                }
            };
            IdentifierBinding {
                original_name,
                generated_name,
            }
        })
        .collect();

    let mut edits: HashMap<usize, Vec<Edit>> = HashMap::new();
    for (span, edit) in sites {
        edits.entry(span).or_default().push(edit);
    }

    let spans = apply_edits(spans, edits, &bindings);
    (spans, bindings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SigKind {
    Ident,
    Number,
    Punct,
    /// A string literal, seen from code as a single operand
    Atom,
}

/// A non-trivia token, located by span index and offset within that span
#[derive(Debug, Clone, Copy)]
struct SigTok<'s> {
    kind: SigKind,
    text: &'s str,
    span: usize,
    offset: usize,
    /// Inside an interpolation hole: resolved, but never structural
    in_hole: bool,
}

impl<'s> SigTok<'s> {
    fn is_name(&self) -> bool {
        self.kind == SigKind::Ident && !is_keyword(self.text)
    }

    fn is_keyword(&self, kw: &str) -> bool {
        self.kind == SigKind::Ident && self.text == kw
    }

    fn is_punct(&self, p: &str) -> bool {
        self.kind == SigKind::Punct && self.text == p
    }

    /// Whether an expression may end right after this token
    fn ends_operand(&self) -> bool {
        match self.kind {
            SigKind::Ident => !is_keyword(self.text) || matches!(self.text, "nil" | "true" | "false" | "end"),
            SigKind::Number | SigKind::Atom => true,
            SigKind::Punct => matches!(self.text, ")" | "]" | "}" | "..."),
        }
    }

    /// Whether this token extends an expression that could have ended
    fn continues_expression(&self) -> bool {
        match self.kind {
            SigKind::Atom => true,
            SigKind::Ident => matches!(self.text, "and" | "or"),
            SigKind::Punct => matches!(
                self.text,
                "+" | "-" | "*" | "/" | "//" | "%" | "^" | ".." | "==" | "~=" | "<" | ">" | "<="
                    | ">=" | "." | ":" | "::" | "[" | "(" | "{" | ","
            ),
            SigKind::Number => false,
        }
    }
}

fn sig_kind(kind: TokenKind) -> Option<SigKind> {
    match kind {
        TokenKind::Ident => Some(SigKind::Ident),
        TokenKind::Number => Some(SigKind::Number),
        TokenKind::Punct => Some(SigKind::Punct),
        TokenKind::Whitespace | TokenKind::Newline => None,
    }
}

fn significant_tokens(spans: &[Span]) -> Vec<SigTok<'_>> {
    let mut toks = Vec::new();
    for (index, span) in spans.iter().enumerate() {
        match span.kind {
            SpanKind::Code => {
                for token in tokenize(&span.text) {
                    let Some(kind) = sig_kind(token.kind) else {
                        continue;
                    };
                    toks.push(SigTok {
                        kind,
                        text: token.text,
                        span: index,
                        offset: token.offset,
                        in_hole: false,
                    });
                }
            }
            SpanKind::StringLiteral => {
                toks.push(SigTok {
                    kind: SigKind::Atom,
                    text: "",
                    span: index,
                    offset: 0,
                    in_hole: false,
                });
                for hole in interpolation_holes(&span.text) {
                    let code = &span.text[hole.clone()];
                    for token in tokenize(code) {
                        let Some(kind) = sig_kind(token.kind) else {
                            continue;
                        };
                        toks.push(SigTok {
                            kind,
                            text: token.text,
                            span: index,
                            offset: hole.start + token.offset,
                            in_hole: true,
                        });
                    }
                }
            }
            SpanKind::Comment => {}
        }
    }
    toks
}

/// A token to rewrite
#[derive(Debug, Clone, Copy)]
struct Site<'s> {
    span: usize,
    offset: usize,
    name: &'s str,
}

#[derive(Debug, Default)]
struct Resolution<'s> {
    /// Distinct declared names, in order of first declaration
    declared: Vec<&'s str>,
    sites: Vec<Site<'s>>,
}

/// Work that waits for the end of an expression
#[derive(Debug)]
enum Deferred<'s> {
    /// Names of a `local` statement, bound after its expression list
    Bind(Vec<&'s str>),
    /// The scope of a `repeat`, closed after its `until` condition
    Close,
}

#[derive(Debug)]
struct Pending<'s> {
    depth: usize,
    brackets: usize,
    expr_ifs: usize,
    action: Deferred<'s>,
}

struct Resolver<'t, 's> {
    toks: &'t [SigTok<'s>],
    reserved: &'t ReservedWords,
    scopes: Vec<HashSet<&'s str>>,
    brackets: Vec<&'s str>,
    /// Scope depth of every open `if` expression
    expr_ifs: Vec<usize>,
    /// `for` variables waiting for the loop's `do`, with the scope depth
    loop_vars: Vec<(usize, Vec<&'s str>)>,
    pending: Vec<Pending<'s>>,
    /// Last structural token
    prev: Option<SigTok<'s>>,
    /// `prev` is the `then`/`else` of an `if` expression
    prev_expr_branch: bool,
    seen: HashSet<&'s str>,
    out: Resolution<'s>,
}

impl<'t, 's> Resolver<'t, 's> {
    fn new(toks: &'t [SigTok<'s>], reserved: &'t ReservedWords) -> Self {
        Self {
            toks,
            reserved,
            scopes: vec![HashSet::new()],
            brackets: Vec::new(),
            expr_ifs: Vec::new(),
            loop_vars: Vec::new(),
            pending: Vec::new(),
            prev: None,
            prev_expr_branch: false,
            seen: HashSet::new(),
            out: Resolution::default(),
        }
    }

    fn run(mut self) -> Resolution<'s> {
        let mut i = 0;
        while i < self.toks.len() {
            let tok = self.toks[i];
            if tok.in_hole {
                if tok.is_name() && !self.after_member_access(i) {
                    self.resolve(tok);
                }
                i += 1;
                continue;
            }
            self.settle(&tok);
            let next = self.step(i);
            self.prev = self.toks[i..next].iter().rev().find(|t| !t.in_hole).copied();
            i = next;
        }
        self.out
    }

    /// Complete deferred work whose expression ends before `next`
    fn settle(&mut self, next: &SigTok<'s>) {
        while let Some(pending) = self.pending.last() {
            let exited = self.scopes.len() < pending.depth || self.brackets.len() < pending.brackets;
            let ended = self.scopes.len() == pending.depth
                && self.brackets.len() == pending.brackets
                && self.expr_ifs.len() == pending.expr_ifs
                && self.prev.is_some_and(|p| p.ends_operand())
                && !next.continues_expression();
            if !exited && !ended {
                break;
            }
            let Some(pending) = self.pending.pop() else {
                break;
            };
            if exited {
                continue;
            }
            match pending.action {
                Deferred::Bind(names) => self.bind(names),
                Deferred::Close => self.close_scope(),
            }
        }
    }

    /// Handle the structural token at `i`; returns the index to continue from
    fn step(&mut self, i: usize) -> usize {
        let tok = self.toks[i];
        let expr_branch = self.prev_expr_branch;
        self.prev_expr_branch = false;

        match tok.kind {
            SigKind::Ident if tok.is_name() => {
                if !self.after_member_access(i) && !self.is_constructor_key(i) {
                    self.resolve(tok);
                }
            }
            SigKind::Ident => return self.keyword(i, expr_branch),
            SigKind::Punct => match tok.text {
                "(" | "[" | "{" => self.brackets.push(tok.text),
                ")" | "]" | "}" => {
                    self.brackets.pop();
                }
                "::" => return skip_type(self.toks, i + 1),
                _ => {}
            },
            SigKind::Number | SigKind::Atom => {}
        }
        i + 1
    }

    fn keyword(&mut self, i: usize, expr_branch: bool) -> usize {
        let tok = self.toks[i];
        let depth = self.scopes.len();
        let in_expr_if = self.expr_ifs.last() == Some(&depth);

        match tok.text {
            "local" if self.toks.get(i + 1).is_some_and(|t| t.is_keyword("function")) => {
                let mut j = i + 2;
                if let Some(name) = self.toks.get(j).filter(|t| t.is_name()).copied() {
                    if let Some(name) = self.declare(name) {
                        self.bind(vec![name]);
                    }
                    j += 1;
                }
                return self.function_body(j);
            }
            "local" => {
                let (names, j) = name_list(self.toks, i + 1);
                let names: Vec<&'s str> = names.into_iter().filter_map(|t| self.declare(t)).collect();
                if self.toks.get(j).is_some_and(|t| t.is_punct("=")) {
                    self.pending.push(Pending {
                        depth,
                        brackets: self.brackets.len(),
                        expr_ifs: self.expr_ifs.len(),
                        action: Deferred::Bind(names),
                    });
                    return j + 1;
                }
                self.bind(names);
                return j;
            }
            "for" => {
                let (names, j) = name_list(self.toks, i + 1);
                let names: Vec<&'s str> = names.into_iter().filter_map(|t| self.declare(t)).collect();
                self.loop_vars.push((depth, names));
                return j;
            }
            "function" => {
                let mut j = i + 1;
                if let Some(base) = self.toks.get(j).filter(|t| t.is_name()).copied() {
                    self.resolve(base);
                    j += 1;
                    while self.toks.get(j).is_some_and(|t| t.is_punct(".") || t.is_punct(":"))
                        && self.toks.get(j + 1).is_some_and(|t| t.kind == SigKind::Ident)
                    {
                        j += 2;
                    }
                }
                return self.function_body(j);
            }
            "do" => {
                self.scopes.push(HashSet::new());
                if self.loop_vars.last().is_some_and(|(d, _)| *d == depth) {
                    if let Some((_, names)) = self.loop_vars.pop() {
                        self.bind(names);
                    }
                }
            }
            "if" => {
                if expr_branch || self.prev.is_some_and(|p| opens_expression(&p)) {
                    self.expr_ifs.push(depth);
                }
            }
            "then" | "elseif" if in_expr_if => self.prev_expr_branch = true,
            "else" if in_expr_if => {
                self.expr_ifs.pop();
                self.prev_expr_branch = true;
            }
            "then" | "repeat" => self.scopes.push(HashSet::new()),
            "elseif" => self.close_scope(),
            "else" => {
                self.close_scope();
                self.scopes.push(HashSet::new());
            }
            "until" => self.pending.push(Pending {
                depth,
                brackets: self.brackets.len(),
                expr_ifs: self.expr_ifs.len(),
                action: Deferred::Close,
            }),
            "end" => self.close_scope(),
            _ => {}
        }
        i + 1
    }

    /// Generics, parameters and return type of a function starting at `j`;
    /// opens the function's scope
    fn function_body(&mut self, mut j: usize) -> usize {
        self.scopes.push(HashSet::new());
        if self.toks.get(j).is_some_and(|t| t.is_punct("<")) {
            j = skip_balanced(self.toks, j);
        }
        if !self.toks.get(j).is_some_and(|t| t.is_punct("(")) {
            return j;
        }
        j += 1;
        let mut params = Vec::new();
        while let Some(tok) = self.toks.get(j).copied() {
            if tok.is_name() {
                params.extend(self.declare(tok));
            } else if tok.is_punct(")") {
                j += 1;
                break;
            } else if !tok.is_punct("...") && !tok.is_punct(",") {
                break;
            }
            j += 1;
            if self.toks.get(j).is_some_and(|t| t.is_punct(":")) {
                j = skip_type(self.toks, j + 1);
            }
        }
        self.bind(params);
        if self.toks.get(j).is_some_and(|t| t.is_punct(":")) {
            j = skip_type(self.toks, j + 1);
        }
        j
    }

    /// Record a declaration site; `None` for reserved names
    fn declare(&mut self, tok: SigTok<'s>) -> Option<&'s str> {
        if self.reserved.contains(tok.text) {
            return None;
        }
        if self.seen.insert(tok.text) {
            self.out.declared.push(tok.text);
        }
        self.out.sites.push(Site {
            span: tok.span,
            offset: tok.offset,
            name: tok.text,
        });
        Some(tok.text)
    }

    fn bind(&mut self, names: Vec<&'s str>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.extend(names);
        }
    }

    fn close_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Rewrite `tok` if it names a visible local
    fn resolve(&mut self, tok: SigTok<'s>) {
        if self.scopes.iter().rev().any(|scope| scope.contains(tok.text)) {
            self.out.sites.push(Site {
                span: tok.span,
                offset: tok.offset,
                name: tok.text,
            });
        }
    }

    fn after_member_access(&self, i: usize) -> bool {
        i.checked_sub(1)
            .and_then(|p| self.toks.get(p))
            .is_some_and(|p| p.is_punct(".") || p.is_punct(":"))
    }

    fn is_constructor_key(&self, i: usize) -> bool {
        self.brackets.last() == Some(&"{")
            && self.prev.is_some_and(|p| p.is_punct("{") || p.is_punct(",") || p.is_punct(";"))
            && self.toks.get(i + 1).is_some_and(|n| n.is_punct("="))
    }
}

/// Whether an `if` right after `tok` starts an expression
fn opens_expression(tok: &SigTok<'_>) -> bool {
    match tok.kind {
        SigKind::Punct => !matches!(tok.text, ")" | "]" | "}" | ";" | "..."),
        SigKind::Ident => matches!(
            tok.text,
            "return" | "and" | "or" | "not" | "in" | "until" | "while" | "if" | "elseif"
        ),
        SigKind::Number | SigKind::Atom => false,
    }
}

/// `a <const>, b: T, c` as found after `local` or `for`
fn name_list<'s>(toks: &[SigTok<'s>], mut i: usize) -> (Vec<SigTok<'s>>, usize) {
    let mut names = Vec::new();
    loop {
        let Some(name) = toks.get(i).filter(|t| t.is_name()) else {
            return (names, i);
        };
        names.push(*name);
        i += 1;
        if toks.get(i).is_some_and(|t| t.is_punct("<"))
            && toks.get(i + 2).is_some_and(|t| t.is_punct(">"))
        {
            i += 3;
        }
        if toks.get(i).is_some_and(|t| t.is_punct(":")) {
            i = skip_type(toks, i + 1);
        }
        if toks.get(i).is_some_and(|t| t.is_punct(",")) {
            i += 1;
        } else {
            return (names, i);
        }
    }
}

/// Skip a Luau type annotation starting at `i`
fn skip_type(toks: &[SigTok<'_>], mut i: usize) -> usize {
    loop {
        let Some(tok) = toks.get(i) else {
            return i;
        };
        match tok.kind {
            SigKind::Punct if matches!(tok.text, "(" | "{" | "[") => i = skip_balanced(toks, i),
            SigKind::Ident => {
                i += 1;
                while toks.get(i).is_some_and(|t| t.is_punct("."))
                    && toks.get(i + 1).is_some_and(|t| t.kind == SigKind::Ident)
                {
                    i += 2;
                }
                if toks.get(i).is_some_and(|t| t.is_punct("<")) {
                    i = skip_balanced(toks, i);
                } else if tok.text == "typeof" && toks.get(i).is_some_and(|t| t.is_punct("(")) {
                    i = skip_balanced(toks, i);
                }
            }
            SigKind::Atom => i += 1,
            SigKind::Punct if tok.text == "..." => i += 1,
            _ => return i,
        }
        while toks.get(i).is_some_and(|t| t.is_punct("?")) {
            i += 1;
        }
        if toks
            .get(i)
            .is_some_and(|t| t.is_punct("|") || t.is_punct("&") || t.is_punct("->"))
        {
            i += 1;
        } else {
            return i;
        }
    }
}

/// Index just past the bracket closing the one at `i`
fn skip_balanced(toks: &[SigTok<'_>], i: usize) -> usize {
    let angle = toks[i].is_punct("<");
    let mut depth = 0usize;
    for (j, tok) in toks.iter().enumerate().skip(i) {
        if tok.kind != SigKind::Punct {
            continue;
        }
        let (open, close) = if angle {
            (tok.text == "<", tok.text == ">")
        } else {
            (
                matches!(tok.text, "(" | "[" | "{"),
                matches!(tok.text, ")" | "]" | "}"),
            )
        };
        if open {
            depth += 1;
        } else if close {
            depth -= 1;
            if depth == 0 {
                return j + 1;
            }
        }
    }
    toks.len()
}

/// One token replacement within a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Edit {
    offset: usize,
    len: usize,
    binding: usize,
}

fn apply_edits(
    spans: Vec<Span>,
    mut edits: HashMap<usize, Vec<Edit>>,
    bindings: &[IdentifierBinding],
) -> Vec<Span> {
    spans
        .into_iter()
        .enumerate()
        .map(|(index, span)| {
            let Some(mut edits) = edits.remove(&index) else {
                return span;
            };
            edits.sort_unstable();
            let mut text = String::with_capacity(span.text.len());
            let mut cursor = 0;
            for edit in edits {
                if edit.offset < cursor {
                    continue;
                }
                text.push_str(&span.text[cursor..edit.offset]);
                text.push_str(&bindings[edit.binding].generated_name);
                cursor = edit.offset + edit.len;
            }
            text.push_str(&span.text[cursor..]);
            Span::new(span.kind, text, span.start, span.end)
        })
        .collect()
}

struct NameGenerator {
    strength: RenameStrength,
    counter: u64,
}

impl NameGenerator {
    fn new<R: Rng>(strength: RenameStrength, rng: &mut R) -> Self {
        let counter = match strength {
            RenameStrength::Low => 10,
            RenameStrength::Medium => rng.gen_range(0x100..0x1000),
            RenameStrength::High => 0,
        };
        Self { strength, counter }
    }

    /// Next candidate name; `None` when this counter value has no valid shape
    fn next_candidate<R: Rng>(&mut self, rng: &mut R) -> Option<String> {
        match self.strength {
            RenameStrength::Low => {
                let name = to_base36(self.counter);
                self.counter += 1;
                name.starts_with(|c: char| c.is_ascii_alphabetic()).then_some(name)
            }
            RenameStrength::Medium => {
                let name = format!("_0x{:x}", self.counter);
                self.counter += rng.gen_range(1..=7);
                Some(name)
            }
            RenameStrength::High => {
                const FIRST: &[u8] = b"lI";
                const REST: &[u8] = b"lI1";
                let mut name = String::with_capacity(12);
                name.push(FIRST[rng.gen_range(0..FIRST.len())] as char);
                for _ in 0..11 {
                    name.push(REST[rng.gen_range(0..REST.len())] as char);
                }
                Some(name)
            }
        }
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
