//! Reserved words and per-invocation name allocation

use std::collections::HashSet;

use rand::Rng;

use crate::config::ReservedConfig;
use crate::lexer::{tokenize, TokenKind, KEYWORDS};
use crate::scanner::{interpolation_holes, Span, SpanKind};

/// Keywords plus sensitive globals; never renamed, never generated
#[derive(Debug, Clone)]
pub struct ReservedWords {
    words: HashSet<String>,
}

impl ReservedWords {
    pub fn from_config(config: &ReservedConfig) -> Self {
        let words = KEYWORDS
            .iter()
            .map(|k| k.to_string())
            .chain(config.globals.iter().cloned())
            .chain(config.extra.iter().cloned())
            .collect();
        Self { words }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.words.contains(name)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for ReservedWords {
    fn default() -> Self {
        Self::from_config(&ReservedConfig::default())
    }
}

/// Every name in use during one invocation
///
/// Seeded with every identifier of the input, so nothing the pipeline
/// generates can capture an existing global or local.
#[derive(Debug)]
pub struct Namespace<'a> {
    reserved: &'a ReservedWords,
    taken: HashSet<String>,
}

impl<'a> Namespace<'a> {
    pub fn new(reserved: &'a ReservedWords, spans: &[Span]) -> Self {
        let mut taken = HashSet::new();
        for span in spans {
            match span.kind {
                SpanKind::Code => taken.extend(identifiers(&span.text)),
                SpanKind::StringLiteral => {
                    for hole in interpolation_holes(&span.text) {
                        taken.extend(identifiers(&span.text[hole]));
                    }
                }
                SpanKind::Comment => {}
            }
        }
        Self { reserved, taken }
    }

    pub fn reserved(&self) -> &ReservedWords {
        self.reserved
    }

    pub fn is_available(&self, name: &str) -> bool {
        !self.reserved.contains(name) && !self.taken.contains(name)
    }

    /// Take `name` if nobody else holds it
    pub fn claim(&mut self, name: &str) -> bool {
        if !self.is_available(name) {
            return false;
        }
        self.taken.insert(name.to_string())
    }

    /// A fresh short name for pipeline helpers (string table, decoder, predicate)
    pub fn fresh_helper<R: Rng>(&mut self, rng: &mut R) -> String {
        const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
        let mut len = 4;
        loop {
            for _ in 0..16 {
                let mut name = String::from("_");
                for _ in 0..len {
                    name.push(ALPHABET[rng.gen_range(0..ALPHABET.len())] as char);
                }
                if self.claim(&name) {
                    return name;
                }
            }
            len += 1;
        }
    }
}

fn identifiers(code: &str) -> impl Iterator<Item = String> + '_ {
    tokenize(code)
        .into_iter()
        .filter(|t| t.kind == TokenKind::Ident)
        .map(|t| t.text.to_string())
}
