//! Control-flow obfuscation with opaque predicates
//!
//! Eligible statements are wrapped as `if _Pq(4127) then <stmt> end`, where
//! `_Pq` is a local function that returns true for every integer argument
//! but only by a number-theoretic identity a reader has to work out.

use rand::Rng;

use crate::names::Namespace;
use crate::scanner::{Span, SpanKind};
use crate::statement::{is_wrappable, join_lines, split_lines, LogicalLine};

/// Identities that hold for every non-negative integer `n`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateForm {
    /// n(n+1) is even
    ConsecutiveProduct,
    /// n^3 - n is divisible by 3
    CubeMinusSelf,
    /// squares are 0 or 1 mod 4
    SquareResidue,
    /// 7n^2 + 6 leaves 6 mod 7
    ScaledSquare,
}

impl PredicateForm {
    const ALL: [PredicateForm; 4] = [
        PredicateForm::ConsecutiveProduct,
        PredicateForm::CubeMinusSelf,
        PredicateForm::SquareResidue,
        PredicateForm::ScaledSquare,
    ];

    fn body(&self) -> &'static str {
        match self {
            PredicateForm::ConsecutiveProduct => "return (n * n + n) % 2 == 0",
            PredicateForm::CubeMinusSelf => "return (n * n * n - n) % 3 == 0",
            PredicateForm::SquareResidue => "return (n * n) % 4 ~= 2",
            PredicateForm::ScaledSquare => "return (7 * n * n + 6) % 7 == 6",
        }
    }

    /// Same arithmetic as the emitted Lua
    pub fn holds(&self, n: i64) -> bool {
        match self {
            PredicateForm::ConsecutiveProduct => (n * n + n) % 2 == 0,
            PredicateForm::CubeMinusSelf => (n * n * n - n) % 3 == 0,
            PredicateForm::SquareResidue => (n * n) % 4 != 2,
            PredicateForm::ScaledSquare => (7 * n * n + 6) % 7 == 6,
        }
    }
}

/// The predicate function chosen for one invocation
#[derive(Debug, Clone)]
pub struct OpaquePredicate {
    pub name: String,
    pub form: PredicateForm,
}

impl OpaquePredicate {
    pub fn choose<R: Rng>(namespace: &mut Namespace<'_>, rng: &mut R) -> Self {
        let form = PredicateForm::ALL[rng.gen_range(0..PredicateForm::ALL.len())];
        Self {
            name: namespace.fresh_helper(rng),
            form,
        }
    }

    pub fn declaration(&self) -> String {
        format!("local function {}(n) {} end", self.name, self.form.body())
    }

    /// A fresh call of the predicate; arguments stay small so every
    /// intermediate is exact in a double
    pub fn guard<R: Rng>(&self, rng: &mut R) -> String {
        format!("{}({})", self.name, rng.gen_range(1..=9999))
    }
}

/// Wrap eligible statements in opaque-predicate guards
///
/// Each eligible statement is wrapped with independent probability
/// `probability`. When nothing was picked but something was eligible, one
/// statement is wrapped anyway so the pass always leaves a trace.
pub fn obfuscate_control_flow<R: Rng>(
    spans: Vec<Span>,
    probability: f64,
    predicate: &OpaquePredicate,
    rng: &mut R,
) -> (Vec<Span>, usize) {
    let mut lines = split_lines(spans);
    let eligible: Vec<usize> = (0..lines.len()).filter(|&i| is_wrappable(&lines, i)).collect();

    let mut chosen: Vec<usize> = eligible
        .iter()
        .copied()
        .filter(|_| rng.gen_bool(probability))
        .collect();
    if chosen.is_empty() && !eligible.is_empty() && probability > 0.0 {
        chosen.push(eligible[rng.gen_range(0..eligible.len())]);
    }

    for &index in &chosen {
        let guard = predicate.guard(rng);
        wrap_line(&mut lines[index], &guard);
    }

    (join_lines(lines), chosen.len())
}

fn wrap_line(line: &mut LogicalLine, guard: &str) {
    let indent = line.indent().to_string();
    let start = line.start();
    if let Some(first) = line.spans.first_mut().filter(|s| s.is_code()) {
        first.text.drain(..indent.len());
    }

    // before a trailing comment, or it would swallow the `end`
    let tail = line
        .spans
        .iter()
        .rposition(|s| s.kind != SpanKind::Comment)
        .map_or(0, |p| p + 1);
    let end_at = line.spans.get(tail.saturating_sub(1)).map_or(start, |s| s.end);
    line.spans.insert(tail, Span::code_at(" end", end_at));
    line.spans
        .insert(0, Span::code_at(format!("{indent}if {guard} then "), start));
}
