//! Dead-code injection
//!
//! Inert snippets go between complete statements only, on a line of their
//! own, indented like the statement that follows.

use rand::Rng;

use crate::names::Namespace;
use crate::scanner::Span;
use crate::statement::{is_boundary_after, join_lines, split_lines, LogicalLine};

/// Fill a snippet template with a fresh local name and a random integer
pub fn render_snippet<R: Rng>(template: &str, namespace: &mut Namespace<'_>, rng: &mut R) -> String {
    let mut out = template.to_string();
    if out.contains("{name}") {
        let name = namespace.fresh_helper(rng);
        out = out.replace("{name}", &name);
    }
    if out.contains("{n}") {
        let n: u32 = rng.gen_range(1..=65535);
        out = out.replace("{n}", &n.to_string());
    }
    out
}

/// Insert inert statements at statement boundaries
///
/// Each safe boundary receives a snippet with probability `probability`.
/// Returns the rewritten spans and the number of snippets inserted.
pub fn inject_dead_code<R: Rng>(
    spans: Vec<Span>,
    snippets: &[String],
    probability: f64,
    namespace: &mut Namespace<'_>,
    rng: &mut R,
) -> (Vec<Span>, usize) {
    if snippets.is_empty() {
        return (spans, 0);
    }
    let lines = split_lines(spans);
    let boundaries: Vec<bool> = (0..lines.len()).map(|i| is_boundary_after(&lines, i)).collect();

    let mut out: Vec<LogicalLine> = Vec::with_capacity(lines.len());
    let mut injected = 0;
    let mut pending = lines.into_iter().enumerate().peekable();
    while let Some((index, line)) = pending.next() {
        let at = line.end();
        let fallback_indent = line.indent().to_string();
        out.push(line);
        if !boundaries[index] || !rng.gen_bool(probability) {
            continue;
        }
        let indent = pending
            .peek()
            .map(|(_, next)| next.indent().to_string())
            .unwrap_or(fallback_indent);
        let template = &snippets[rng.gen_range(0..snippets.len())];
        let snippet = render_snippet(template, namespace, rng);
        out.push(LogicalLine::synthetic(format!("{indent}{snippet}"), at));
        injected += 1;
    }

    (join_lines(out), injected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeadCodeConfig;
    use crate::names::ReservedWords;
    use crate::scanner::{render, scan};
    use crate::seed::Seed;

    fn run(source: &str, probability: f64) -> (String, usize) {
        let reserved = ReservedWords::default();
        let spans = scan(source).unwrap();
        let mut ns = Namespace::new(&reserved, &spans);
        let mut rng = Seed::from_u64(9).create_rng();
        let snippets = DeadCodeConfig::default().snippets;
        let (spans, count) = inject_dead_code(spans, &snippets, probability, &mut ns, &mut rng);
        (render(&spans), count)
    }

    /// Lines of `out` that were not injected, in order
    fn original_lines(out: &str) -> Vec<&str> {
        out.lines().filter(|l| !l.trim_start().starts_with("do local _")).collect()
    }

    #[test]
    fn test_preserves_original_statements_in_order() {
        let source = "local a = 1\nprint(a)\nlocal b = \"x -- y\"\nprint(b)";
        let (out, count) = run(source, 1.0);
        assert_eq!(count, 4);
        assert_eq!(original_lines(&out), source.lines().collect::<Vec<_>>());
        assert!(out.contains("\"x -- y\""));
    }

    #[test]
    fn test_zero_probability_is_identity() {
        let source = "print(1)\nprint(2)";
        assert_eq!(run(source, 0.0), (source.to_string(), 0));
    }

    #[test]
    fn test_never_after_return_or_inside_expression() {
        let source = "local t = {\n  1,\n}\nreturn t";
        let (out, count) = run(source, 1.0);
        assert_eq!(count, 1);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[..3], ["local t = {", "  1,", "}"]);
        assert!(lines[3].starts_with("do local _"));
        assert_eq!(lines[4], "return t");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_uses_next_line_indent() {
        let (out, _) = run("function f()\n    g()\n    h()\nend", 1.0);
        let injected: Vec<&str> = out.lines().filter(|l| l.contains("do local _")).collect();
        assert!(!injected.is_empty());
        assert!(injected.iter().all(|l| l.starts_with("    ") || l.starts_with("do")));
    }

    #[test]
    fn test_render_snippet_fills_placeholders() {
        let reserved = ReservedWords::default();
        let mut ns = Namespace::new(&reserved, &[]);
        let mut rng = Seed::from_u64(2).create_rng();
        let out = render_snippet("do local {name} = {n} if {name} then end end", &mut ns, &mut rng);
        assert!(!out.contains('{'));
        let name = out.split_whitespace().nth(2).unwrap();
        assert_eq!(out.matches(name).count(), 2);

        let table = render_snippet("do local {name} = {} end", &mut ns, &mut rng);
        assert!(table.contains("= {} end"));
    }
}
