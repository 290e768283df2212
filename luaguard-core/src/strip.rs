//! Comment, whitespace and debug-line stripping (runs for every preset)

use regex::Regex;

use crate::scanner::{render, Span, SpanKind};
use crate::statement::{is_wrappable, join_lines, split_lines, LogicalLine};

/// What the strip pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripReport {
    pub comments_removed: usize,
    pub debug_stripped: usize,
}

/// Remove comments, blank lines, indentation, redundant spaces, and
/// standalone statements matching one of `debug_patterns`
pub fn strip(spans: Vec<Span>, debug_patterns: &[Regex]) -> (Vec<Span>, StripReport) {
    let mut report = StripReport::default();

    // A block comment can separate two tokens, so it leaves a space behind
    let mut uncommented: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        let span = match span.kind {
            SpanKind::Comment => {
                report.comments_removed += 1;
                Span::new(SpanKind::Code, " ", span.start, span.end)
            }
            _ => span,
        };
        match uncommented.last_mut() {
            Some(prev) if prev.is_code() && span.is_code() => {
                prev.text.push_str(&span.text);
                prev.end = span.end;
            }
            _ => uncommented.push(span),
        }
    }

    let lines = split_lines(uncommented);
    let debug: Vec<bool> = (0..lines.len())
        .map(|i| {
            !debug_patterns.is_empty()
                && is_wrappable(&lines, i)
                && {
                    let text = render(&lines[i].spans);
                    debug_patterns.iter().any(|re| re.is_match(&text))
                }
        })
        .collect();

    let mut kept: Vec<LogicalLine> = Vec::with_capacity(lines.len());
    for (line, is_debug) in lines.into_iter().zip(debug) {
        if is_debug {
            report.debug_stripped += 1;
            continue;
        }
        let line = tidy(line);
        if line.spans.iter().any(|s| !s.text.is_empty()) {
            kept.push(line);
        }
    }

    (join_lines(kept), report)
}

/// Trim the line and squeeze runs of blanks inside its code
fn tidy(mut line: LogicalLine) -> LogicalLine {
    for span in line.spans.iter_mut().filter(|s| s.is_code()) {
        span.text = squeeze_blanks(&span.text);
    }
    if let Some(first) = line.spans.first_mut().filter(|s| s.is_code()) {
        first.text = first.text.trim_start().to_string();
    }
    if let Some(last) = line.spans.last_mut().filter(|s| s.is_code()) {
        last.text = last.text.trim_end().to_string();
    }
    line.spans.retain(|s| !s.text.is_empty());
    line
}

fn squeeze_blanks(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut in_blank = false;
    for c in code.chars() {
        if matches!(c, ' ' | '\t' | '\r') {
            if !in_blank {
                out.push(' ');
            }
            in_blank = true;
        } else {
            out.push(c);
            in_blank = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;

    fn run(source: &str, patterns: &[&str]) -> (String, StripReport) {
        let regexes: Vec<Regex> = patterns.iter().map(|p| Regex::new(p).unwrap()).collect();
        let (spans, report) = strip(scan(source).unwrap(), &regexes);
        (render(&spans), report)
    }

    #[test]
    fn test_strip_line_comments() {
        let (out, report) = run("local x = 5 -- this is a comment\nlocal y = 10", &[]);
        assert_eq!(out, "local x = 5\nlocal y = 10");
        assert_eq!(report.comments_removed, 1);
    }

    #[test]
    fn test_preserve_string_with_dashes() {
        let (out, report) = run(r#"local s = "hello -- not a comment""#, &[]);
        assert_eq!(out, r#"local s = "hello -- not a comment""#);
        assert_eq!(report.comments_removed, 0);
    }

    #[test]
    fn test_strip_block_comments() {
        let (out, report) = run("local x = 5 --[[ block\ncomment ]] local y = 10", &[]);
        assert_eq!(out, "local x = 5 local y = 10");
        assert_eq!(report.comments_removed, 1);

        let (out, _) = run("return a--[==[x]==]or b", &[]);
        assert_eq!(out, "return a or b");
    }

    #[test]
    fn test_blank_lines_and_indentation() {
        let source = "\n\nfunction f()\n\t  return   1\n\n  end\n  -- trailing\n";
        let (out, report) = run(source, &[]);
        assert_eq!(out, "function f()\nreturn 1\nend");
        assert_eq!(report.comments_removed, 1);
    }

    #[test]
    fn test_strings_are_not_squeezed() {
        let (out, _) = run("x = 'a    b'  ..  [[\n  c  ]]", &[]);
        assert_eq!(out, "x = 'a    b' .. [[\n  c  ]]");
    }

    #[test]
    fn test_strip_debug_prints() {
        let source = r#"
local x = 5
print("[DEBUG] test")
local y = 10
"#;
        let (out, report) = run(source, &[r#"^\s*print\s*\(\s*"\[DEBUG"#]);
        assert_eq!(out, "local x = 5\nlocal y = 10");
        assert_eq!(report.debug_stripped, 1);
    }

    #[test]
    fn test_debug_pattern_spares_partial_statements() {
        let source = "t = {\nprint(\"[DEBUG]\"),\n}";
        let (out, report) = run(source, &[r#"print\("\[DEBUG"#]);
        assert_eq!(report.debug_stripped, 0);
        assert!(out.contains("[DEBUG]"));
    }
}
