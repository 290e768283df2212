use std::collections::HashSet;

use luaguard_core::lexer::{is_keyword, tokenize, TokenKind};
use luaguard_core::names::{Namespace, ReservedWords};
use luaguard_core::renamer::rename_identifiers;
use luaguard_core::string_table::unescape;
use luaguard_core::{render, scan, LanguageVariant, ObfuscationRequest, Pipeline, Preset, RenameStrength, Seed};
use proptest::prelude::*;
use regex::Regex;

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,6}".prop_filter("keyword", |name| !is_keyword(name))
}

fn lua_fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        ident(),
        "[0-9]{1,4}",
        prop::sample::select(vec![
            " ", "\n", "\t", "(", ")", "{", "}", "]", "=", "==", "..", ",", ".", ":",
        ])
        .prop_map(str::to_string),
        "[a-z -]{0,8}".prop_map(|s| format!("\"{s}\"")),
        "[a-z \\\\]{0,8}".prop_map(|s| format!("'{}'", s.replace('\\', "\\\\"))),
        "[a-z\n ]{0,8}".prop_map(|s| format!("[[{s}]]")),
        "[a-z\n ]{0,8}".prop_map(|s| format!("[==[{s}]]]==]")),
        "[a-z '\"]{0,8}".prop_map(|s| format!("-- {s}\n")),
        "[a-z\n '\"]{0,8}".prop_map(|s| format!("--[[{s}]]")),
        "[a-z ]{0,6}".prop_map(|s| format!("`{s} {{x}}`")),
    ]
}

fn lua_source() -> impl Strategy<Value = String> {
    prop::collection::vec(lua_fragment(), 0..24).prop_map(|parts| parts.concat())
}

fn tokens_named(code: &str, name: &str) -> usize {
    tokenize(code)
        .into_iter()
        .filter(|t| t.kind == TokenKind::Ident && t.text == name)
        .count()
}

/// Each table slot of an output, decoded back to bytes
fn table_entries(output: &str) -> Vec<Vec<u8>> {
    let encrypted = Regex::new(r"\[(\d+)\] = _\w+\(\{([0-9, ]*)\}, (\d+)\)").unwrap();
    let plain = Regex::new(r#"\[(\d+)\] = "((?:[^"\\]|\\.)*)""#).unwrap();
    let table = output
        .lines()
        .find(|l| l.starts_with("local _") && l.contains(" = {"))
        .unwrap_or_default();
    let decoded: Vec<Vec<u8>> = encrypted
        .captures_iter(table)
        .map(|c| {
            let key: u8 = c[3].parse().unwrap();
            c[2].split(", ")
                .filter(|s| !s.is_empty())
                .map(|b| b.parse::<u8>().unwrap() ^ key)
                .collect()
        })
        .collect();
    if !decoded.is_empty() {
        return decoded;
    }
    plain.captures_iter(table).map(|c| unescape(&c[2])).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn scanned_spans_reconstruct_the_source(source in lua_source()) {
        let spans = scan(&source).unwrap();
        prop_assert_eq!(render(&spans), source.clone());
        let mut cursor = 0;
        for span in &spans {
            prop_assert_eq!(span.start, cursor);
            prop_assert_eq!(&source[span.start..span.end], span.text.as_str());
            cursor = span.end;
        }
        prop_assert_eq!(cursor, source.len());
    }

    #[test]
    fn scanning_never_loses_text(source in "[a-z\"'`\\\\\\[\\]=\\-{} \n]{0,48}") {
        if let Ok(spans) = scan(&source) {
            prop_assert_eq!(render(&spans), source);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn string_table_round_trips_at_every_preset(
        contents in prop::collection::vec(
            prop::collection::vec(
                prop::sample::select(vec!["a", "hello", " ", "\\n", "\\t", "\\\"", "\\65", "\\x41", "é"]),
                0..5,
            )
            .prop_map(|parts| parts.concat()),
            1..6,
        ),
        seed in any::<u64>(),
    ) {
        let source: String = contents.iter().map(|c| format!("print(\"{c}\")\n")).collect();
        let expected: Vec<Vec<u8>> = contents.iter().map(|c| unescape(c)).collect();
        let pipeline = Pipeline::with_defaults();
        for preset in Preset::ALL {
            for variant in LanguageVariant::ALL {
                let request = ObfuscationRequest::new(source.clone(), variant, preset);
                let result = pipeline.obfuscate_with_seed(&request, &Seed::from_u64(seed)).unwrap();
                prop_assert_eq!(&table_entries(&result.output_code), &expected, "{} / {}", preset, variant);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn renaming_is_injective(
        names in prop::collection::hash_set(ident(), 1..40),
        strength in prop::sample::select(vec![RenameStrength::Low, RenameStrength::Medium, RenameStrength::High]),
        seed in any::<u64>(),
    ) {
        let reserved = ReservedWords::default();
        let mut source: String = names.iter().enumerate().map(|(i, n)| format!("local {n} = {i}\n")).collect();
        source.push_str(&format!("print({})", names.iter().cloned().collect::<Vec<_>>().join(", ")));

        let spans = scan(&source).unwrap();
        let mut ns = Namespace::new(&reserved, &spans);
        let mut rng = Seed::from_u64(seed).create_rng();
        let (spans, bindings) = rename_identifiers(spans, strength, &mut ns, &mut rng);
        let output = render(&spans);

        let renamable: HashSet<&str> = names.iter().map(String::as_str).filter(|n| !reserved.contains(n)).collect();
        let originals: HashSet<&str> = bindings.iter().map(|b| b.original_name.as_str()).collect();
        let generated: HashSet<&str> = bindings.iter().map(|b| b.generated_name.as_str()).collect();
        prop_assert_eq!(&originals, &renamable);
        prop_assert_eq!(generated.len(), bindings.len());
        for name in &generated {
            prop_assert!(!names.contains(*name));
            prop_assert!(!reserved.contains(name));
            prop_assert_eq!(tokens_named(&output, name), 2);
        }
        for name in &renamable {
            prop_assert_eq!(tokens_named(&output, name), 0);
        }
    }

    #[test]
    fn reserved_words_are_never_renamed(
        globals in prop::collection::vec(
            prop::sample::select(vec!["print", "game", "string", "math", "self", "pairs", "table", "task"]),
            1..6,
        ),
        locals in prop::collection::vec(ident(), 0..6),
        seed in any::<u64>(),
    ) {
        let reserved = ReservedWords::default();
        let mut source = String::new();
        for (i, g) in globals.iter().enumerate() {
            let l = locals.get(i).map_or("v", String::as_str);
            source.push_str(&format!("local {g} = {g}\nlocal {l} = {g}.x\nfunction f({g}, {l}) return {g}({l}) end\n"));
        }

        for preset in [Preset::Weak, Preset::Medium, Preset::Strong] {
            let request = ObfuscationRequest::new(source.clone(), LanguageVariant::Luau, preset);
            let result = Pipeline::with_defaults().obfuscate_with_seed(&request, &Seed::from_u64(seed)).unwrap();
            for word in &globals {
                prop_assert!(reserved.contains(word));
                prop_assert_eq!(tokens_named(&result.output_code, word), tokens_named(&source, word));
            }
        }
    }
}
