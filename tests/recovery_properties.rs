//! # Property Tests for the Pipeline Invariants
//!
//! Randomized coverage of the frontend's contract: token-stream
//! completeness, position monotonicity, parse-tree fidelity, the recovery
//! guarantee, keyword case-insensitivity, and semantic idempotence.

use proptest::prelude::*;
use sqlint::{analyze, parse, scan, Keyword, ParseTreeNode, Rule, TokenKind};

fn identifier() -> impl Strategy<Value = String> {
    "[a-zA-Z_][a-zA-Z0-9_]{0,8}".prop_filter("not a reserved word", |s| {
        Keyword::lookup(s).is_none()
    })
}

/// Single-token fragments, free of quotes and comment markers so that a
/// space-joined sequence lexes with no diagnostics and no token merging.
fn fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        junk_fragment(),
        Just("SELECT".to_string()),
        Just("CREATE".to_string()),
    ]
}

/// Fragments that exclude statement-start keywords, so recovery regions can
/// only end at a `;` or at end of input.
fn junk_fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        identifier(),
        "[0-9]{1,6}",
        "[0-9]{1,4}\\.[0-9]{1,4}",
        Just("FROM".to_string()),
        Just("WHERE".to_string()),
        Just("AND".to_string()),
        Just("NULL".to_string()),
        Just(",".to_string()),
        Just("(".to_string()),
        Just(")".to_string()),
        Just(";".to_string()),
        Just(".".to_string()),
        Just("*".to_string()),
        Just("+".to_string()),
        Just("-".to_string()),
        Just("/".to_string()),
        Just("%".to_string()),
        Just("=".to_string()),
        Just("<".to_string()),
        Just(">".to_string()),
        Just("<=".to_string()),
        Just(">=".to_string()),
        Just("<>".to_string()),
        Just("!=".to_string()),
        Just("||".to_string()),
    ]
}

fn pre_order_rules(node: &ParseTreeNode<'_>, out: &mut Vec<Rule>) {
    out.push(node.rule);
    for child in &node.children {
        pre_order_rules(child, out);
    }
}

proptest! {
    /// Concatenating every non-EOF lexeme at its reported position, with
    /// nothing but discarded whitespace in the gaps, reproduces the source.
    #[test]
    fn token_stream_completeness(fragments in prop::collection::vec(fragment(), 0..40)) {
        let source = fragments.join(" ");
        let (tokens, diagnostics) = scan(&source);
        prop_assert!(diagnostics.is_empty());

        let mut cursor = 0usize;
        for token in tokens.iter().filter(|t| t.kind != TokenKind::Eof) {
            let start = (token.pos.column - 1) as usize; // single-line input
            prop_assert!(source[cursor..start].chars().all(|c| c == ' '));
            prop_assert_eq!(&source[start..start + token.lexeme.len()], token.lexeme);
            cursor = start + token.lexeme.len();
        }
        prop_assert!(source[cursor..].chars().all(|c| c == ' '));
    }

    /// Scanning any input terminates with exactly one EOF and positions
    /// that never move backwards.
    #[test]
    fn position_monotonicity(source in any::<String>()) {
        let (tokens, _) = scan(&source);
        let eof_count = tokens.iter().filter(|t| t.kind == TokenKind::Eof).count();
        prop_assert_eq!(eof_count, 1);
        prop_assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
        for pair in tokens.windows(2) {
            prop_assert!(pair[0].pos <= pair[1].pos);
        }
    }

    /// For inputs with no diagnostics from any stage, the in-order terminal
    /// leaves of the parse tree equal the non-EOF token stream.
    #[test]
    fn parse_tree_fidelity(
        columns in prop::collection::vec(identifier(), 1..5),
        table in identifier(),
        limit in 1u32..1000,
    ) {
        let source = format!("SELECT {} FROM {} LIMIT {};", columns.join(", "), table, limit);
        let (tokens, lex) = scan(&source);
        prop_assert!(lex.is_empty());
        let (tree, syntax) = parse(&tokens);
        prop_assert!(syntax.is_empty());

        let leaves = tree.terminal_tokens();
        let stream: Vec<_> = tokens.iter().filter(|t| t.kind != TokenKind::Eof).collect();
        prop_assert_eq!(leaves.len(), stream.len());
        for (leaf, token) in leaves.iter().zip(stream.iter()) {
            prop_assert_eq!(leaf.lexeme, token.lexeme);
            prop_assert_eq!(leaf.pos, token.pos);
        }
    }

    /// Panic-mode recovery never manufactures statements: with no
    /// statement-start keyword in the stream to resync on early, the parser
    /// reports at most one statement per `;` plus one trailing statement.
    #[test]
    fn recovery_guarantee(fragments in prop::collection::vec(junk_fragment(), 0..60)) {
        let source = fragments.join(" ");
        let (tokens, _) = scan(&source);
        let (tree, _) = parse(&tokens);
        let semicolons = tokens.iter().filter(|t| t.is_symbol(";")).count();
        let statements = tree.statements().count();
        prop_assert!(
            statements <= semicolons + 1,
            "{} statements for {} terminators in {:?}",
            statements,
            semicolons,
            source
        );
    }

    /// Recovery stops at the first `;` it reaches: an error region holds at
    /// most one terminator, and only as its final token.
    #[test]
    fn recovery_never_skips_past_a_semicolon(
        fragments in prop::collection::vec(fragment(), 0..60),
    ) {
        let source = fragments.join(" ");
        let (tokens, _) = scan(&source);
        let (tree, _) = parse(&tokens);
        for statement in tree.statements().filter(|s| s.is_error()) {
            let semis: Vec<usize> = statement
                .children
                .iter()
                .enumerate()
                .filter(|(_, c)| {
                    c.token.as_ref().is_some_and(|t| t.is_symbol(";"))
                })
                .map(|(i, _)| i)
                .collect();
            prop_assert!(semis.len() <= 1, "error region swallowed {:?}", semis);
            if let Some(&index) = semis.first() {
                prop_assert_eq!(index, statement.children.len() - 1);
            }
        }
    }

    /// Re-casing keywords and identifiers changes preserved lexemes only:
    /// kinds, tree shape, and diagnostics are untouched.
    #[test]
    fn keyword_case_insensitivity(flips in prop::collection::vec(any::<bool>(), 64)) {
        let source = "CREATE TABLE pets (id INT, name VARCHAR(20)); \
                      SELECT name FROM pets WHERE id = 1;";
        let mutated: String = source
            .chars()
            .enumerate()
            .map(|(i, c)| {
                if flips[i % flips.len()] {
                    c.to_ascii_uppercase()
                } else {
                    c.to_ascii_lowercase()
                }
            })
            .collect();

        let (base_tokens, base_lex) = scan(source);
        let (tokens, lex) = scan(&mutated);
        prop_assert_eq!(base_lex.len(), lex.len());
        let base_kinds: Vec<_> = base_tokens.iter().map(|t| t.kind).collect();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        prop_assert_eq!(base_kinds, kinds);

        let (base_tree, base_syntax) = parse(&base_tokens);
        let (tree, syntax) = parse(&tokens);
        prop_assert_eq!(base_syntax.len(), syntax.len());
        let mut base_shape = Vec::new();
        let mut shape = Vec::new();
        pre_order_rules(&base_tree, &mut base_shape);
        pre_order_rules(&tree, &mut shape);
        prop_assert_eq!(base_shape, shape);

        let base_analysis = analyze(base_tree);
        let analysis = analyze(tree);
        let base_faults: Vec<_> = base_analysis
            .diagnostics
            .iter()
            .map(|d| (d.stage, d.pos))
            .collect();
        let faults: Vec<_> = analysis.diagnostics.iter().map(|d| (d.stage, d.pos)).collect();
        prop_assert_eq!(base_faults, faults);
    }

    /// Analyzing the same tree twice from the same starting table state
    /// yields identical outputs.
    #[test]
    fn semantic_idempotence(
        table in identifier(),
        column in identifier(),
        value in 0i64..100_000,
    ) {
        let source = format!(
            "CREATE TABLE {t} ({c} INT); INSERT INTO {t} VALUES ({v}); \
             SELECT {c} FROM {t} WHERE {c} > {v};",
            t = table,
            c = column,
            v = value
        );
        let (tokens, _) = scan(&source);
        let (tree, _) = parse(&tokens);
        let first = analyze(tree.clone());
        let second = analyze(tree);
        prop_assert_eq!(first.diagnostics, second.diagnostics);
        prop_assert_eq!(first.symbols, second.symbols);
        prop_assert_eq!(first.tree, second.tree);
    }
}
