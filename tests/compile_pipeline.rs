//! # End-to-End Pipeline Tests
//!
//! Integration coverage for the three-stage frontend through its public
//! API. Tests are organized by stage interaction and verify observable
//! behavior only: token streams, tree shapes, diagnostic texts and
//! positions, and symbol-table state.

use sqlint::{
    analyze, compile, parse, scan, Analyzer, ColumnDef, Keyword, Position, Rule, SqlType, Stage,
    SymbolTable, TableDef, TokenKind,
};

/// A schema with a `users` and a `products` table, for statements that
/// reference pre-existing objects.
fn seeded_symbols() -> SymbolTable {
    let mut symbols = SymbolTable::new();
    symbols.define(TableDef::new(
        "users",
        vec![
            ColumnDef::new("id", SqlType::Integer, "INT", 0),
            ColumnDef::new("name", SqlType::Text, "VARCHAR", 1),
        ],
        Position::new(1, 1),
    ));
    symbols.define(TableDef::new(
        "products",
        vec![
            ColumnDef::new("id", SqlType::Integer, "INT", 0),
            ColumnDef::new("price", SqlType::Float, "FLOAT", 1),
        ],
        Position::new(1, 1),
    ));
    symbols
}

mod scenario_tests {
    use super::*;

    #[test]
    fn simple_select_parses_to_expected_shape() {
        let source = "SELECT * FROM users;";
        let (tokens, lex) = scan(source);
        assert!(lex.is_empty());
        let (tree, syntax) = parse(&tokens);
        assert!(syntax.is_empty());

        assert_eq!(tree.rule, Rule::Program);
        assert_eq!(tree.statements().count(), 1);
        let stmt = tree.statements().next().unwrap();
        assert_eq!(stmt.rule, Rule::SelectStmt);
        assert!(stmt.keyword_child(Keyword::Select).is_some());
        assert!(stmt.find(Rule::SelectList).is_some());
        assert!(stmt.find(Rule::FromClause).is_some());
        let semicolon = stmt.children.last().unwrap();
        assert!(semicolon.token.as_ref().unwrap().is_symbol(";"));

        let result = Analyzer::with_symbols(seeded_symbols()).analyze(tree);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn malformed_float_reports_lexical_error_and_still_parses() {
        let source = "SELECT price * 1.2.5 FROM products;";
        let (tokens, lex) = scan(source);
        assert_eq!(lex.len(), 1);
        assert!(lex[0]
            .to_string()
            .contains("invalid number: multiple decimal points"));
        // fault is the second dot
        assert_eq!(lex[0].pos, Position::new(1, 19));

        let (tree, syntax) = parse(&tokens);
        assert!(syntax.is_empty(), "{:?}", syntax);
        assert_eq!(tree.statements().next().unwrap().rule, Rule::SelectStmt);
    }

    #[test]
    fn misspelled_statement_keyword_recovers_at_semicolon() {
        let source = "SLECT id FROM users;";
        let (tokens, lex) = scan(source);
        assert!(lex.is_empty(), "SLECT must lex as a plain identifier");

        let (tree, syntax) = parse(&tokens);
        assert_eq!(syntax.len(), 1);
        assert!(syntax[0].to_string().contains("Unknown statement"));
        assert!(syntax[0].to_string().contains("Did you mean 'SELECT'?"));

        let statements: Vec<_> = tree.statements().collect();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].is_error());
    }

    #[test]
    fn missing_from_does_not_break_the_next_statement() {
        let source = "SELECT * WHERE id = 10; DROP TABLE Users;";
        let (tokens, _) = scan(source);
        let (tree, syntax) = parse(&tokens);
        assert_eq!(syntax.len(), 1);
        assert!(syntax[0]
            .to_string()
            .contains("Missing FROM clause before WHERE"));

        let statements: Vec<_> = tree.statements().collect();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].rule, Rule::SelectStmt);
        assert_eq!(statements[1].rule, Rule::DropStmt);

        // With `Users` pre-declared, the DROP is semantically clean.
        let result = Analyzer::with_symbols(seeded_symbols()).analyze(tree);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        assert!(result.symbols.resolve("users").is_none());
    }

    #[test]
    fn insert_type_mismatch_is_the_only_diagnostic() {
        let result = compile("CREATE TABLE T (a INT); INSERT INTO T VALUES ('x');");
        assert_eq!(result.diagnostics_for(Stage::Lexical).count(), 0);
        assert_eq!(result.diagnostics_for(Stage::Syntax).count(), 0);
        let semantic: Vec<_> = result.diagnostics_for(Stage::Semantic).collect();
        assert_eq!(semantic.len(), 1);
        let message = semantic[0].to_string();
        assert!(message.contains("declared INT"), "{}", message);
        assert!(message.contains("STRING literal provided"), "{}", message);
    }

    #[test]
    fn doubled_quote_resolves_to_single_quote() {
        let source = "SELECT name = 'O''Brien' FROM e;";
        let (tokens, lex) = scan(source);
        assert!(lex.is_empty());
        let strings: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::String)
            .collect();
        assert_eq!(strings.len(), 1);
        assert_eq!(strings[0].text(), Some("O'Brien"));
        assert_eq!(strings[0].text().unwrap().len(), 7);

        let (tree, syntax) = parse(&tokens);
        assert!(syntax.is_empty(), "{:?}", syntax);

        let mut symbols = SymbolTable::new();
        symbols.define(TableDef::new(
            "e",
            vec![ColumnDef::new("name", SqlType::Text, "TEXT", 0)],
            Position::new(1, 1),
        ));
        let result = Analyzer::with_symbols(symbols).analyze(tree);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }
}

mod pipeline_tests {
    use super::*;

    #[test]
    fn all_three_stages_report_independently() {
        let result = compile(
            "SELECT @ x FROM nowhere;\n\
             SLECT 1;\n\
             CREATE TABLE t (a INT); DROP TABLE ghost;",
        );
        assert!(!result.success());
        assert_eq!(result.diagnostics_for(Stage::Lexical).count(), 1);
        assert_eq!(result.diagnostics_for(Stage::Syntax).count(), 1);
        assert_eq!(result.diagnostics_for(Stage::Semantic).count(), 2);
        // the clean CREATE still registered its table
        assert!(result.symbols.resolve("t").is_some());
    }

    #[test]
    fn rendered_diagnostics_follow_the_fixed_shape() {
        let result = compile("DROP TABLE ghost;");
        assert_eq!(result.diagnostics.len(), 1);
        let rendered = result.diagnostics[0].to_string();
        assert!(
            rendered.starts_with("Semantic Error at line 1, column "),
            "{}",
            rendered
        );
    }

    #[test]
    fn empty_input_compiles_to_empty_program() {
        let result = compile("");
        assert!(result.success());
        assert_eq!(result.tree.statements().count(), 0);
        assert_eq!(result.tokens.len(), 1);
        assert_eq!(result.tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn trailing_statement_without_semicolon() {
        let result = compile("CREATE TABLE t (a INT); SELECT a FROM t");
        assert!(result.success(), "{:?}", result.diagnostics);
        assert_eq!(result.tree.statements().count(), 2);
    }

    #[test]
    fn symbol_table_threads_through_the_whole_unit() {
        let result = compile(
            "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(50) NOT NULL);\n\
             CREATE VIEW names AS SELECT name FROM users;\n\
             INSERT INTO users (id, name) VALUES (1, 'Ada');\n\
             SELECT name FROM names;",
        );
        assert!(result.success(), "{:?}", result.diagnostics);
        assert_eq!(result.symbols.len(), 2);
        assert!(result.symbols.resolve("names").unwrap().is_view);
    }

    #[test]
    fn comments_and_crlf_are_transparent() {
        let result = compile(
            "-- leading comment\r\nCREATE TABLE t (a INT);\r\n## another comment\nSELECT a FROM t;",
        );
        assert!(result.success(), "{:?}", result.diagnostics);
    }

    #[test]
    fn annotated_tree_survives_to_the_driver_result() {
        let result = compile("CREATE TABLE t (a INT); SELECT a + 1 FROM t;");
        assert!(result.success());
        let select = result.tree.statements().last().unwrap();
        let expr = select
            .find(Rule::SelectList)
            .unwrap()
            .find(Rule::Expression)
            .unwrap();
        assert_eq!(expr.ty, Some(SqlType::Integer));
    }
}

mod recovery_tests {
    use super::*;

    #[test]
    fn one_statement_per_error_region() {
        let source = "CREATE TABLE t (a INT); BOGUS tokens here; SELECT a FROM t; ALSO bad;";
        let result = compile(source);
        let statements: Vec<_> = result.tree.statements().collect();
        assert_eq!(statements.len(), 4);
        assert!(statements[1].is_error());
        assert!(statements[3].is_error());
        assert_eq!(statements[2].rule, Rule::SelectStmt);
        assert_eq!(result.diagnostics_for(Stage::Syntax).count(), 2);
    }

    #[test]
    fn lexical_recovery_feeds_the_parser_a_usable_stream() {
        // the stray `!` is dropped with a diagnostic; everything else parses
        let result = compile("CREATE TABLE t (a INT); SELECT a ! FROM t;");
        assert_eq!(result.diagnostics_for(Stage::Lexical).count(), 1);
        assert_eq!(result.diagnostics_for(Stage::Syntax).count(), 0);
        assert_eq!(result.diagnostics_for(Stage::Semantic).count(), 0);
    }

    #[test]
    fn unclosed_string_synthesizes_a_value_and_parses() {
        let (tokens, lex) = scan("SELECT 'abc");
        assert_eq!(lex.len(), 1);
        assert!(lex[0].to_string().contains("unclosed string literal"));
        let (tree, syntax) = parse(&tokens);
        assert!(syntax.is_empty());
        assert_eq!(tree.statements().count(), 1);
    }

    #[test]
    fn error_subtree_does_not_reach_the_analyzer() {
        let result = compile("INSERT INTO; CREATE TABLE t (a INT);");
        assert_eq!(result.diagnostics_for(Stage::Syntax).count(), 1);
        assert_eq!(result.diagnostics_for(Stage::Semantic).count(), 0);
        assert!(result.symbols.resolve("t").is_some());
    }

    #[test]
    fn consecutive_semicolons_are_harmless() {
        let result = compile(";;CREATE TABLE t (a INT);;SELECT a FROM t;;");
        assert!(result.success(), "{:?}", result.diagnostics);
        assert_eq!(result.tree.statements().count(), 2);
    }

    #[test]
    fn analysis_continues_after_semantic_errors() {
        let result = compile(
            "CREATE TABLE t (a INT);\n\
             INSERT INTO t VALUES ('x');\n\
             INSERT INTO t VALUES (1, 2);\n\
             SELECT missing FROM t;",
        );
        let semantic: Vec<_> = result.diagnostics_for(Stage::Semantic).collect();
        assert_eq!(semantic.len(), 3, "{:?}", semantic);
        // each fault is line-independent
        let lines: Vec<u32> = semantic.iter().map(|d| d.pos.line).collect();
        assert_eq!(lines, vec![2, 3, 4]);
    }
}

mod annotation_tests {
    use super::*;

    #[test]
    fn literal_and_column_types_are_inferred() {
        let result = compile(
            "CREATE TABLE m (i INT, f FLOAT, s TEXT, b BOOLEAN);\n\
             SELECT i, f, s, b, i + f, s || s, i > 0 FROM m;",
        );
        assert!(result.success(), "{:?}", result.diagnostics);
        let select = result.tree.statements().last().unwrap();
        let list = select.find(Rule::SelectList).unwrap();
        let types: Vec<Option<SqlType>> = list
            .children
            .iter()
            .filter(|c| c.rule != Rule::Terminal)
            .map(|c| c.ty)
            .collect();
        assert_eq!(
            types,
            vec![
                Some(SqlType::Integer),
                Some(SqlType::Float),
                Some(SqlType::Text),
                Some(SqlType::Boolean),
                Some(SqlType::Float),
                Some(SqlType::Text),
                Some(SqlType::Boolean),
            ]
        );
    }

    #[test]
    fn unresolved_references_stay_unknown_without_cascades() {
        let result = compile("CREATE TABLE t (a INT); SELECT missing + 1 FROM t;");
        let semantic: Vec<_> = result.diagnostics_for(Stage::Semantic).collect();
        assert_eq!(semantic.len(), 1, "arithmetic over UNKNOWN must stay silent");
        assert!(semantic[0].to_string().contains("Column 'missing'"));
    }

    #[test]
    fn reanalysis_is_idempotent() {
        let (tokens, _) = scan("CREATE TABLE t (a INT); SELECT a FROM t;");
        let (tree, _) = parse(&tokens);
        let first = analyze(tree.clone());
        let second = analyze(tree);
        assert_eq!(first.diagnostics, second.diagnostics);
        assert_eq!(first.symbols, second.symbols);
        assert_eq!(first.tree, second.tree);
    }
}
