//! # Compilation Driver
//!
//! Thin composition of the three stages. `compile` runs scan → parse →
//! analyze over one source buffer and returns everything the stages
//! produced: the token stream, the annotated parse tree, the final symbol
//! table, and all diagnostics grouped by stage (lexical, then syntactic,
//! then semantic), each group in position order. The driver owns no
//! analysis logic of its own.

use crate::diag::{Diagnostic, Stage};
use crate::lexer;
use crate::parser;
use crate::semantic::Analyzer;
use crate::symbols::SymbolTable;
use crate::token::Token;
use crate::tree::ParseTreeNode;

pub struct CompileResult<'a> {
    pub tokens: Vec<Token<'a>>,
    pub tree: ParseTreeNode<'a>,
    pub symbols: SymbolTable,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileResult<'_> {
    /// A run succeeds when every stage's diagnostic list is empty.
    pub fn success(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics_for(&self, stage: Stage) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.stage == stage)
    }
}

/// Compile one source buffer through all three stages.
pub fn compile(text: &str) -> CompileResult<'_> {
    let span = tracing::debug_span!("compile", bytes = text.len());
    let _enter = span.enter();

    let (tokens, mut diagnostics) = lexer::scan(text);
    let (tree, syntax) = parser::parse(&tokens);
    diagnostics.extend(syntax);

    let analysis = Analyzer::new().analyze(tree);
    diagnostics.extend(analysis.diagnostics);

    tracing::debug!(
        statements = analysis.tree.statements().count(),
        diagnostics = diagnostics.len(),
        "compilation finished"
    );
    CompileResult {
        tokens,
        tree: analysis.tree,
        symbols: analysis.symbols,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_unit_succeeds() {
        let result = compile("CREATE TABLE t (a INT); SELECT a FROM t;");
        assert!(result.success());
        assert_eq!(result.symbols.len(), 1);
    }

    #[test]
    fn diagnostics_are_grouped_by_stage() {
        // one lexical fault, one syntactic fault, one semantic fault
        let result = compile("SELECT @ x FROM t;\nSLECT 1;\nDROP TABLE ghost;");
        assert!(!result.success());
        let stages: Vec<Stage> = result.diagnostics.iter().map(|d| d.stage).collect();
        let mut sorted = stages.clone();
        sorted.sort();
        assert_eq!(stages, sorted, "stage groups must be in pipeline order");
        assert_eq!(result.diagnostics_for(Stage::Lexical).count(), 1);
        assert_eq!(result.diagnostics_for(Stage::Syntax).count(), 1);
        assert!(result.diagnostics_for(Stage::Semantic).count() >= 1);
    }
}
