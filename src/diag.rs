//! # Diagnostics
//!
//! Every fault found by any stage of the pipeline becomes a [`Diagnostic`]
//! value. Stages never raise across their public boundary: the lexer, parser
//! and semantic analyzer each collect diagnostics into a `Vec` and return
//! partial output alongside them.
//!
//! The rendered form is part of the observable contract:
//!
//! ```text
//! Lexical Error at line 3, column 14: unclosed string literal
//! Syntax Error at line 1, column 8: Expected 'FROM' but found 'WHERE'
//! Semantic Error at line 2, column 1: Table 'users' does not exist
//! ```
//!
//! A diagnostic may carry an expected/found pair (syntax errors) and a
//! keyword suggestion (`Did you mean 'SELECT'?`) computed lazily when an
//! identifier is rejected where a keyword was required.

use crate::token::Position;
use std::fmt;

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Lexical,
    Syntax,
    Semantic,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Lexical => write!(f, "Lexical"),
            Stage::Syntax => write!(f, "Syntax"),
            Stage::Semantic => write!(f, "Semantic"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub stage: Stage,
    pub severity: Severity,
    pub message: String,
    pub pos: Position,
    pub expected: Option<String>,
    pub found: Option<String>,
    pub suggestion: Option<&'static str>,
}

impl Diagnostic {
    pub fn error(stage: Stage, pos: Position, message: impl Into<String>) -> Self {
        Self {
            stage,
            severity: Severity::Error,
            message: message.into(),
            pos,
            expected: None,
            found: None,
            suggestion: None,
        }
    }

    pub fn warning(stage: Stage, pos: Position, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(stage, pos, message)
        }
    }

    pub fn with_expected_found(
        mut self,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        self.expected = Some(expected.into());
        self.found = Some(found.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: Option<&'static str>) -> Self {
        self.suggestion = suggestion;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };
        write!(
            f,
            "{} {} at line {}, column {}: {}",
            self.stage, severity, self.pos.line, self.pos.column, self.message
        )?;
        if let Some(suggestion) = self.suggestion {
            write!(f, " Did you mean '{}'?", suggestion)?;
        }
        Ok(())
    }
}
