//! # Parse Tree
//!
//! One homogeneous node type covers the whole grammar: a [`Rule`] tag, an
//! ordered child vector, an optional originating token for leaves, and a
//! type slot the semantic stage fills in exactly once. Children order is
//! significant and mirrors the grammar production; every token the parser
//! consumes appears as a leaf somewhere in the tree, so the in-order leaves
//! of a clean parse reproduce the token stream.
//!
//! A node with rule [`Rule::Error`] marks a recovered region; its children
//! are the tokens panic-mode recovery skipped. Error subtrees are opaque to
//! the semantic stage and excluded from leaf traversals.

use crate::symbols::SqlType;
use crate::token::{Position, Token, TokenKind};

/// Grammar production names. Leaves use `Terminal` (any consumed token) or
/// `Literal` (constant in expression position).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Program,
    SelectStmt,
    InsertStmt,
    UpdateStmt,
    DeleteStmt,
    CreateTableStmt,
    CreateViewStmt,
    CreateIndexStmt,
    CreateDatabaseStmt,
    AlterTableStmt,
    DropStmt,
    SelectList,
    SelectItem,
    FromClause,
    TableRef,
    Join,
    WhereClause,
    GroupByClause,
    HavingClause,
    OrderByClause,
    SortItem,
    LimitClause,
    ColumnList,
    ColumnDef,
    DataType,
    PrimaryKey,
    ForeignKey,
    UniqueConstraint,
    NotNullConstraint,
    DefaultConstraint,
    CheckConstraint,
    Assignment,
    ValueList,
    Row,
    Or,
    And,
    Not,
    Comparison,
    Between,
    InList,
    Like,
    IsNull,
    Expression,
    Unary,
    Paren,
    Subquery,
    FunctionCall,
    ColumnRef,
    Literal,
    Terminal,
    Error,
}

impl Rule {
    pub fn is_statement(self) -> bool {
        matches!(
            self,
            Rule::SelectStmt
                | Rule::InsertStmt
                | Rule::UpdateStmt
                | Rule::DeleteStmt
                | Rule::CreateTableStmt
                | Rule::CreateViewStmt
                | Rule::CreateIndexStmt
                | Rule::CreateDatabaseStmt
                | Rule::AlterTableStmt
                | Rule::DropStmt
                | Rule::Error
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseTreeNode<'a> {
    pub rule: Rule,
    pub token: Option<Token<'a>>,
    pub children: Vec<ParseTreeNode<'a>>,
    pub pos: Position,
    /// Written at most once, by the semantic stage.
    pub ty: Option<SqlType>,
}

impl<'a> ParseTreeNode<'a> {
    pub fn new(rule: Rule, pos: Position) -> Self {
        Self {
            rule,
            token: None,
            children: Vec::new(),
            pos,
            ty: None,
        }
    }

    pub fn terminal(token: Token<'a>) -> Self {
        let pos = token.pos;
        Self {
            rule: Rule::Terminal,
            token: Some(token),
            children: Vec::new(),
            pos,
            ty: None,
        }
    }

    pub fn literal(token: Token<'a>) -> Self {
        Self {
            rule: Rule::Literal,
            ..Self::terminal(token)
        }
    }

    pub fn error(pos: Position) -> Self {
        Self::new(Rule::Error, pos)
    }

    pub fn push(&mut self, child: ParseTreeNode<'a>) {
        self.children.push(child);
    }

    pub fn is_error(&self) -> bool {
        self.rule == Rule::Error
    }

    /// First direct child with the given rule.
    pub fn find(&self, rule: Rule) -> Option<&ParseTreeNode<'a>> {
        self.children.iter().find(|c| c.rule == rule)
    }

    pub fn find_mut(&mut self, rule: Rule) -> Option<&mut ParseTreeNode<'a>> {
        self.children.iter_mut().find(|c| c.rule == rule)
    }

    /// Direct children with the given rule.
    pub fn children_with(&self, rule: Rule) -> impl Iterator<Item = &ParseTreeNode<'a>> {
        self.children.iter().filter(move |c| c.rule == rule)
    }

    /// Statement children of a `Program` node (separator terminals skipped).
    pub fn statements(&self) -> impl Iterator<Item = &ParseTreeNode<'a>> {
        self.children.iter().filter(|c| c.rule.is_statement())
    }

    /// `nth` identifier-kinded terminal among direct children. DDL shapes
    /// address their names this way (table before column, and so on).
    pub fn ident_child(&self, nth: usize) -> Option<&Token<'a>> {
        self.children
            .iter()
            .filter_map(|c| match (&c.rule, &c.token) {
                (Rule::Terminal, Some(t)) if t.kind == TokenKind::Identifier => Some(t),
                _ => None,
            })
            .nth(nth)
    }

    /// Direct-child terminal holding the given keyword, if present.
    pub fn keyword_child(&self, keyword: crate::token::Keyword) -> Option<&Token<'a>> {
        self.children.iter().find_map(|c| match &c.token {
            Some(t) if c.rule == Rule::Terminal && t.is_keyword(keyword) => Some(t),
            _ => None,
        })
    }

    /// In-order token-bearing leaves, skipping subtrees rooted at `Error`.
    pub fn terminal_tokens(&self) -> Vec<&Token<'a>> {
        let mut out = Vec::new();
        self.collect_terminals(&mut out);
        out
    }

    fn collect_terminals<'n>(&'n self, out: &mut Vec<&'n Token<'a>>) {
        if self.is_error() {
            return;
        }
        if let Some(token) = &self.token {
            out.push(token);
        }
        for child in &self.children {
            child.collect_terminals(out);
        }
    }
}
