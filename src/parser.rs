//! # SQL Parser - Recursive Descent with Panic-Mode Recovery
//!
//! Consumes the token stream and derives one `Program` tree whose children
//! are statements, some possibly `Error`. Statement-level parsing is plain
//! recursive descent; conditions and arithmetic use a precedence ladder
//! (lowest to highest):
//!
//! | Level | Operators |
//! |-------|-----------|
//! | 1 | OR |
//! | 2 | AND |
//! | 3 | NOT (prefix) |
//! | 4 | =, <>, !=, <, >, <=, >=, BETWEEN, IN, LIKE, IS [NOT] NULL |
//! | 5 | +, -, \|\| (binary) |
//! | 6 | *, /, % |
//! | 7 | +, - (unary) |
//! | 8 | function call, literal, column, parentheses |
//!
//! All binary operators associate left. A bare expression is accepted as a
//! condition (boolean columns, `NOT active`): the parser tries the
//! comparison suffix first and demotes to expression-as-condition when no
//! comparison operator follows. `BETWEEN a AND b` consumes its `AND` as a
//! delimiter, not a boolean operator.
//!
//! ## Error Recovery
//!
//! On a mismatch the parser records a `"Expected X but found Y"` diagnostic,
//! unwinds to the statement loop, and resynchronizes on a fixed sentinel
//! set: a `;` (consumed) or one of SELECT, INSERT, UPDATE, DELETE, CREATE,
//! ALTER, DROP (not consumed). The whole recovered region becomes an
//! `Error` node holding the skipped tokens, so positions survive for later
//! inspection. A missing FROM before WHERE/GROUP/HAVING/ORDER/LIMIT is
//! reported in place and leaves an `Error` node in the FROM slot while the
//! remaining clauses still parse.
//!
//! When an identifier is rejected where a keyword was required and its
//! upper-cased form sits within edit distance 2 of a reserved word, the
//! diagnostic carries a `Did you mean` suggestion.
//!
//! Every consumed token is wrapped in a `Terminal` (or `Literal`) leaf, so
//! for a clean parse the in-order leaves of the tree reproduce the non-EOF
//! token stream exactly.

use crate::diag::{Diagnostic, Stage};
use crate::suggest::closest_keyword;
use crate::token::{Keyword, Position, Token, TokenKind};
use crate::tree::{ParseTreeNode, Rule};
use eyre::{eyre, Report, Result};


/// Statement keywords forming the fixed panic-mode resync set.
const STATEMENT_START: [Keyword; 7] = [
    Keyword::Select,
    Keyword::Insert,
    Keyword::Update,
    Keyword::Delete,
    Keyword::Create,
    Keyword::Alter,
    Keyword::Drop,
];

/// Parse a token stream into a `Program` tree plus syntactic diagnostics.
pub fn parse<'a>(tokens: &[Token<'a>]) -> (ParseTreeNode<'a>, Vec<Diagnostic>) {
    Parser::new(tokens).parse_program()
}

pub struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'t, 'a> Parser<'t, 'a> {
    pub fn new(tokens: &'t [Token<'a>]) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn parse_program(mut self) -> (ParseTreeNode<'a>, Vec<Diagnostic>) {
        let start = self
            .tokens
            .first()
            .map(|t| t.pos)
            .unwrap_or(Position::new(1, 1));
        let mut program = ParseTreeNode::new(Rule::Program, start);

        while !self.at_end() {
            if self.check_symbol(";") {
                program.push(ParseTreeNode::terminal(self.advance()));
                continue;
            }
            let stmt_start = self.pos;
            match self.parse_statement() {
                Ok(mut stmt) => {
                    if self.check_symbol(";") {
                        stmt.push(ParseTreeNode::terminal(self.advance()));
                    } else if !self.at_end() {
                        // A statement only ends at `;` or EOF. Absorb the
                        // leftovers into the statement's error region so the
                        // next statement starts on a terminator boundary.
                        let _ = self.expected("';'");
                        let region = self.recover_to_terminator();
                        stmt.push(region);
                    }
                    program.push(stmt);
                }
                Err(_) => program.push(self.recover_from(stmt_start)),
            }
        }

        (program, self.diagnostics)
    }

    // ==================== Cursor helpers ====================

    fn current(&self) -> &Token<'a> {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self, offset: usize) -> Option<&Token<'a>> {
        self.tokens.get(self.pos + offset)
    }

    fn at_end(&self) -> bool {
        self.tokens.is_empty() || self.current().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Token<'a> {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.current().is_keyword(keyword)
    }

    fn check_symbol(&self, symbol: &str) -> bool {
        self.current().is_symbol(symbol)
    }

    /// Consume the current token into `node` as a terminal leaf.
    fn take(&mut self, node: &mut ParseTreeNode<'a>) {
        let token = self.advance();
        node.push(ParseTreeNode::terminal(token));
    }

    fn consume_keyword(&mut self, node: &mut ParseTreeNode<'a>, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.take(node);
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, node: &mut ParseTreeNode<'a>, keyword: Keyword) -> Result<()> {
        if self.check_keyword(keyword) {
            self.take(node);
            Ok(())
        } else {
            Err(self.expected(&format!("'{}'", keyword.as_str())))
        }
    }

    fn expect_symbol(&mut self, node: &mut ParseTreeNode<'a>, symbol: &str) -> Result<()> {
        if self.check_symbol(symbol) {
            self.take(node);
            Ok(())
        } else {
            Err(self.expected(&format!("'{}'", symbol)))
        }
    }

    fn expect_identifier(&mut self, node: &mut ParseTreeNode<'a>) -> Result<Token<'a>> {
        if self.current().kind == TokenKind::Identifier {
            let token = self.advance();
            node.push(ParseTreeNode::terminal(token.clone()));
            Ok(token)
        } else {
            Err(self.expected("an identifier"))
        }
    }

    // ==================== Diagnostics & recovery ====================

    fn expected(&mut self, what: &str) -> Report {
        let token = self.current();
        let found = token.describe();
        let suggestion = match token.kind {
            TokenKind::Identifier => closest_keyword(token.lexeme),
            _ => None,
        };
        let diagnostic = Diagnostic::error(
            Stage::Syntax,
            token.pos,
            format!("Expected {} but found {}", what, found),
        )
        .with_expected_found(what, found)
        .with_suggestion(suggestion);
        self.diagnostics.push(diagnostic);
        eyre!("expected {}", what)
    }

    fn unknown_statement(&mut self) -> Report {
        let token = self.current();
        let found = token.describe();
        let suggestion = match token.kind {
            TokenKind::Identifier => closest_keyword(token.lexeme),
            _ => None,
        };
        let diagnostic = Diagnostic::error(
            Stage::Syntax,
            token.pos,
            format!("Unknown statement {}", found),
        )
        .with_suggestion(suggestion);
        self.diagnostics.push(diagnostic);
        eyre!("unknown statement")
    }

    /// Panic-mode resync. The recovered region runs from the failed
    /// statement's first token up to (and including) the next `;`, or up to
    /// a statement-start keyword, which is left for the next iteration.
    fn recover_from(&mut self, stmt_start: usize) -> ParseTreeNode<'a> {
        let pos = self.tokens[stmt_start.min(self.tokens.len() - 1)].pos;
        tracing::debug!(line = pos.line, column = pos.column, "panic-mode resync");
        let mut node = ParseTreeNode::error(pos);

        for token in &self.tokens[stmt_start..self.pos] {
            node.push(ParseTreeNode::terminal(token.clone()));
        }
        // A statement dispatch that consumed nothing must not spin.
        if self.pos == stmt_start && !self.at_end() {
            node.push(ParseTreeNode::terminal(self.advance()));
        }

        while !self.at_end() {
            if self.check_symbol(";") {
                node.push(ParseTreeNode::terminal(self.advance()));
                break;
            }
            if let Some(keyword) = self.current().keyword() {
                if STATEMENT_START.contains(&keyword) {
                    break;
                }
            }
            node.push(ParseTreeNode::terminal(self.advance()));
        }
        node
    }

    /// Absorb tokens through the next `;` (inclusive) into an error region.
    /// Used after a completed statement that is missing its terminator.
    fn recover_to_terminator(&mut self) -> ParseTreeNode<'a> {
        let pos = self.current().pos;
        let mut node = ParseTreeNode::error(pos);
        while !self.at_end() {
            let token = self.advance();
            let is_terminator = token.is_symbol(";");
            node.push(ParseTreeNode::terminal(token));
            if is_terminator {
                break;
            }
        }
        node
    }

    // ==================== Statements ====================

    fn parse_statement(&mut self) -> Result<ParseTreeNode<'a>> {
        let keyword = match self.current().keyword() {
            Some(k) => k,
            None => return Err(self.unknown_statement()),
        };
        match keyword {
            Keyword::Select => self.parse_select(),
            Keyword::Insert => self.parse_insert(),
            Keyword::Update => self.parse_update(),
            Keyword::Delete => self.parse_delete(),
            Keyword::Create => self.parse_create(),
            Keyword::Alter => self.parse_alter(),
            Keyword::Drop => self.parse_drop(),
            _ => Err(self.unknown_statement()),
        }
    }

    fn parse_select(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::SelectStmt, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Select)?;
        self.consume_keyword(&mut node, Keyword::Distinct);
        node.push(self.parse_select_list()?);

        if self.check_keyword(Keyword::From) {
            node.push(self.parse_from_clause()?);
        } else if let Some(clause) = self.clause_keyword() {
            let pos = self.current().pos;
            self.diagnostics.push(Diagnostic::error(
                Stage::Syntax,
                pos,
                format!("Missing FROM clause before {}", clause.as_str()),
            ));
            node.push(ParseTreeNode::error(pos));
        }

        if self.check_keyword(Keyword::Where) {
            node.push(self.parse_where_clause()?);
        }
        if self.check_keyword(Keyword::Group) {
            node.push(self.parse_group_by_clause()?);
        }
        if self.check_keyword(Keyword::Having) {
            node.push(self.parse_having_clause()?);
        }
        if self.check_keyword(Keyword::Order) {
            node.push(self.parse_order_by_clause()?);
        }
        if self.check_keyword(Keyword::Limit) {
            node.push(self.parse_limit_clause()?);
        }
        Ok(node)
    }

    fn clause_keyword(&self) -> Option<Keyword> {
        self.current().keyword().filter(|k| {
            matches!(
                k,
                Keyword::Where | Keyword::Group | Keyword::Having | Keyword::Order | Keyword::Limit
            )
        })
    }

    fn parse_select_list(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::SelectList, self.current().pos);
        if self.check_symbol("*") {
            self.take(&mut node);
            return Ok(node);
        }
        loop {
            // A projection item admits a full condition (`flag`, `a = b`),
            // demoted to a plain expression when no operator follows.
            let expr = self.parse_condition()?;
            if self.check_keyword(Keyword::As) {
                let mut item = ParseTreeNode::new(Rule::SelectItem, expr.pos);
                item.push(expr);
                self.take(&mut item);
                self.expect_identifier(&mut item)?;
                node.push(item);
            } else if self.current().kind == TokenKind::Identifier {
                let mut item = ParseTreeNode::new(Rule::SelectItem, expr.pos);
                item.push(expr);
                self.expect_identifier(&mut item)?;
                node.push(item);
            } else {
                node.push(expr);
            }
            if self.check_symbol(",") {
                self.take(&mut node);
            } else {
                break;
            }
        }
        Ok(node)
    }

    fn parse_from_clause(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::FromClause, self.current().pos);
        self.expect_keyword(&mut node, Keyword::From)?;
        node.push(self.parse_table_ref()?);
        while self.at_join_keyword() {
            node.push(self.parse_join()?);
        }
        Ok(node)
    }

    fn at_join_keyword(&self) -> bool {
        matches!(
            self.current().keyword(),
            Some(
                Keyword::Join
                    | Keyword::Inner
                    | Keyword::Left
                    | Keyword::Right
                    | Keyword::Full
                    | Keyword::Cross
            )
        )
    }

    fn parse_table_ref(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::TableRef, self.current().pos);
        self.expect_identifier(&mut node)?;
        if self.check_keyword(Keyword::As) {
            self.take(&mut node);
            self.expect_identifier(&mut node)?;
        } else if self.current().kind == TokenKind::Identifier {
            self.expect_identifier(&mut node)?;
        }
        Ok(node)
    }

    fn parse_join(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::Join, self.current().pos);
        let mut is_cross = false;
        match self.current().keyword() {
            Some(Keyword::Inner) => self.take(&mut node),
            Some(Keyword::Cross) => {
                is_cross = true;
                self.take(&mut node);
            }
            Some(Keyword::Left | Keyword::Right | Keyword::Full) => {
                self.take(&mut node);
                self.consume_keyword(&mut node, Keyword::Outer);
            }
            _ => {}
        }
        self.expect_keyword(&mut node, Keyword::Join)?;
        node.push(self.parse_table_ref()?);
        if is_cross {
            if self.consume_keyword(&mut node, Keyword::On) {
                node.push(self.parse_condition()?);
            }
        } else {
            self.expect_keyword(&mut node, Keyword::On)?;
            node.push(self.parse_condition()?);
        }
        Ok(node)
    }

    fn parse_where_clause(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::WhereClause, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Where)?;
        node.push(self.parse_condition()?);
        Ok(node)
    }

    fn parse_group_by_clause(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::GroupByClause, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Group)?;
        self.expect_keyword(&mut node, Keyword::By)?;
        loop {
            node.push(self.parse_column_ref()?);
            if self.check_symbol(",") {
                self.take(&mut node);
            } else {
                break;
            }
        }
        Ok(node)
    }

    fn parse_having_clause(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::HavingClause, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Having)?;
        node.push(self.parse_condition()?);
        Ok(node)
    }

    fn parse_order_by_clause(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::OrderByClause, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Order)?;
        self.expect_keyword(&mut node, Keyword::By)?;
        loop {
            let mut item = ParseTreeNode::new(Rule::SortItem, self.current().pos);
            item.push(self.parse_expression()?);
            if self.check_keyword(Keyword::Asc) || self.check_keyword(Keyword::Desc) {
                self.take(&mut item);
            }
            node.push(item);
            if self.check_symbol(",") {
                self.take(&mut node);
            } else {
                break;
            }
        }
        Ok(node)
    }

    fn parse_limit_clause(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::LimitClause, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Limit)?;
        if self.current().kind == TokenKind::Integer {
            let token = self.advance();
            node.push(ParseTreeNode::literal(token));
            Ok(node)
        } else {
            Err(self.expected("an integer literal"))
        }
    }

    fn parse_insert(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::InsertStmt, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Insert)?;
        self.expect_keyword(&mut node, Keyword::Into)?;
        self.expect_identifier(&mut node)?;
        if self.check_symbol("(") {
            node.push(self.parse_column_list()?);
        }
        self.expect_keyword(&mut node, Keyword::Values)?;
        node.push(self.parse_value_list()?);
        Ok(node)
    }

    fn parse_column_list(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::ColumnList, self.current().pos);
        self.expect_symbol(&mut node, "(")?;
        loop {
            let mut column = ParseTreeNode::new(Rule::ColumnRef, self.current().pos);
            self.expect_identifier(&mut column)?;
            node.push(column);
            if self.check_symbol(",") {
                self.take(&mut node);
            } else {
                break;
            }
        }
        self.expect_symbol(&mut node, ")")?;
        Ok(node)
    }

    fn parse_value_list(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::ValueList, self.current().pos);
        loop {
            let mut row = ParseTreeNode::new(Rule::Row, self.current().pos);
            self.expect_symbol(&mut row, "(")?;
            loop {
                row.push(self.parse_expression()?);
                if self.check_symbol(",") {
                    self.take(&mut row);
                } else {
                    break;
                }
            }
            self.expect_symbol(&mut row, ")")?;
            node.push(row);
            if self.check_symbol(",") {
                self.take(&mut node);
            } else {
                break;
            }
        }
        Ok(node)
    }

    fn parse_update(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::UpdateStmt, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Update)?;
        self.expect_identifier(&mut node)?;
        self.expect_keyword(&mut node, Keyword::Set)?;
        loop {
            let mut assignment = ParseTreeNode::new(Rule::Assignment, self.current().pos);
            let mut column = ParseTreeNode::new(Rule::ColumnRef, self.current().pos);
            self.expect_identifier(&mut column)?;
            assignment.push(column);
            self.expect_symbol(&mut assignment, "=")?;
            assignment.push(self.parse_expression()?);
            node.push(assignment);
            if self.check_symbol(",") {
                self.take(&mut node);
            } else {
                break;
            }
        }
        if self.check_keyword(Keyword::Where) {
            node.push(self.parse_where_clause()?);
        }
        Ok(node)
    }

    fn parse_delete(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::DeleteStmt, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Delete)?;
        self.expect_keyword(&mut node, Keyword::From)?;
        self.expect_identifier(&mut node)?;
        if self.check_keyword(Keyword::Where) {
            node.push(self.parse_where_clause()?);
        }
        Ok(node)
    }

    // ==================== DDL ====================

    fn parse_create(&mut self) -> Result<ParseTreeNode<'a>> {
        let object = self.peek(1).and_then(|t| t.keyword());
        match object {
            Some(Keyword::Table) => self.parse_create_table(),
            Some(Keyword::View) => self.parse_create_view(),
            Some(Keyword::Index) => self.parse_create_index(),
            Some(Keyword::Database) => self.parse_create_database(),
            _ => {
                self.pos += 1; // step over CREATE so the diagnostic lands on the object
                Err(self.expected("'TABLE', 'DATABASE', 'VIEW', or 'INDEX'"))
            }
        }
    }

    fn parse_create_table(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::CreateTableStmt, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Create)?;
        self.expect_keyword(&mut node, Keyword::Table)?;
        self.expect_identifier(&mut node)?;
        self.expect_symbol(&mut node, "(")?;
        loop {
            node.push(self.parse_column_def()?);
            if self.check_symbol(",") {
                self.take(&mut node);
            } else {
                break;
            }
        }
        self.expect_symbol(&mut node, ")")?;
        Ok(node)
    }

    fn parse_column_def(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::ColumnDef, self.current().pos);
        self.expect_identifier(&mut node)?;
        node.push(self.parse_data_type()?);
        loop {
            match self.current().keyword() {
                Some(Keyword::Primary) => {
                    let mut c = ParseTreeNode::new(Rule::PrimaryKey, self.current().pos);
                    self.take(&mut c);
                    self.expect_keyword(&mut c, Keyword::Key)?;
                    node.push(c);
                }
                Some(Keyword::Not) => {
                    let mut c = ParseTreeNode::new(Rule::NotNullConstraint, self.current().pos);
                    self.take(&mut c);
                    self.expect_keyword(&mut c, Keyword::Null)?;
                    node.push(c);
                }
                Some(Keyword::Unique) => {
                    let mut c = ParseTreeNode::new(Rule::UniqueConstraint, self.current().pos);
                    self.take(&mut c);
                    node.push(c);
                }
                Some(Keyword::Default) => {
                    let mut c = ParseTreeNode::new(Rule::DefaultConstraint, self.current().pos);
                    self.take(&mut c);
                    c.push(self.parse_primary()?);
                    node.push(c);
                }
                Some(Keyword::Check) => {
                    let mut c = ParseTreeNode::new(Rule::CheckConstraint, self.current().pos);
                    self.take(&mut c);
                    self.expect_symbol(&mut c, "(")?;
                    c.push(self.parse_condition()?);
                    self.expect_symbol(&mut c, ")")?;
                    node.push(c);
                }
                Some(Keyword::Foreign) => {
                    let mut c = ParseTreeNode::new(Rule::ForeignKey, self.current().pos);
                    self.take(&mut c);
                    self.expect_keyword(&mut c, Keyword::Key)?;
                    c.push(self.parse_column_list()?);
                    self.expect_keyword(&mut c, Keyword::References)?;
                    self.expect_identifier(&mut c)?;
                    c.push(self.parse_column_list()?);
                    node.push(c);
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn parse_data_type(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::DataType, self.current().pos);
        let acceptable = matches!(self.current().keyword(), Some(k) if k.is_type_name())
            || self.current().kind == TokenKind::Identifier;
        if !acceptable {
            return Err(self.expected("a data type"));
        }
        self.take(&mut node);
        if self.check_symbol("(") {
            self.take(&mut node);
            if self.current().kind == TokenKind::Integer {
                let token = self.advance();
                node.push(ParseTreeNode::terminal(token));
            } else {
                return Err(self.expected("an integer size"));
            }
            self.expect_symbol(&mut node, ")")?;
        }
        Ok(node)
    }

    fn parse_create_view(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::CreateViewStmt, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Create)?;
        self.expect_keyword(&mut node, Keyword::View)?;
        self.expect_identifier(&mut node)?;
        self.expect_keyword(&mut node, Keyword::As)?;
        node.push(self.parse_select()?);
        Ok(node)
    }

    fn parse_create_index(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::CreateIndexStmt, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Create)?;
        self.expect_keyword(&mut node, Keyword::Index)?;
        self.expect_identifier(&mut node)?;
        self.expect_keyword(&mut node, Keyword::On)?;
        self.expect_identifier(&mut node)?;
        node.push(self.parse_column_list()?);
        Ok(node)
    }

    fn parse_create_database(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::CreateDatabaseStmt, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Create)?;
        self.expect_keyword(&mut node, Keyword::Database)?;
        self.expect_identifier(&mut node)?;
        Ok(node)
    }

    fn parse_alter(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::AlterTableStmt, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Alter)?;
        self.expect_keyword(&mut node, Keyword::Table)?;
        self.expect_identifier(&mut node)?;
        match self.current().keyword() {
            Some(Keyword::Add) => {
                self.take(&mut node);
                self.consume_keyword(&mut node, Keyword::Column);
                node.push(self.parse_column_def()?);
            }
            Some(Keyword::Drop) => {
                self.take(&mut node);
                self.expect_keyword(&mut node, Keyword::Column)?;
                self.expect_identifier(&mut node)?;
            }
            _ => return Err(self.expected("'ADD' or 'DROP'")),
        }
        Ok(node)
    }

    fn parse_drop(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::DropStmt, self.current().pos);
        self.expect_keyword(&mut node, Keyword::Drop)?;
        match self.current().keyword() {
            Some(Keyword::Table | Keyword::View | Keyword::Index | Keyword::Database) => {
                self.take(&mut node);
            }
            _ => return Err(self.expected("'TABLE', 'DATABASE', 'VIEW', or 'INDEX'")),
        }
        self.expect_identifier(&mut node)?;
        Ok(node)
    }

    // ==================== Conditions ====================

    fn parse_condition(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut left = self.parse_and_condition()?;
        while self.check_keyword(Keyword::Or) {
            let mut node = ParseTreeNode::new(Rule::Or, left.pos);
            node.push(left);
            self.take(&mut node);
            node.push(self.parse_and_condition()?);
            left = node;
        }
        Ok(left)
    }

    fn parse_and_condition(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut left = self.parse_not_condition()?;
        while self.check_keyword(Keyword::And) {
            let mut node = ParseTreeNode::new(Rule::And, left.pos);
            node.push(left);
            self.take(&mut node);
            node.push(self.parse_not_condition()?);
            left = node;
        }
        Ok(left)
    }

    fn parse_not_condition(&mut self) -> Result<ParseTreeNode<'a>> {
        if self.check_keyword(Keyword::Not) {
            let mut node = ParseTreeNode::new(Rule::Not, self.current().pos);
            self.take(&mut node);
            node.push(self.parse_not_condition()?);
            return Ok(node);
        }
        self.parse_primary_condition()
    }

    fn parse_primary_condition(&mut self) -> Result<ParseTreeNode<'a>> {
        let left = if self.check_symbol("(") && !self.subquery_follows() {
            let mut paren = ParseTreeNode::new(Rule::Paren, self.current().pos);
            self.take(&mut paren);
            paren.push(self.parse_condition()?);
            self.expect_symbol(&mut paren, ")")?;
            paren
        } else {
            self.parse_expression()?
        };
        self.parse_condition_suffix(left)
    }

    fn subquery_follows(&self) -> bool {
        matches!(self.peek(1), Some(t) if t.is_keyword(Keyword::Select))
    }

    /// Comparison is tried first; with no operator present the expression
    /// itself stands as the condition.
    fn parse_condition_suffix(&mut self, left: ParseTreeNode<'a>) -> Result<ParseTreeNode<'a>> {
        match self.current().keyword() {
            Some(Keyword::Between) => {
                let mut node = ParseTreeNode::new(Rule::Between, left.pos);
                node.push(left);
                self.take(&mut node);
                node.push(self.parse_expression()?);
                self.expect_keyword(&mut node, Keyword::And)?;
                node.push(self.parse_expression()?);
                return Ok(node);
            }
            Some(Keyword::In) => {
                let mut node = ParseTreeNode::new(Rule::InList, left.pos);
                node.push(left);
                self.take(&mut node);
                self.expect_symbol(&mut node, "(")?;
                if self.check_keyword(Keyword::Select) {
                    node.push(self.parse_select()?);
                } else {
                    loop {
                        node.push(self.parse_expression()?);
                        if self.check_symbol(",") {
                            self.take(&mut node);
                        } else {
                            break;
                        }
                    }
                }
                self.expect_symbol(&mut node, ")")?;
                return Ok(node);
            }
            Some(Keyword::Like) => {
                let mut node = ParseTreeNode::new(Rule::Like, left.pos);
                node.push(left);
                self.take(&mut node);
                node.push(self.parse_expression()?);
                return Ok(node);
            }
            Some(Keyword::Is) => {
                let mut node = ParseTreeNode::new(Rule::IsNull, left.pos);
                node.push(left);
                self.take(&mut node);
                self.consume_keyword(&mut node, Keyword::Not);
                self.expect_keyword(&mut node, Keyword::Null)?;
                return Ok(node);
            }
            _ => {}
        }
        if self.current().kind == TokenKind::Comparison {
            let mut node = ParseTreeNode::new(Rule::Comparison, left.pos);
            node.push(left);
            self.take(&mut node);
            node.push(self.parse_expression()?);
            return Ok(node);
        }
        Ok(left)
    }

    // ==================== Expressions ====================

    fn parse_expression(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut left = self.parse_multiplicative()?;
        while self.check_symbol("+") || self.check_symbol("-") || self.check_symbol("||") {
            let mut node = ParseTreeNode::new(Rule::Expression, left.pos);
            node.push(left);
            self.take(&mut node);
            node.push(self.parse_multiplicative()?);
            left = node;
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut left = self.parse_unary()?;
        while self.check_symbol("*") || self.check_symbol("/") || self.check_symbol("%") {
            let mut node = ParseTreeNode::new(Rule::Expression, left.pos);
            node.push(left);
            self.take(&mut node);
            node.push(self.parse_unary()?);
            left = node;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ParseTreeNode<'a>> {
        if self.check_symbol("+") || self.check_symbol("-") {
            let mut node = ParseTreeNode::new(Rule::Unary, self.current().pos);
            self.take(&mut node);
            node.push(self.parse_unary()?);
            return Ok(node);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<ParseTreeNode<'a>> {
        let token = self.current();
        match token.kind {
            TokenKind::Delimiter if token.is_symbol("(") => {
                if self.subquery_follows() {
                    let mut node = ParseTreeNode::new(Rule::Subquery, token.pos);
                    self.take(&mut node);
                    node.push(self.parse_select()?);
                    self.expect_symbol(&mut node, ")")?;
                    Ok(node)
                } else {
                    let mut node = ParseTreeNode::new(Rule::Paren, token.pos);
                    self.take(&mut node);
                    node.push(self.parse_expression()?);
                    self.expect_symbol(&mut node, ")")?;
                    Ok(node)
                }
            }
            TokenKind::Keyword => match token.keyword() {
                Some(k) if k.is_function() => self.parse_function_call(),
                Some(Keyword::Null | Keyword::True | Keyword::False) => {
                    let token = self.advance();
                    Ok(ParseTreeNode::literal(token))
                }
                _ => Err(self.expected("an expression")),
            },
            TokenKind::Identifier => {
                if matches!(self.peek(1), Some(t) if t.is_symbol("(")) {
                    self.parse_function_call()
                } else {
                    self.parse_column_ref()
                }
            }
            TokenKind::Integer | TokenKind::Float | TokenKind::String => {
                let token = self.advance();
                Ok(ParseTreeNode::literal(token))
            }
            _ => Err(self.expected("an expression")),
        }
    }

    fn parse_column_ref(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::ColumnRef, self.current().pos);
        self.expect_identifier(&mut node)?;
        if self.current().kind == TokenKind::Dot {
            self.take(&mut node);
            if self.check_symbol("*") {
                self.take(&mut node);
            } else {
                self.expect_identifier(&mut node)?;
            }
        }
        Ok(node)
    }

    fn parse_function_call(&mut self) -> Result<ParseTreeNode<'a>> {
        let mut node = ParseTreeNode::new(Rule::FunctionCall, self.current().pos);
        self.take(&mut node); // function name, keyword or identifier
        self.expect_symbol(&mut node, "(")?;
        if self.check_symbol("*") {
            self.take(&mut node);
        } else {
            self.consume_keyword(&mut node, Keyword::Distinct);
            if !self.check_symbol(")") {
                loop {
                    node.push(self.parse_expression()?);
                    if self.check_symbol(",") {
                        self.take(&mut node);
                    } else {
                        break;
                    }
                }
            }
        }
        self.expect_symbol(&mut node, ")")?;
        Ok(node)
    }
}
