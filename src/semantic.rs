//! # Semantic Analyzer
//!
//! Walks the parse tree in statement order, threading one mutable
//! [`SymbolTable`] through the traversal. Each statement is validated
//! against the table *before* its DDL effect is applied, so
//! `CREATE TABLE x; INSERT INTO x ...` works within one unit.
//!
//! ## Validation
//!
//! - DDL object existence: duplicate CREATE, unknown DROP/ALTER targets,
//!   duplicate columns on ALTER ADD, unknown columns on ALTER DROP.
//! - Reference resolution: every column reference resolves to exactly one
//!   column in the statement's scope (FROM tables plus aliases); unqualified
//!   names must be unambiguous, qualified names need a visible table or
//!   alias.
//! - Type inference: literals, column references, arithmetic with numeric
//!   widening, comparisons, boolean connectives, aggregate and scalar
//!   functions. Every expression node is annotated with its inferred type.
//! - INSERT/UPDATE assignment checks: arity per row, widening-only numeric
//!   conversion, NOT NULL enforcement.
//! - Aggregate discipline: aggregates rejected in WHERE, allowed in HAVING;
//!   with GROUP BY, non-aggregated projection columns must be grouped.
//! - Views: the defining projection's names and types become the view's
//!   columns.
//!
//! ## Error Containment
//!
//! The analyzer never aborts. Unresolved references and failed inferences
//! produce `SqlType::Unknown`, which every later rule treats as opaque, so
//! one root cause yields one diagnostic instead of a cascade. `Error`
//! subtrees from parser recovery are skipped outright.

use crate::diag::{Diagnostic, Stage};
use crate::symbols::{ColumnDef, Constraint, SqlType, SymbolTable, TableDef};
use crate::token::{Keyword, Position, TokenKind, Value};
use crate::tree::{ParseTreeNode, Rule};
use hashbrown::HashSet;

pub struct AnalysisResult<'a> {
    pub tree: ParseTreeNode<'a>,
    pub symbols: SymbolTable,
    pub diagnostics: Vec<Diagnostic>,
}

/// Analyze a parse tree against a fresh symbol table.
pub fn analyze(tree: ParseTreeNode<'_>) -> AnalysisResult<'_> {
    Analyzer::new().analyze(tree)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum AggregateUse {
    Allowed,
    Forbidden,
}

pub struct Analyzer {
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self::with_symbols(SymbolTable::new())
    }

    /// Seed the analyzer with an existing schema, e.g. to re-run analysis
    /// over the same tree with identical table state.
    pub fn with_symbols(symbols: SymbolTable) -> Self {
        Self {
            symbols,
            diagnostics: Vec::new(),
        }
    }

    pub fn analyze<'a>(mut self, mut tree: ParseTreeNode<'a>) -> AnalysisResult<'a> {
        if tree.rule == Rule::Program {
            for child in tree.children.iter_mut() {
                if child.rule.is_statement() {
                    self.check_statement(child);
                }
            }
        } else {
            self.check_statement(&mut tree);
        }
        // Scope faults surface before projection faults; report in source
        // order regardless.
        self.diagnostics.sort_by_key(|d| d.pos);
        AnalysisResult {
            tree,
            symbols: self.symbols,
            diagnostics: self.diagnostics,
        }
    }

    fn error(&mut self, pos: Position, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::error(Stage::Semantic, pos, message));
    }

    fn warn(&mut self, pos: Position, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::warning(Stage::Semantic, pos, message));
    }

    fn check_statement(&mut self, node: &mut ParseTreeNode<'_>) {
        tracing::debug!(rule = ?node.rule, line = node.pos.line, "analyzing statement");
        match node.rule {
            Rule::CreateTableStmt => self.check_create_table(node),
            Rule::CreateViewStmt => self.check_create_view(node),
            Rule::CreateIndexStmt => self.check_create_index(node),
            Rule::CreateDatabaseStmt => {}
            Rule::AlterTableStmt => self.check_alter_table(node),
            Rule::DropStmt => self.check_drop(node),
            Rule::SelectStmt => {
                let scope = self.select_scope(node);
                self.check_select(node, &scope);
            }
            Rule::InsertStmt => self.check_insert(node),
            Rule::UpdateStmt => self.check_update(node),
            Rule::DeleteStmt => self.check_delete(node),
            _ => {}
        }
    }

    // ==================== DDL ====================

    fn check_create_table(&mut self, node: &mut ParseTreeNode<'_>) {
        let (name, pos) = match node.ident_child(0) {
            Some(t) => (t.lexeme.to_string(), t.pos),
            None => return,
        };
        if self.symbols.resolve(&name).is_some() {
            self.error(pos, format!("Table '{}' already exists", name));
            return;
        }

        let mut columns: Vec<ColumnDef> = Vec::new();
        for def in node.children.iter().filter(|c| c.rule == Rule::ColumnDef) {
            if let Some(column) = self.build_column(def, &name, &columns) {
                columns.push(column);
            }
        }

        let table = TableDef::new(name, columns, node.pos);
        let scope = Scope::single(&table);
        for def in node
            .children
            .iter_mut()
            .filter(|c| c.rule == Rule::ColumnDef)
        {
            self.check_column_constraints(def, &table, &scope);
        }
        self.symbols.define(table);
    }

    /// Read one column definition node into a descriptor, reporting invalid
    /// type names and in-table duplicates.
    fn build_column(
        &mut self,
        def: &ParseTreeNode<'_>,
        table_name: &str,
        seen: &[ColumnDef],
    ) -> Option<ColumnDef> {
        let col_tok = def.ident_child(0)?;
        let col_name = col_tok.lexeme.to_string();
        if seen.iter().any(|c| c.name.eq_ignore_ascii_case(&col_name)) {
            self.error(
                col_tok.pos,
                format!("Duplicate column '{}' in table '{}'", col_name, table_name),
            );
            return None;
        }

        let type_token = def
            .find(Rule::DataType)
            .and_then(|d| d.children.first())
            .and_then(|c| c.token.as_ref());
        let (declared_type, type_name) = match type_token {
            Some(t) => match SqlType::from_type_name(t.lexeme) {
                Some(ty) => (ty, t.lexeme.to_string()),
                None => {
                    self.error(t.pos, format!("Invalid data type '{}'", t.lexeme));
                    (SqlType::Unknown, t.lexeme.to_string())
                }
            },
            None => (SqlType::Unknown, String::new()),
        };

        let mut column = ColumnDef::new(col_name, declared_type, type_name, seen.len());
        for c in &def.children {
            match c.rule {
                Rule::PrimaryKey => column.constraints.push(Constraint::PrimaryKey),
                Rule::NotNullConstraint => column.constraints.push(Constraint::NotNull),
                Rule::UniqueConstraint => column.constraints.push(Constraint::Unique),
                Rule::DefaultConstraint => {
                    let text = c
                        .children
                        .iter()
                        .skip(1)
                        .flat_map(|v| v.terminal_tokens())
                        .map(|t| t.lexeme)
                        .collect::<Vec<_>>()
                        .join(" ");
                    column.constraints.push(Constraint::Default(text));
                }
                Rule::CheckConstraint => column.constraints.push(Constraint::Check),
                Rule::ForeignKey => {
                    let table = c.ident_child(0).map(|t| t.lexeme.to_string()).unwrap_or_default();
                    let referenced = c
                        .children_with(Rule::ColumnList)
                        .nth(1)
                        .and_then(|l| l.children_with(Rule::ColumnRef).next())
                        .and_then(|r| r.ident_child(0))
                        .map(|t| t.lexeme.to_string())
                        .unwrap_or_default();
                    column.constraints.push(Constraint::ForeignKey {
                        table,
                        column: referenced,
                    });
                }
                _ => {}
            }
        }
        Some(column)
    }

    /// DEFAULT values must be assignable to their column; CHECK conditions
    /// must be boolean over the table being defined.
    fn check_column_constraints(
        &mut self,
        def: &mut ParseTreeNode<'_>,
        table: &TableDef,
        scope: &Scope,
    ) {
        let column = match def.ident_child(0) {
            Some(t) => table.column(t.lexeme).cloned(),
            None => None,
        };
        for c in def.children.iter_mut() {
            match c.rule {
                Rule::DefaultConstraint => {
                    let value_idx = match c.children.iter().position(|v| v.rule != Rule::Terminal) {
                        Some(i) => i,
                        None => continue,
                    };
                    let vt = self.infer(&mut c.children[value_idx], scope, AggregateUse::Forbidden);
                    if let Some(column) = &column {
                        let value_pos = c.children[value_idx].pos;
                        if vt != SqlType::Null
                            && !assignment_compatible(column.declared_type, vt)
                        {
                            self.error(
                                value_pos,
                                format!(
                                    "DEFAULT value for column '{}' declared {}, {} value provided",
                                    column.name,
                                    column.type_name.to_ascii_uppercase(),
                                    value_type_word(vt)
                                ),
                            );
                        }
                    }
                }
                Rule::CheckConstraint => {
                    let cond_idx = match c.children.iter().position(|v| v.rule != Rule::Terminal) {
                        Some(i) => i,
                        None => continue,
                    };
                    let pos = c.children[cond_idx].pos;
                    let ty = self.infer(&mut c.children[cond_idx], scope, AggregateUse::Forbidden);
                    if !ty.is_boolean_compatible() {
                        self.error(
                            pos,
                            format!("CHECK constraint must be a boolean condition, found {}", ty),
                        );
                    }
                }
                _ => {}
            }
        }
    }

    fn check_create_view(&mut self, node: &mut ParseTreeNode<'_>) {
        let (name, pos) = match node.ident_child(0) {
            Some(t) => (t.lexeme.to_string(), t.pos),
            None => return,
        };
        let duplicate = self.symbols.resolve(&name).is_some();
        if duplicate {
            self.error(pos, format!("View '{}' already exists", name));
        }

        let select_idx = match node.children.iter().position(|c| c.rule == Rule::SelectStmt) {
            Some(i) => i,
            None => return,
        };
        let scope = self.select_scope(&node.children[select_idx]);
        self.check_select(&mut node.children[select_idx], &scope);
        if duplicate {
            return;
        }

        let columns = self.view_columns(&node.children[select_idx], &scope);
        self.symbols.define(TableDef::view(name, columns, node.pos));
    }

    /// Derive view columns from the defining projection: alias, else the
    /// projected column's name, else an ordinal placeholder. `*` copies the
    /// source tables' columns.
    fn view_columns(&self, select: &ParseTreeNode<'_>, scope: &Scope) -> Vec<ColumnDef> {
        let mut columns: Vec<ColumnDef> = Vec::new();
        let list = match select.find(Rule::SelectList) {
            Some(l) => l,
            None => return columns,
        };

        let star = list
            .children
            .first()
            .and_then(|c| c.token.as_ref())
            .is_some_and(|t| t.is_symbol("*"));
        if star {
            for (_, table) in &scope.tables {
                for col in &table.columns {
                    let ordinal = columns.len();
                    columns.push(ColumnDef::new(
                        col.name.clone(),
                        col.declared_type,
                        col.type_name.clone(),
                        ordinal,
                    ));
                }
            }
            return columns;
        }

        for item in list.children.iter().filter(|c| c.rule != Rule::Terminal) {
            let ordinal = columns.len();
            let (name, ty) = match item.rule {
                Rule::SelectItem => {
                    let alias = item
                        .ident_child(0)
                        .map(|t| t.lexeme.to_string())
                        .unwrap_or_else(|| format!("col_{}", ordinal + 1));
                    (alias, item.ty.unwrap_or(SqlType::Unknown))
                }
                Rule::ColumnRef => {
                    let name = column_ref_name(item)
                        .unwrap_or_else(|| format!("col_{}", ordinal + 1));
                    (name, item.ty.unwrap_or(SqlType::Unknown))
                }
                _ => (
                    format!("col_{}", ordinal + 1),
                    item.ty.unwrap_or(SqlType::Unknown),
                ),
            };
            let type_name = ty.to_string();
            columns.push(ColumnDef::new(name, ty, type_name, ordinal));
        }
        columns
    }

    fn check_create_index(&mut self, node: &mut ParseTreeNode<'_>) {
        let table_tok = match node.ident_child(1) {
            Some(t) => (t.lexeme.to_string(), t.pos),
            None => return,
        };
        let table = match self.symbols.resolve(&table_tok.0) {
            Some(t) => t.clone(),
            None => {
                self.error(table_tok.1, format!("Table '{}' does not exist", table_tok.0));
                return;
            }
        };
        if let Some(list) = node.find(Rule::ColumnList) {
            let missing: Vec<(String, Position)> = list
                .children_with(Rule::ColumnRef)
                .filter_map(|c| c.ident_child(0))
                .filter(|t| !table.has_column(t.lexeme))
                .map(|t| (t.lexeme.to_string(), t.pos))
                .collect();
            for (name, pos) in missing {
                self.error(
                    pos,
                    format!("Column '{}' does not exist in table '{}'", name, table.name),
                );
            }
        }
    }

    fn check_alter_table(&mut self, node: &mut ParseTreeNode<'_>) {
        let (name, pos) = match node.ident_child(0) {
            Some(t) => (t.lexeme.to_string(), t.pos),
            None => return,
        };
        if self.symbols.resolve(&name).is_none() {
            self.error(pos, format!("Table '{}' does not exist", name));
            return;
        }

        if node.keyword_child(Keyword::Add).is_some() {
            let def = match node.find(Rule::ColumnDef) {
                Some(d) => d,
                None => return,
            };
            let col_name = match def.ident_child(0) {
                Some(t) => (t.lexeme.to_string(), t.pos),
                None => return,
            };
            let exists = self
                .symbols
                .resolve(&name)
                .is_some_and(|t| t.has_column(&col_name.0));
            if exists {
                self.error(
                    col_name.1,
                    format!("Column '{}' already exists in table '{}'", col_name.0, name),
                );
                return;
            }
            let def = node.find(Rule::ColumnDef).expect("checked above");
            let existing = self.symbols.resolve(&name).expect("checked above").columns.clone();
            if let Some(column) = self.build_column(def, &name, &existing) {
                if let Some(table) = self.symbols.resolve_mut(&name) {
                    table.columns.push(column);
                }
            }
        } else if node.keyword_child(Keyword::Drop).is_some() {
            let col = match node.ident_child(1) {
                Some(t) => (t.lexeme.to_string(), t.pos),
                None => return,
            };
            let exists = self
                .symbols
                .resolve(&name)
                .is_some_and(|t| t.has_column(&col.0));
            if !exists {
                self.error(
                    col.1,
                    format!("Column '{}' does not exist in table '{}'", col.0, name),
                );
                return;
            }
            if let Some(table) = self.symbols.resolve_mut(&name) {
                table.columns.retain(|c| !c.name.eq_ignore_ascii_case(&col.0));
                for (ordinal, column) in table.columns.iter_mut().enumerate() {
                    column.ordinal = ordinal;
                }
            }
        }
    }

    fn check_drop(&mut self, node: &mut ParseTreeNode<'_>) {
        let kind = node
            .children
            .get(1)
            .and_then(|c| c.token.as_ref())
            .and_then(|t| t.keyword());
        let (name, pos) = match node.ident_child(0) {
            Some(t) => (t.lexeme.to_string(), t.pos),
            None => return,
        };
        match kind {
            Some(Keyword::Table) => match self.symbols.resolve(&name) {
                None => self.error(
                    pos,
                    format!("Cannot drop table '{}': Table does not exist", name),
                ),
                Some(t) if t.is_view => self.error(
                    pos,
                    format!("Cannot drop table '{}': '{}' is a view", name, name),
                ),
                Some(_) => {
                    self.symbols.remove(&name);
                }
            },
            Some(Keyword::View) => match self.symbols.resolve(&name) {
                None => self.error(
                    pos,
                    format!("Cannot drop view '{}': View does not exist", name),
                ),
                Some(t) if !t.is_view => self.error(
                    pos,
                    format!("Cannot drop view '{}': '{}' is a table", name, name),
                ),
                Some(_) => {
                    self.symbols.remove(&name);
                }
            },
            // Indexes and databases are not schema objects in the registry.
            _ => {}
        }
    }

    // ==================== DML ====================

    fn select_scope(&mut self, node: &ParseTreeNode<'_>) -> Scope {
        let mut scope = Scope::default();
        let from = match node.find(Rule::FromClause) {
            Some(f) => f,
            None => return scope,
        };

        let mut refs: Vec<&ParseTreeNode<'_>> = Vec::new();
        for child in &from.children {
            match child.rule {
                Rule::TableRef => refs.push(child),
                Rule::Join => {
                    if let Some(tr) = child.find(Rule::TableRef) {
                        refs.push(tr);
                    }
                }
                _ => {}
            }
        }

        let mut pending: Vec<(String, Position, Option<String>)> = Vec::new();
        for tr in refs {
            let name = match tr.ident_child(0) {
                Some(t) => t,
                None => continue,
            };
            let alias = tr.ident_child(1).map(|t| t.lexeme.to_string());
            pending.push((name.lexeme.to_string(), name.pos, alias));
        }

        for (name, pos, alias) in pending {
            match self.symbols.resolve(&name) {
                Some(table) => {
                    let table = table.clone();
                    scope.bind(alias.as_deref().unwrap_or(&name), table);
                }
                None => self.error(pos, format!("Table '{}' does not exist", name)),
            }
        }
        scope
    }

    fn check_select(&mut self, node: &mut ParseTreeNode<'_>, scope: &Scope) {
        let has_group_by = node.find(Rule::GroupByClause).is_some();

        for child in node.children.iter_mut() {
            match child.rule {
                Rule::SelectList => {
                    for item in child.children.iter_mut().filter(|c| {
                        c.rule != Rule::Terminal
                    }) {
                        self.infer(item, scope, AggregateUse::Allowed);
                    }
                }
                Rule::FromClause => {
                    for join in child
                        .children
                        .iter_mut()
                        .filter(|c| c.rule == Rule::Join)
                    {
                        let cond_idx = join.children.iter().rposition(|c| {
                            !matches!(c.rule, Rule::Terminal | Rule::TableRef)
                        });
                        if let Some(idx) = cond_idx {
                            let pos = join.children[idx].pos;
                            let ty =
                                self.infer(&mut join.children[idx], scope, AggregateUse::Forbidden);
                            if !ty.is_boolean_compatible() {
                                self.error(
                                    pos,
                                    format!("ON condition must be a boolean condition, found {}", ty),
                                );
                            }
                        }
                    }
                }
                Rule::WhereClause => {
                    self.check_condition_clause(child, scope, AggregateUse::Forbidden, "WHERE");
                }
                Rule::GroupByClause => {
                    for cr in child
                        .children
                        .iter_mut()
                        .filter(|c| c.rule == Rule::ColumnRef)
                    {
                        self.infer(cr, scope, AggregateUse::Forbidden);
                    }
                }
                Rule::HavingClause => {
                    self.check_condition_clause(child, scope, AggregateUse::Allowed, "HAVING");
                }
                Rule::OrderByClause => {
                    for item in child
                        .children
                        .iter_mut()
                        .filter(|c| c.rule == Rule::SortItem)
                    {
                        if let Some(idx) =
                            item.children.iter().position(|c| c.rule != Rule::Terminal)
                        {
                            self.infer(&mut item.children[idx], scope, AggregateUse::Allowed);
                        }
                    }
                }
                _ => {}
            }
        }

        if has_group_by {
            self.check_grouping(node, scope);
        }
    }

    fn check_condition_clause(
        &mut self,
        clause: &mut ParseTreeNode<'_>,
        scope: &Scope,
        aggregates: AggregateUse,
        clause_name: &str,
    ) {
        let idx = match clause.children.iter().position(|c| c.rule != Rule::Terminal) {
            Some(i) => i,
            None => return,
        };
        let pos = clause.children[idx].pos;
        let ty = self.infer(&mut clause.children[idx], scope, aggregates);
        if !ty.is_boolean_compatible() {
            self.error(
                pos,
                format!(
                    "{} clause must be a boolean condition, found {}",
                    clause_name, ty
                ),
            );
        }
    }

    /// With GROUP BY present, every projection column outside an aggregate
    /// call must be named in the GROUP BY list.
    fn check_grouping(&mut self, node: &ParseTreeNode<'_>, scope: &Scope) {
        let mut grouped: HashSet<String> = HashSet::new();
        if let Some(group_by) = node.find(Rule::GroupByClause) {
            for cr in group_by.children_with(Rule::ColumnRef) {
                if let Some(key) = self.column_key(cr, scope) {
                    grouped.insert(key);
                }
            }
        }
        if let Some(list) = node.find(Rule::SelectList) {
            let mut offenders: Vec<(String, Position)> = Vec::new();
            for item in list.children.iter().filter(|c| c.rule != Rule::Terminal) {
                self.find_ungrouped(item, &grouped, scope, &mut offenders);
            }
            for (name, pos) in offenders {
                self.error(
                    pos,
                    format!(
                        "Column '{}' must appear in the GROUP BY clause or be used in an aggregate function",
                        name
                    ),
                );
            }
        }
    }

    fn find_ungrouped(
        &self,
        node: &ParseTreeNode<'_>,
        grouped: &HashSet<String>,
        scope: &Scope,
        offenders: &mut Vec<(String, Position)>,
    ) {
        match node.rule {
            Rule::FunctionCall => {
                let aggregate = node
                    .children
                    .first()
                    .and_then(|c| c.token.as_ref())
                    .and_then(|t| t.keyword())
                    .is_some_and(|k| k.is_aggregate());
                if aggregate {
                    return;
                }
                for child in &node.children {
                    self.find_ungrouped(child, grouped, scope, offenders);
                }
            }
            Rule::ColumnRef => {
                let star = node
                    .children
                    .last()
                    .and_then(|c| c.token.as_ref())
                    .is_some_and(|t| t.is_symbol("*"));
                if star {
                    return;
                }
                if let Some(key) = self.column_key(node, scope) {
                    if !grouped.contains(&key) {
                        let name = column_ref_name(node).unwrap_or_default();
                        offenders.push((name, node.pos));
                    }
                }
            }
            Rule::Error => {}
            _ => {
                for child in &node.children {
                    self.find_ungrouped(child, grouped, scope, offenders);
                }
            }
        }
    }

    /// Canonical `TABLE.COLUMN` key for grouping comparisons; falls back to
    /// the written name when the reference does not resolve.
    fn column_key(&self, node: &ParseTreeNode<'_>, scope: &Scope) -> Option<String> {
        let idents: Vec<&str> = node
            .children
            .iter()
            .filter_map(|c| c.token.as_ref())
            .filter(|t| t.kind == TokenKind::Identifier)
            .map(|t| t.lexeme)
            .collect();
        match idents.as_slice() {
            [prefix, column] => {
                let table = scope
                    .resolve_table(prefix)
                    .map(|t| t.name.to_ascii_uppercase())
                    .unwrap_or_else(|| prefix.to_ascii_uppercase());
                Some(format!("{}.{}", table, column.to_ascii_uppercase()))
            }
            [name] => match scope.resolve_column(name) {
                Lookup::Unique(table, column) => Some(format!(
                    "{}.{}",
                    table.name.to_ascii_uppercase(),
                    column.name.to_ascii_uppercase()
                )),
                _ => Some(name.to_ascii_uppercase()),
            },
            _ => None,
        }
    }

    fn check_insert(&mut self, node: &mut ParseTreeNode<'_>) {
        let (table_name, pos) = match node.ident_child(0) {
            Some(t) => (t.lexeme.to_string(), t.pos),
            None => return,
        };
        let table = match self.symbols.resolve(&table_name) {
            Some(t) => t.clone(),
            None => {
                self.error(pos, format!("Table '{}' does not exist", table_name));
                return;
            }
        };

        let targets: Vec<ColumnDef> = match node.find(Rule::ColumnList) {
            Some(list) => {
                let mut out = Vec::new();
                for cr in list.children_with(Rule::ColumnRef) {
                    let tok = match cr.ident_child(0) {
                        Some(t) => t,
                        None => continue,
                    };
                    match table.column(tok.lexeme) {
                        Some(c) => out.push(c.clone()),
                        None => {
                            self.error(
                                tok.pos,
                                format!(
                                    "Column '{}' does not exist in table '{}'",
                                    tok.lexeme, table.name
                                ),
                            );
                            return;
                        }
                    }
                }
                out
            }
            None => table.columns.clone(),
        };

        let scope = Scope::single(&table);
        let values_idx = match node.children.iter().position(|c| c.rule == Rule::ValueList) {
            Some(i) => i,
            None => return,
        };
        let value_list = &mut node.children[values_idx];
        for row in value_list
            .children
            .iter_mut()
            .filter(|c| c.rule == Rule::Row)
        {
            let expr_idxs: Vec<usize> = row
                .children
                .iter()
                .enumerate()
                .filter(|(_, c)| c.rule != Rule::Terminal)
                .map(|(i, _)| i)
                .collect();
            if expr_idxs.len() != targets.len() {
                self.error(
                    row.pos,
                    format!(
                        "Column count mismatch: expected {} values but found {}",
                        targets.len(),
                        expr_idxs.len()
                    ),
                );
                continue;
            }
            for (idx, column) in expr_idxs.into_iter().zip(targets.iter()) {
                let value_pos = row.children[idx].pos;
                let is_literal = row.children[idx].rule == Rule::Literal;
                let vt = self.infer(&mut row.children[idx], &scope, AggregateUse::Forbidden);
                self.check_assignment(column, vt, is_literal, value_pos);
            }
        }
    }

    fn check_assignment(
        &mut self,
        column: &ColumnDef,
        value_type: SqlType,
        is_literal: bool,
        pos: Position,
    ) {
        if value_type == SqlType::Null {
            if column.is_not_null() {
                self.error(
                    pos,
                    format!(
                        "Column '{}' is declared NOT NULL; NULL value provided",
                        column.name
                    ),
                );
            }
            return;
        }
        if !assignment_compatible(column.declared_type, value_type) {
            let provided = if is_literal { "literal" } else { "value" };
            self.error(
                pos,
                format!(
                    "column '{}' declared {}, {} {} provided",
                    column.name,
                    column.type_name.to_ascii_uppercase(),
                    value_type_word(value_type),
                    provided
                ),
            );
        }
    }

    fn check_update(&mut self, node: &mut ParseTreeNode<'_>) {
        let (table_name, pos) = match node.ident_child(0) {
            Some(t) => (t.lexeme.to_string(), t.pos),
            None => return,
        };
        let table = match self.symbols.resolve(&table_name) {
            Some(t) => t.clone(),
            None => {
                self.error(pos, format!("Table '{}' does not exist", table_name));
                return;
            }
        };
        let scope = Scope::single(&table);

        for child in node.children.iter_mut() {
            match child.rule {
                Rule::Assignment => {
                    let column = match child.children[0].ident_child(0) {
                        Some(t) => {
                            let looked_up = table.column(t.lexeme).cloned();
                            if looked_up.is_none() {
                                let (name, tpos) = (t.lexeme.to_string(), t.pos);
                                self.error(
                                    tpos,
                                    format!(
                                        "Column '{}' does not exist in table '{}'",
                                        name, table.name
                                    ),
                                );
                            }
                            looked_up
                        }
                        None => None,
                    };
                    if let Some(col) = &column {
                        child.children[0].ty = Some(col.declared_type);
                    }
                    let value_idx = child.children.len() - 1;
                    let value_pos = child.children[value_idx].pos;
                    let is_literal = child.children[value_idx].rule == Rule::Literal;
                    let vt =
                        self.infer(&mut child.children[value_idx], &scope, AggregateUse::Forbidden);
                    if let Some(col) = column {
                        self.check_assignment(&col, vt, is_literal, value_pos);
                    }
                }
                Rule::WhereClause => {
                    self.check_condition_clause(child, &scope, AggregateUse::Forbidden, "WHERE");
                }
                _ => {}
            }
        }
    }

    fn check_delete(&mut self, node: &mut ParseTreeNode<'_>) {
        let (table_name, pos) = match node.ident_child(0) {
            Some(t) => (t.lexeme.to_string(), t.pos),
            None => return,
        };
        let table = match self.symbols.resolve(&table_name) {
            Some(t) => t.clone(),
            None => {
                self.error(pos, format!("Table '{}' does not exist", table_name));
                return;
            }
        };
        let scope = Scope::single(&table);
        if let Some(clause) = node.find_mut(Rule::WhereClause) {
            // find_mut borrows node, so the boolean check runs inline
            let idx = clause.children.iter().position(|c| c.rule != Rule::Terminal);
            if let Some(idx) = idx {
                let pos = clause.children[idx].pos;
                let ty = self.infer(&mut clause.children[idx], &scope, AggregateUse::Forbidden);
                if !ty.is_boolean_compatible() {
                    self.error(
                        pos,
                        format!("WHERE clause must be a boolean condition, found {}", ty),
                    );
                }
            }
        }
    }

    // ==================== Type inference ====================

    fn infer(
        &mut self,
        node: &mut ParseTreeNode<'_>,
        scope: &Scope,
        aggregates: AggregateUse,
    ) -> SqlType {
        let ty = match node.rule {
            Rule::Literal => self.literal_type(node),
            Rule::ColumnRef => self.column_ref_type(node, scope),
            Rule::Expression => self.binary_type(node, scope, aggregates),
            Rule::Unary => self.unary_type(node, scope, aggregates),
            Rule::Paren => self.infer(&mut node.children[1], scope, aggregates),
            Rule::Subquery => {
                if let Some(idx) = node.children.iter().position(|c| c.rule == Rule::SelectStmt) {
                    let inner_scope = self.select_scope(&node.children[idx]);
                    self.check_select(&mut node.children[idx], &inner_scope);
                }
                SqlType::Unknown
            }
            Rule::FunctionCall => self.function_type(node, scope, aggregates),
            Rule::Comparison => self.comparison_type(node, scope, aggregates),
            Rule::Between => self.between_type(node, scope, aggregates),
            Rule::InList => self.in_list_type(node, scope, aggregates),
            Rule::Like => self.like_type(node, scope, aggregates),
            Rule::IsNull => {
                let idx = node
                    .children
                    .iter()
                    .position(|c| c.rule != Rule::Terminal)
                    .unwrap_or(0);
                self.infer(&mut node.children[idx], scope, aggregates);
                SqlType::Boolean
            }
            Rule::Not => {
                let idx = node.children.len() - 1;
                let pos = node.children[idx].pos;
                let inner = self.infer(&mut node.children[idx], scope, aggregates);
                if !inner.is_boolean_compatible() {
                    self.error(pos, format!("NOT requires a boolean operand, found {}", inner));
                }
                SqlType::Boolean
            }
            Rule::And | Rule::Or => {
                let word = if node.rule == Rule::And { "AND" } else { "OR" };
                let left_pos = node.children[0].pos;
                let lt = self.infer(&mut node.children[0], scope, aggregates);
                let rt = self.infer(&mut node.children[2], scope, aggregates);
                if !lt.is_boolean_compatible() {
                    self.error(
                        left_pos,
                        format!("'{}' requires boolean operands, found {}", word, lt),
                    );
                } else if !rt.is_boolean_compatible() {
                    let right_pos = node.children[2].pos;
                    self.error(
                        right_pos,
                        format!("'{}' requires boolean operands, found {}", word, rt),
                    );
                }
                SqlType::Boolean
            }
            Rule::SelectItem => self.infer(&mut node.children[0], scope, aggregates),
            Rule::Error => SqlType::Unknown,
            _ => SqlType::Unknown,
        };
        node.ty = Some(ty);
        ty
    }

    fn literal_type(&self, node: &ParseTreeNode<'_>) -> SqlType {
        let token = match &node.token {
            Some(t) => t,
            None => return SqlType::Unknown,
        };
        match token.kind {
            TokenKind::Integer => SqlType::Integer,
            TokenKind::Float => SqlType::Float,
            TokenKind::String => SqlType::Text,
            TokenKind::Keyword => match token.keyword() {
                Some(Keyword::True | Keyword::False) => SqlType::Boolean,
                Some(Keyword::Null) => SqlType::Null,
                _ => SqlType::Unknown,
            },
            _ => SqlType::Unknown,
        }
    }

    fn column_ref_type(&mut self, node: &ParseTreeNode<'_>, scope: &Scope) -> SqlType {
        let idents: Vec<(&str, Position)> = node
            .children
            .iter()
            .filter_map(|c| c.token.as_ref())
            .filter(|t| t.kind == TokenKind::Identifier)
            .map(|t| (t.lexeme, t.pos))
            .collect();
        let qualified_star = node
            .children
            .last()
            .and_then(|c| c.token.as_ref())
            .is_some_and(|t| t.is_symbol("*"));

        if let [(prefix, pos)] = idents.as_slice() {
            if qualified_star {
                let (prefix, pos) = (prefix.to_string(), *pos);
                if scope.resolve_table(&prefix).is_none() && !scope.is_empty() {
                    self.error(
                        pos,
                        format!("Table or alias '{}' not found in current scope", prefix),
                    );
                }
                return SqlType::Unknown;
            }
            let (name, pos) = (prefix.to_string(), *pos);
            return match scope.resolve_column(&name) {
                Lookup::Unique(_, column) => column.declared_type,
                Lookup::Ambiguous => {
                    self.error(pos, format!("Ambiguous column reference '{}'", name));
                    SqlType::Unknown
                }
                Lookup::NotFound => {
                    if !scope.is_empty() {
                        self.error(
                            pos,
                            format!(
                                "Column '{}' does not exist in any of the referenced tables",
                                name
                            ),
                        );
                    }
                    SqlType::Unknown
                }
            };
        }

        if let [(prefix, prefix_pos), (column, column_pos)] = idents.as_slice() {
            let (prefix, prefix_pos) = (prefix.to_string(), *prefix_pos);
            let (column, column_pos) = (column.to_string(), *column_pos);
            return match scope.resolve_table(&prefix) {
                Some(table) => match table.column(&column) {
                    Some(c) => c.declared_type,
                    None => {
                        let table_name = table.name.clone();
                        self.error(
                            column_pos,
                            format!(
                                "Column '{}' does not exist in table '{}'",
                                column, table_name
                            ),
                        );
                        SqlType::Unknown
                    }
                },
                None => {
                    if !scope.is_empty() {
                        self.error(
                            prefix_pos,
                            format!("Table or alias '{}' not found in current scope", prefix),
                        );
                    }
                    SqlType::Unknown
                }
            };
        }
        SqlType::Unknown
    }

    fn binary_type(
        &mut self,
        node: &mut ParseTreeNode<'_>,
        scope: &Scope,
        aggregates: AggregateUse,
    ) -> SqlType {
        let op = node.children[1]
            .token
            .as_ref()
            .map(|t| t.lexeme)
            .unwrap_or("+")
            .to_string();
        let zero_divisor = matches!(op.as_str(), "/" | "%")
            && match node.children[2].token.as_ref().map(|t| &t.value) {
                Some(Value::Int(0)) => true,
                Some(Value::Float(f)) => *f == 0.0,
                _ => false,
            };
        let op_pos = node.children[1].pos;

        let lt = self.infer(&mut node.children[0], scope, aggregates);
        let rt = self.infer(&mut node.children[2], scope, aggregates);

        if op == "||" {
            if text_compatible(lt) && text_compatible(rt) {
                return SqlType::Text;
            }
            self.error(
                op_pos,
                format!("operator '||' requires text operands, found {} and {}", lt, rt),
            );
            return SqlType::Unknown;
        }

        if zero_divisor {
            self.warn(op_pos, "division by zero");
        }

        if lt == SqlType::Unknown || rt == SqlType::Unknown {
            return SqlType::Unknown;
        }
        if lt == SqlType::Null || rt == SqlType::Null {
            return SqlType::Null;
        }
        if lt.is_numeric() && rt.is_numeric() {
            if lt == SqlType::Float || rt == SqlType::Float {
                return SqlType::Float;
            }
            return SqlType::Integer;
        }
        let offender = if lt.is_numeric() { rt } else { lt };
        self.error(
            op_pos,
            format!(
                "arithmetic operator '{}' requires numeric operands, found {}",
                op, offender
            ),
        );
        SqlType::Unknown
    }

    fn unary_type(
        &mut self,
        node: &mut ParseTreeNode<'_>,
        scope: &Scope,
        aggregates: AggregateUse,
    ) -> SqlType {
        let pos = node.children[1].pos;
        let inner = self.infer(&mut node.children[1], scope, aggregates);
        match inner {
            SqlType::Integer | SqlType::Float | SqlType::Null | SqlType::Unknown => inner,
            other => {
                self.error(
                    pos,
                    format!("unary operator requires a numeric operand, found {}", other),
                );
                SqlType::Unknown
            }
        }
    }

    fn function_type(
        &mut self,
        node: &mut ParseTreeNode<'_>,
        scope: &Scope,
        aggregates: AggregateUse,
    ) -> SqlType {
        let name_token = node.children.first().and_then(|c| c.token.as_ref());
        let keyword = name_token.and_then(|t| t.keyword());
        let name = name_token
            .map(|t| t.lexeme.to_ascii_uppercase())
            .unwrap_or_default();
        let pos = node.pos;

        if keyword.is_some_and(|k| k.is_aggregate()) && aggregates == AggregateUse::Forbidden {
            self.error(
                pos,
                format!("Aggregate function '{}' is not allowed in WHERE", name),
            );
        }

        let arg_idxs: Vec<usize> = node
            .children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.rule != Rule::Terminal)
            .map(|(i, _)| i)
            .collect();
        let mut arg_types = Vec::with_capacity(arg_idxs.len());
        for idx in arg_idxs {
            arg_types.push(self.infer(&mut node.children[idx], scope, aggregates));
        }
        let first_arg = arg_types.first().copied().unwrap_or(SqlType::Unknown);

        match keyword {
            Some(Keyword::Count) => SqlType::Integer,
            Some(Keyword::Sum | Keyword::Min | Keyword::Max) => {
                if matches!(keyword, Some(Keyword::Sum))
                    && !matches!(
                        first_arg,
                        SqlType::Integer | SqlType::Float | SqlType::Null | SqlType::Unknown
                    )
                {
                    self.error(
                        pos,
                        format!("Aggregate '{}' requires a numeric argument, found {}", name, first_arg),
                    );
                    return SqlType::Unknown;
                }
                first_arg
            }
            Some(Keyword::Avg) => {
                if !matches!(
                    first_arg,
                    SqlType::Integer | SqlType::Float | SqlType::Null | SqlType::Unknown
                ) {
                    self.error(
                        pos,
                        format!("Aggregate 'AVG' requires a numeric argument, found {}", first_arg),
                    );
                    return SqlType::Unknown;
                }
                SqlType::Float
            }
            Some(Keyword::Length) => SqlType::Integer,
            Some(Keyword::Upper | Keyword::Lower | Keyword::Substr) => SqlType::Text,
            Some(Keyword::Round | Keyword::Floor | Keyword::Ceil) => SqlType::Integer,
            Some(Keyword::Coalesce) => first_arg,
            _ => SqlType::Unknown,
        }
    }

    fn comparison_type(
        &mut self,
        node: &mut ParseTreeNode<'_>,
        scope: &Scope,
        aggregates: AggregateUse,
    ) -> SqlType {
        let op_pos = node.children[1].pos;
        let lt = self.infer(&mut node.children[0], scope, aggregates);
        let rt = self.infer(&mut node.children[2], scope, aggregates);
        if !comparable(lt, rt) {
            self.error(
                op_pos,
                format!("Type mismatch in comparison: cannot compare {} with {}", lt, rt),
            );
        }
        SqlType::Boolean
    }

    fn between_type(
        &mut self,
        node: &mut ParseTreeNode<'_>,
        scope: &Scope,
        aggregates: AggregateUse,
    ) -> SqlType {
        let idxs: Vec<usize> = node
            .children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.rule != Rule::Terminal)
            .map(|(i, _)| i)
            .collect();
        let mut types = Vec::with_capacity(idxs.len());
        let mut positions = Vec::with_capacity(idxs.len());
        for idx in idxs {
            positions.push(node.children[idx].pos);
            types.push(self.infer(&mut node.children[idx], scope, aggregates));
        }
        if let [subject, low, high] = types.as_slice() {
            if !comparable(*subject, *low) || !comparable(*subject, *high) {
                self.error(
                    positions[0],
                    format!("Type mismatch in BETWEEN: cannot compare {} with {} and {}", subject, low, high),
                );
            }
        }
        SqlType::Boolean
    }

    fn in_list_type(
        &mut self,
        node: &mut ParseTreeNode<'_>,
        scope: &Scope,
        aggregates: AggregateUse,
    ) -> SqlType {
        let subject_pos = node.children[0].pos;
        let subject = self.infer(&mut node.children[0], scope, aggregates);
        let idxs: Vec<(usize, Rule)> = node
            .children
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, c)| c.rule != Rule::Terminal)
            .map(|(i, c)| (i, c.rule))
            .collect();
        for (idx, rule) in idxs {
            if rule == Rule::SelectStmt {
                let inner_scope = self.select_scope(&node.children[idx]);
                self.check_select(&mut node.children[idx], &inner_scope);
                continue;
            }
            let item = self.infer(&mut node.children[idx], scope, aggregates);
            if !comparable(subject, item) {
                self.error(
                    subject_pos,
                    format!("Type mismatch in IN list: cannot compare {} with {}", subject, item),
                );
                break;
            }
        }
        SqlType::Boolean
    }

    fn like_type(
        &mut self,
        node: &mut ParseTreeNode<'_>,
        scope: &Scope,
        aggregates: AggregateUse,
    ) -> SqlType {
        let subject_pos = node.children[0].pos;
        let lt = self.infer(&mut node.children[0], scope, aggregates);
        let idx = node.children.len() - 1;
        let rt = self.infer(&mut node.children[idx], scope, aggregates);
        if !text_compatible(lt) || !text_compatible(rt) {
            self.error(
                subject_pos,
                format!("LIKE requires text operands, found {} and {}", lt, rt),
            );
        }
        SqlType::Boolean
    }
}

fn text_compatible(ty: SqlType) -> bool {
    matches!(ty, SqlType::Text | SqlType::Null | SqlType::Unknown)
}

fn comparable(a: SqlType, b: SqlType) -> bool {
    if a == SqlType::Unknown || b == SqlType::Unknown {
        return true;
    }
    if a == SqlType::Null || b == SqlType::Null {
        return true;
    }
    if a.is_numeric() && b.is_numeric() {
        return true;
    }
    a == b
}

/// Widening-only assignment: INTEGER values flow into FLOAT columns, never
/// the other way, and text never crosses into numerics or booleans.
fn assignment_compatible(column: SqlType, value: SqlType) -> bool {
    if column == SqlType::Unknown || value == SqlType::Unknown {
        return true;
    }
    if column == value {
        return true;
    }
    column == SqlType::Float && value == SqlType::Integer
}

fn value_type_word(ty: SqlType) -> &'static str {
    match ty {
        SqlType::Integer => "INTEGER",
        SqlType::Float => "FLOAT",
        SqlType::Text => "STRING",
        SqlType::Boolean => "BOOLEAN",
        SqlType::Date => "DATE",
        SqlType::Null => "NULL",
        SqlType::Unknown => "UNKNOWN",
    }
}

/// Written column name of a reference: the qualified part when present.
fn column_ref_name(node: &ParseTreeNode<'_>) -> Option<String> {
    node.children
        .iter()
        .filter_map(|c| c.token.as_ref())
        .filter(|t| t.kind == TokenKind::Identifier)
        .last()
        .map(|t| t.lexeme.to_string())
}

/// Per-statement name bindings: FROM-clause aliases over snapshots of the
/// ambient symbol table.
#[derive(Default, Clone)]
struct Scope {
    tables: Vec<(String, TableDef)>,
}

enum Lookup<'s> {
    Unique(&'s TableDef, &'s ColumnDef),
    Ambiguous,
    NotFound,
}

impl Scope {
    fn single(table: &TableDef) -> Self {
        let mut scope = Scope::default();
        scope.bind(&table.name, table.clone());
        scope
    }

    fn bind(&mut self, alias: &str, table: TableDef) {
        self.tables.push((alias.to_ascii_uppercase(), table));
    }

    fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn resolve_table(&self, name: &str) -> Option<&TableDef> {
        let key = name.to_ascii_uppercase();
        self.tables
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, t)| t)
    }

    fn resolve_column(&self, name: &str) -> Lookup<'_> {
        let mut found: Option<(&TableDef, &ColumnDef)> = None;
        for (_, table) in &self.tables {
            if let Some(column) = table.column(name) {
                if found.is_some() {
                    return Lookup::Ambiguous;
                }
                found = Some((table, column));
            }
        }
        match found {
            Some((table, column)) => Lookup::Unique(table, column),
            None => Lookup::NotFound,
        }
    }
}
