//! # Symbol Table
//!
//! Schema registry shared by every statement of one compilation unit. DDL
//! statements mutate it (CREATE inserts, DROP removes, ALTER edits) and all
//! later statements in the same unit observe the mutations. Lookup is
//! case-insensitive; declared spellings are preserved for diagnostics.
//!
//! Views are recorded as tables whose columns derive from the projection of
//! their defining SELECT, flagged with `is_view` so DROP VIEW and DROP TABLE
//! can be told apart.

use crate::token::Position;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::fmt;

/// Inferred or declared type of a column or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Float,
    Text,
    Boolean,
    Date,
    /// The NULL literal, assignable to and comparable with anything.
    Null,
    /// Inference gave up; downstream rules stay silent on this value.
    Unknown,
}

impl SqlType {
    /// Map a declared type keyword to its semantic type.
    pub fn from_type_name(name: &str) -> Option<SqlType> {
        match name.to_ascii_uppercase().as_str() {
            "INT" | "INTEGER" => Some(SqlType::Integer),
            "FLOAT" | "DOUBLE" | "DECIMAL" | "NUMBER" => Some(SqlType::Float),
            "VARCHAR" | "TEXT" | "CHAR" => Some(SqlType::Text),
            "BOOLEAN" => Some(SqlType::Boolean),
            "DATE" => Some(SqlType::Date),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, SqlType::Integer | SqlType::Float)
    }

    /// Types a condition may have: BOOLEAN, numerics coerced to 0/nonzero,
    /// NULL, and UNKNOWN (to contain cascades).
    pub fn is_boolean_compatible(self) -> bool {
        matches!(
            self,
            SqlType::Boolean | SqlType::Integer | SqlType::Float | SqlType::Null | SqlType::Unknown
        )
    }

    pub fn is_text(self) -> bool {
        self == SqlType::Text
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::Integer => "INTEGER",
            SqlType::Float => "FLOAT",
            SqlType::Text => "TEXT",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Date => "DATE",
            SqlType::Null => "NULL",
            SqlType::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    PrimaryKey,
    NotNull,
    Unique,
    Default(String),
    Check,
    ForeignKey { table: String, column: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub declared_type: SqlType,
    /// Type name as written in the DDL, kept for diagnostics.
    pub type_name: String,
    pub constraints: SmallVec<[Constraint; 4]>,
    pub ordinal: usize,
}

impl ColumnDef {
    pub fn new(
        name: impl Into<String>,
        declared_type: SqlType,
        type_name: impl Into<String>,
        ordinal: usize,
    ) -> Self {
        Self {
            name: name.into(),
            declared_type,
            type_name: type_name.into(),
            constraints: SmallVec::new(),
            ordinal,
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn is_not_null(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::NotNull | Constraint::PrimaryKey))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub declared_at: Position,
    pub is_view: bool,
}

impl TableDef {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>, declared_at: Position) -> Self {
        Self {
            name: name.into(),
            columns,
            declared_at,
            is_view: false,
        }
    }

    pub fn view(name: impl Into<String>, columns: Vec<ColumnDef>, declared_at: Position) -> Self {
        Self {
            is_view: true,
            ..Self::new(name, columns, declared_at)
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// Case-insensitive registry of tables and views for one compilation unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    tables: HashMap<String, TableDef>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table. Returns `false` without replacing when a table or
    /// view of the same name already exists.
    pub fn define(&mut self, table: TableDef) -> bool {
        let key = table.name.to_ascii_uppercase();
        if self.tables.contains_key(&key) {
            return false;
        }
        self.tables.insert(key, table);
        true
    }

    pub fn resolve(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(&name.to_ascii_uppercase())
    }

    pub fn resolve_mut(&mut self, name: &str) -> Option<&mut TableDef> {
        self.tables.get_mut(&name.to_ascii_uppercase())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.tables.remove(&name.to_ascii_uppercase()).is_some()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables in declaration-name order, for deterministic display.
    pub fn tables(&self) -> Vec<&TableDef> {
        let mut all: Vec<&TableDef> = self.tables.values().collect();
        all.sort_by(|a, b| a.name.to_ascii_uppercase().cmp(&b.name.to_ascii_uppercase()));
        all
    }
}
