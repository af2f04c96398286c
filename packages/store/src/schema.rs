//! # Schema declarations for the relational store
//!
//! Every table the service persists is declared here as plain data: a
//! [`TableDef`] lists its [`ColumnDef`]s and [`IndexDef`]s. Nothing is inferred
//! from field names; the primary key is whichever column says so.
//!
//! The declarations are read in three places:
//!
//! | Consumer | Uses |
//! |----------|------|
//! | `api::db::migrate` | renders `CREATE TABLE` / `CREATE INDEX` and compares the live schema column by column |
//! | `api::db::PgStore` | maps SQLSTATE errors back to a table and column |
//! | [`crate::MemoryStore`] and the model validators | enforce `VARCHAR` lengths and unique indexes |
//!
//! [`TABLES`] is the creation order.

use crate::error::Constraint;

/// Semantic column type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    /// Server-assigned 32-bit integer backed by a sequence.
    Serial,
    /// String with a maximum length in characters.
    Varchar(u32),
    /// Timestamp with time zone, stored at microsecond precision.
    Timestamp,
}

impl ColumnType {
    /// Type as written in DDL.
    pub fn sql(&self) -> String {
        match self {
            ColumnType::Serial => "SERIAL".to_string(),
            ColumnType::Varchar(len) => format!("VARCHAR({len})"),
            ColumnType::Timestamp => "TIMESTAMPTZ".to_string(),
        }
    }

    /// Type as reported by `information_schema.columns.data_type`.
    pub fn data_type(&self) -> &'static str {
        match self {
            ColumnType::Serial => "integer",
            ColumnType::Varchar(_) => "character varying",
            ColumnType::Timestamp => "timestamp with time zone",
        }
    }

    pub fn max_length(&self) -> Option<u32> {
        match self {
            ColumnType::Varchar(len) => Some(*len),
            _ => None,
        }
    }
}

/// Value the storage layer fills in when an insert omits the column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefaultRule {
    Now,
}

impl DefaultRule {
    pub fn sql(&self) -> &'static str {
        match self {
            DefaultRule::Now => "NOW()",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub default: Option<DefaultRule>,
    pub primary_key: bool,
}

impl ColumnDef {
    const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            default: None,
            primary_key: false,
        }
    }

    const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    const fn default_now(mut self) -> Self {
        self.default = Some(DefaultRule::Now);
        self
    }

    const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// True when an insert (or `ADD COLUMN`) may leave this column out.
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.ty == ColumnType::Serial
    }

    /// Column fragment for `CREATE TABLE` and `ALTER TABLE ... ADD COLUMN`.
    pub fn definition_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.ty.sql());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default.sql());
        }
        sql
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub unique: bool,
}

impl IndexDef {
    pub fn create_sql(&self, table: &str) -> String {
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            self.name,
            table,
            self.columns.join(", ")
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub indexes: &'static [IndexDef],
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("    {}", c.definition_sql()))
            .collect::<Vec<_>>()
            .join(",\n");
        format!("CREATE TABLE IF NOT EXISTS {} (\n{}\n)", self.name, columns)
    }

    /// Reject a string PostgreSQL would not store in this column.
    ///
    /// `text` and `varchar` cannot hold a NUL character, and the length is
    /// checked against the declared `VARCHAR` limit.
    pub fn check_text(&self, column: &str, value: &str) -> Result<(), Constraint> {
        if value.contains('\0') {
            return Err(Constraint::NulCharacter {
                table: self.name.to_string(),
                column: column.to_string(),
            });
        }
        self.check_length(column, value)
    }

    /// Reject a string longer than the column's declared `VARCHAR` length.
    ///
    /// Length is counted in characters, the way PostgreSQL counts it.
    pub fn check_length(&self, column: &str, value: &str) -> Result<(), Constraint> {
        let Some(max) = self.column(column).and_then(|c| c.ty.max_length()) else {
            return Ok(());
        };
        if value.chars().count() > max as usize {
            return Err(Constraint::MaxLength {
                table: self.name.to_string(),
                column: column.to_string(),
                max,
            });
        }
        Ok(())
    }
}

pub const TEST_ITEMS: TableDef = TableDef {
    name: "test_items",
    columns: &[
        ColumnDef::new("id", ColumnType::Serial).primary_key(),
        ColumnDef::new("name", ColumnType::Varchar(200)),
        ColumnDef::new("created_at", ColumnType::Timestamp).default_now(),
    ],
    indexes: &[],
};

pub const USERS: TableDef = TableDef {
    name: "users",
    columns: &[
        ColumnDef::new("id", ColumnType::Serial).primary_key(),
        ColumnDef::new("email", ColumnType::Varchar(255)),
        ColumnDef::new("display_name", ColumnType::Varchar(100)).nullable(),
        ColumnDef::new("created_at", ColumnType::Timestamp).default_now(),
        ColumnDef::new("updated_at", ColumnType::Timestamp).nullable(),
    ],
    indexes: &[IndexDef {
        name: "ix_users_email",
        columns: &["email"],
        unique: true,
    }],
};

pub const TABLES: &[&TableDef] = &[&TEST_ITEMS, &USERS];

/// Find the table that owns a named index or constraint.
pub fn table_for_index(index: &str) -> Option<(&'static TableDef, &'static IndexDef)> {
    TABLES
        .iter()
        .copied()
        .find_map(|t| t.index(index).map(|i| (t, i)))
}
