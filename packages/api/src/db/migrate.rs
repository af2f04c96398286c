//! # Startup schema migration
//!
//! Brings the live database in line with [`store::schema::TABLES`] before the
//! server accepts traffic. Migration is additive only:
//!
//! - a missing table is created with all its columns and indexes;
//! - a missing column is added when it is nullable or has a default;
//! - a missing index is created;
//! - anything else that disagrees with the declaration (another type, another
//!   `VARCHAR` length, other nullability, a missing `NOT NULL` column with no
//!   default, an index of the declared name that is not unique or covers other
//!   columns) is [`MigrationError::Incompatible`] and startup stops.
//!
//! Columns the declaration does not mention are left alone.
//!
//! [`run`] holds a transaction-scoped advisory lock so that several instances
//! starting together apply the changes once, executes everything in that one
//! transaction, and writes each applied step to the `schema_history` table.
//! On a database that already conforms it changes nothing.
//!
//! [`plan`] is the pure half: given the declaration and what
//! `information_schema` and `pg_index` report, it returns the [`Step`]s to apply.

use sqlx::{PgConnection, PgPool};
use store::schema::{ColumnDef, IndexDef, TableDef, TABLES};
use thiserror::Error;

/// Key for `pg_advisory_xact_lock`, shared by every instance of the service.
const MIGRATION_LOCK_KEY: i64 = 0x5343_4146_464f_4c44;

const HISTORY_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS schema_history (
    id SERIAL PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("database error during migration: {0}")]
    Database(#[from] sqlx::Error),
    #[error("table {table} does not match the declared schema: {reason}")]
    Incompatible { table: String, reason: String },
}

/// A column as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LiveColumn {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub max_length: Option<i32>,
}

/// An index as reported by `pg_index`, with its key columns in order.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LiveIndex {
    pub name: String,
    pub is_unique: bool,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateTable(&'static TableDef),
    AddColumn {
        table: &'static TableDef,
        column: &'static ColumnDef,
    },
    CreateIndex {
        table: &'static TableDef,
        index: &'static IndexDef,
    },
}

impl Step {
    pub fn sql(&self) -> String {
        match self {
            Step::CreateTable(table) => table.create_sql(),
            Step::AddColumn { table, column } => format!(
                "ALTER TABLE {} ADD COLUMN {}",
                table.name,
                column.definition_sql()
            ),
            Step::CreateIndex { table, index } => index.create_sql(table.name),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Step::CreateTable(table) => format!("create table {}", table.name),
            Step::AddColumn { table, column } => {
                format!("add column {}.{}", table.name, column.name)
            }
            Step::CreateIndex { table, index } => {
                format!("create index {} on {}", index.name, table.name)
            }
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Descriptions of the steps applied, in order.
    pub applied: Vec<String>,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Work out the steps that make `table` match its declaration.
pub fn plan(
    table: &'static TableDef,
    live_columns: &[LiveColumn],
    live_indexes: &[LiveIndex],
) -> Result<Vec<Step>, MigrationError> {
    if live_columns.is_empty() {
        let mut steps = vec![Step::CreateTable(table)];
        steps.extend(table.indexes.iter().map(|index| Step::CreateIndex { table, index }));
        return Ok(steps);
    }

    let incompatible = |reason: String| MigrationError::Incompatible {
        table: table.name.to_string(),
        reason,
    };

    let mut steps = Vec::new();
    for column in table.columns {
        let Some(live) = live_columns.iter().find(|c| c.name == column.name) else {
            if column.nullable || column.has_default() {
                steps.push(Step::AddColumn { table, column });
                continue;
            }
            return Err(incompatible(format!(
                "required column {} is missing and has no default",
                column.name
            )));
        };

        if live.data_type != column.ty.data_type() {
            return Err(incompatible(format!(
                "column {} is {}, expected {}",
                column.name,
                live.data_type,
                column.ty.data_type()
            )));
        }
        let expected_len = column.ty.max_length().map(|len| len as i32);
        if live.max_length != expected_len {
            return Err(incompatible(format!(
                "column {} has length {:?}, expected {:?}",
                column.name, live.max_length, expected_len
            )));
        }
        let expected_nullable = column.nullable && !column.primary_key;
        if live.nullable != expected_nullable {
            return Err(incompatible(format!(
                "column {} is {}, expected {}",
                column.name,
                if live.nullable { "nullable" } else { "NOT NULL" },
                if expected_nullable { "nullable" } else { "NOT NULL" },
            )));
        }
    }

    let kind = |unique: bool| if unique { "unique" } else { "non-unique" };
    for index in table.indexes {
        let Some(live) = live_indexes.iter().find(|i| i.name == index.name) else {
            steps.push(Step::CreateIndex { table, index });
            continue;
        };
        if live.is_unique != index.unique || live.columns != index.columns {
            return Err(incompatible(format!(
                "index {} is {} on ({}), expected {} on ({})",
                index.name,
                kind(live.is_unique),
                live.columns.join(", "),
                kind(index.unique),
                index.columns.join(", ")
            )));
        }
    }
    Ok(steps)
}

/// Apply every pending step for every declared table, once, in one transaction.
pub async fn run(pool: &PgPool) -> Result<MigrationReport, MigrationError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *tx)
        .await?;
    sqlx::query(HISTORY_TABLE_SQL).execute(&mut *tx).await?;

    let mut report = MigrationReport::default();
    for &table in TABLES {
        let columns = live_columns(&mut tx, table.name).await?;
        let indexes = live_indexes(&mut tx, table.name).await?;

        for step in plan(table, &columns, &indexes)? {
            let description = step.description();
            tracing::info!(step = %description, "applying schema change");

            sqlx::query(&step.sql()).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_history (description) VALUES ($1)")
                .bind(&description)
                .execute(&mut *tx)
                .await?;
            report.applied.push(description);
        }
    }

    tx.commit().await?;

    if report.is_empty() {
        tracing::debug!("schema is up to date");
    } else {
        tracing::info!(count = report.applied.len(), "applied schema changes");
    }
    Ok(report)
}

async fn live_columns(
    conn: &mut PgConnection,
    table: &str,
) -> Result<Vec<LiveColumn>, sqlx::Error> {
    sqlx::query_as(
        "SELECT column_name::text AS name, \
                data_type::text AS data_type, \
                is_nullable = 'YES' AS nullable, \
                character_maximum_length::int4 AS max_length \
         FROM information_schema.columns \
         WHERE table_schema = current_schema() AND table_name = $1 \
         ORDER BY ordinal_position",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await
}

async fn live_indexes(
    conn: &mut PgConnection,
    table: &str,
) -> Result<Vec<LiveIndex>, sqlx::Error> {
    sqlx::query_as(
        "SELECT i.relname::text AS name, \
                x.indisunique AS is_unique, \
                ARRAY( \
                    SELECT a.attname::text \
                    FROM unnest(x.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord) \
                    JOIN pg_attribute a ON a.attrelid = x.indrelid AND a.attnum = k.attnum \
                    ORDER BY k.ord \
                ) AS columns \
         FROM pg_index x \
         JOIN pg_class i ON i.oid = x.indexrelid \
         JOIN pg_class t ON t.oid = x.indrelid \
         JOIN pg_namespace n ON n.oid = t.relnamespace \
         WHERE n.nspname = current_schema() AND t.relname = $1",
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await
}
