//! # PgStore: `RecordStore` over PostgreSQL
//!
//! Queries are written out by hand against the tables declared in
//! [`store::schema`]; rows decode straight into the `store` models through
//! their `FromRow` derives.
//!
//! Reads and single-statement writes run on a pooled connection. Updates open a
//! transaction, lock the row with `SELECT ... FOR UPDATE`, apply the patch and
//! commit; an early return drops the transaction, which rolls it back.
//!
//! ## Error mapping
//!
//! | sqlx error | StoreError |
//! |------------|------------|
//! | SQLSTATE `23505` unique_violation | `Constraint::Unique`, resolved to a column through the index name |
//! | SQLSTATE `23502` not_null_violation | `Constraint::Required` |
//! | pool timeout / pool closed / I/O / TLS | `Unavailable` |
//! | anything else | `Database` |

use sqlx::postgres::PgDatabaseError;
use sqlx::PgPool;
use store::schema::table_for_index;
use store::{
    Constraint, NewTestItem, NewUser, RecordStore, StoreError, TestItem, TestItemPatch, User,
};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RecordStore for PgStore {
    async fn check_connectivity(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn list_test_items(&self) -> Result<Vec<TestItem>, StoreError> {
        sqlx::query_as("SELECT id, name, created_at FROM test_items ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn get_test_item(&self, id: i32) -> Result<Option<TestItem>, StoreError> {
        sqlx::query_as("SELECT id, name, created_at FROM test_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn insert_test_item(&self, item: NewTestItem) -> Result<TestItem, StoreError> {
        item.validate()?;
        let created_at = item.created_at();

        let row: TestItem = sqlx::query_as(
            "INSERT INTO test_items (name, created_at) VALUES ($1, $2) \
             RETURNING id, name, created_at",
        )
        .bind(&item.name)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        tracing::debug!(id = row.id, "inserted test item");
        Ok(row)
    }

    async fn update_test_item(
        &self,
        id: i32,
        patch: TestItemPatch,
    ) -> Result<Option<TestItem>, StoreError> {
        patch.validate()?;

        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let current: Option<TestItem> = sqlx::query_as(
            "SELECT id, name, created_at FROM test_items WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_error)?;

        let Some(mut item) = current else {
            return Ok(None);
        };
        item.apply(patch);

        sqlx::query("UPDATE test_items SET name = $2 WHERE id = $1")
            .bind(id)
            .bind(&item.name)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;
        tracing::debug!(id, "updated test item");
        Ok(Some(item))
    }

    async fn delete_test_item(&self, id: i32) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM test_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        sqlx::query_as(
            "SELECT id, email, display_name, created_at, updated_at FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)
    }

    async fn get_user(&self, id: i32) -> Result<Option<User>, StoreError> {
        sqlx::query_as(
            "SELECT id, email, display_name, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        user.validate()?;
        let created_at = user.created_at();

        let row: User = sqlx::query_as(
            "INSERT INTO users (email, display_name, created_at) VALUES ($1, $2, $3) \
             RETURNING id, email, display_name, created_at, updated_at",
        )
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        tracing::debug!(id = row.id, "inserted user");
        Ok(row)
    }
}

fn store_error(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => {
                let constraint = db.constraint().unwrap_or_default();
                let (table, column) = match table_for_index(constraint) {
                    Some((table, index)) => (table.name.to_string(), index.columns.join(", ")),
                    None => (
                        db.table().unwrap_or_default().to_string(),
                        constraint.to_string(),
                    ),
                };
                Constraint::Unique { table, column }.into()
            }
            Some("23502") => {
                let pg = db.try_downcast_ref::<PgDatabaseError>();
                Constraint::Required {
                    table: pg.and_then(|e| e.table()).unwrap_or_default().to_string(),
                    column: pg.and_then(|e| e.column()).unwrap_or_default().to_string(),
                }
                .into()
            }
            _ => StoreError::Database(error.to_string()),
        },
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(error.to_string()),
        _ => StoreError::Database(error.to_string()),
    }
}
