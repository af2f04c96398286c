//! # Record types for `test_items` and `users`
//!
//! Each table has a stored shape and an insert shape:
//!
//! | Stored | Insert | Update |
//! |--------|--------|--------|
//! | [`TestItem`] | [`NewTestItem`] | [`TestItemPatch`] |
//! | [`User`] | [`NewUser`] | — |
//!
//! Insert shapes leave out `id` (the store assigns it) and make `created_at`
//! optional; [`now`] fills it in when absent. A client that sends an `id` has it
//! silently ignored because serde skips unknown fields.
//!
//! All types serialise with camelCase keys (`createdAt`, `displayName`) and RFC 3339
//! timestamps. With the `sqlx` feature the stored shapes derive `FromRow` so the
//! PostgreSQL gateway can decode them straight from a query.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::schema::{TEST_ITEMS, USERS};

/// Current time at the precision the database keeps (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A row of `test_items`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct TestItem {
    pub id: i32,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl TestItem {
    /// Overwrite the mutable fields. `id` and `created_at` never change.
    pub fn apply(&mut self, patch: TestItemPatch) {
        self.name = patch.name;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTestItem {
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewTestItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: None,
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        TEST_ITEMS.check_text("name", &self.name)?;
        Ok(())
    }

    /// The timestamp to store: the caller's, or now.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
            .map(|t| t.trunc_subsecs(6))
            .unwrap_or_else(now)
    }
}

/// Replacement values for the mutable fields of a [`TestItem`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestItemPatch {
    pub name: String,
}

impl TestItemPatch {
    pub fn validate(&self) -> Result<(), StoreError> {
        TEST_ITEMS.check_text("name", &self.name)?;
        Ok(())
    }
}

/// A row of `users`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewUser {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: None,
            created_at: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        USERS.check_text("email", &self.email)?;
        if let Some(name) = &self.display_name {
            USERS.check_text("display_name", name)?;
        }
        Ok(())
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
            .map(|t| t.trunc_subsecs(6))
            .unwrap_or_else(now)
    }
}
