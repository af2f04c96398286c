//! # RecordStore: the persistence gateway contract
//!
//! Every HTTP handler talks to storage through [`RecordStore`], so the same
//! router runs against PostgreSQL (`api::db::PgStore`) in production and against
//! [`crate::MemoryStore`] in tests and `--memory` runs.
//!
//! ## Contract
//!
//! | Method | Absent row | Notes |
//! |--------|-----------|-------|
//! | `list_*` | — | ordered by `id` ascending |
//! | `get_*` | `Ok(None)` | |
//! | `insert_*` | — | assigns `id`, stamps `created_at` when missing, [`Constraint`](crate::Constraint) on length or uniqueness |
//! | [`update_test_item`](RecordStore::update_test_item) | `Ok(None)` | replaces `name` only |
//! | [`delete_test_item`](RecordStore::delete_test_item) | `Ok(false)` | |
//! | [`check_connectivity`](RecordStore::check_connectivity) | — | no side effects |
//!
//! Each call is its own commit scope: a write either lands completely or not at
//! all, and nothing is held between calls.

use std::future::Future;

use crate::error::StoreError;
use crate::models::{NewTestItem, NewUser, TestItem, TestItemPatch, User};

pub trait RecordStore: Clone + Send + Sync + 'static {
    fn check_connectivity(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn list_test_items(&self) -> impl Future<Output = Result<Vec<TestItem>, StoreError>> + Send;
    fn get_test_item(
        &self,
        id: i32,
    ) -> impl Future<Output = Result<Option<TestItem>, StoreError>> + Send;
    fn insert_test_item(
        &self,
        item: NewTestItem,
    ) -> impl Future<Output = Result<TestItem, StoreError>> + Send;
    fn update_test_item(
        &self,
        id: i32,
        patch: TestItemPatch,
    ) -> impl Future<Output = Result<Option<TestItem>, StoreError>> + Send;
    fn delete_test_item(&self, id: i32) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn list_users(&self) -> impl Future<Output = Result<Vec<User>, StoreError>> + Send;
    fn get_user(&self, id: i32) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;
    fn insert_user(&self, user: NewUser) -> impl Future<Output = Result<User, StoreError>> + Send;
}
