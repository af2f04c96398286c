use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Constraint, StoreError};
use crate::models::{NewTestItem, NewUser, TestItem, TestItemPatch, User};
use crate::repo::RecordStore;
use crate::schema::USERS;

/// In-memory RecordStore for testing and local runs without PostgreSQL.
///
/// Tables are `BTreeMap`s keyed by id so listings come out in id order. Ids are
/// handed out from per-table sequences starting at 1 and are never reused.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Debug, Default)]
struct Tables {
    test_items: BTreeMap<i32, TestItem>,
    users: BTreeMap<i32, User>,
    test_item_seq: i32,
    user_seq: i32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // Every write completes under the guard, so a poisoned table is still consistent.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordStore for MemoryStore {
    async fn check_connectivity(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_test_items(&self) -> Result<Vec<TestItem>, StoreError> {
        Ok(self.lock().test_items.values().cloned().collect())
    }

    async fn get_test_item(&self, id: i32) -> Result<Option<TestItem>, StoreError> {
        Ok(self.lock().test_items.get(&id).cloned())
    }

    async fn insert_test_item(&self, item: NewTestItem) -> Result<TestItem, StoreError> {
        item.validate()?;
        let created_at = item.created_at();

        let mut tables = self.lock();
        tables.test_item_seq += 1;
        let row = TestItem {
            id: tables.test_item_seq,
            name: item.name,
            created_at,
        };
        tables.test_items.insert(row.id, row.clone());
        tracing::debug!(id = row.id, "inserted test item");
        Ok(row)
    }

    async fn update_test_item(
        &self,
        id: i32,
        patch: TestItemPatch,
    ) -> Result<Option<TestItem>, StoreError> {
        patch.validate()?;

        let mut tables = self.lock();
        let Some(row) = tables.test_items.get_mut(&id) else {
            return Ok(None);
        };
        row.apply(patch);
        Ok(Some(row.clone()))
    }

    async fn delete_test_item(&self, id: i32) -> Result<bool, StoreError> {
        Ok(self.lock().test_items.remove(&id).is_some())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.lock().users.values().cloned().collect())
    }

    async fn get_user(&self, id: i32) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        user.validate()?;
        let created_at = user.created_at();

        let mut tables = self.lock();
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(Constraint::Unique {
                table: USERS.name.to_string(),
                column: "email".to_string(),
            }
            .into());
        }
        tables.user_seq += 1;
        let row = User {
            id: tables.user_seq,
            email: user.email,
            display_name: user.display_name,
            created_at,
            updated_at: None,
        };
        tables.users.insert(row.id, row.clone());
        tracing::debug!(id = row.id, "inserted user");
        Ok(row)
    }
}
