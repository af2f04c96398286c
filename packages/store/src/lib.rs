pub mod error;
pub mod models;
pub mod repo;
pub mod schema;

mod memory;
pub use memory::MemoryStore;

pub use error::{Constraint, StoreError};
pub use models::{NewTestItem, NewUser, TestItem, TestItemPatch, User};
pub use repo::RecordStore;
