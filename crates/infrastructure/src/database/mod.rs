pub mod in_memory;
pub mod manager;
pub mod sqlite;

pub use in_memory::{
    InMemoryJobStore, InMemoryScriptStore, InMemoryTemplateStore, InMemoryTestRecordStore,
};
pub use manager::DatabaseManager;
pub use sqlite::{SqliteJobStore, SqliteScriptStore, SqliteTemplateStore, SqliteTestRecordStore};
