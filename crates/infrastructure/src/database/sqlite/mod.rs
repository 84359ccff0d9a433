pub mod sqlite_job_store;
pub mod sqlite_script_store;
pub mod sqlite_template_store;
pub mod sqlite_test_record_store;

pub use sqlite_job_store::SqliteJobStore;
pub use sqlite_script_store::SqliteScriptStore;
pub use sqlite_template_store::SqliteTemplateStore;
pub use sqlite_test_record_store::SqliteTestRecordStore;
