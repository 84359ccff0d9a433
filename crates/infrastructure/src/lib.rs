pub mod agent;
pub mod alert;
pub mod archive;
pub mod database;
pub mod kubernetes;
pub mod log_sink;
pub mod observability;
pub mod script_catalog;

pub use agent::*;
pub use alert::*;
pub use archive::ZipScriptArchiver;
pub use database::*;
pub use kubernetes::*;
pub use log_sink::FileLogSink;
pub use observability::*;
pub use script_catalog::ScriptCatalog;
