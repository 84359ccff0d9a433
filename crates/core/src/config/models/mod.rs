pub mod app_config;
pub mod cluster;
pub mod database;
pub mod dispatcher;
pub mod manager;
pub mod observability;

pub use app_config::AppConfig;
pub use cluster::{ClusterConfig, TaskRecordConfig};
pub use database::DatabaseConfig;
pub use dispatcher::{QueueConfig, RpcConfig};
pub use manager::{ManagerConfig, SubmissionMode};
pub use observability::{AlertConfig, ObservabilityConfig};
