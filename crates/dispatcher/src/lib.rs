//! 巡检作业调度
//!
//! 集群队列、作业状态机、脚本下发、结果汇总、定时任务和任务记录监听。

pub mod cron_manager;
pub mod cron_utils;
pub mod job_processor;
pub mod queue_manager;
pub mod result_aggregator;
pub mod rpc_dispatcher;
pub mod submission;
pub mod task_watcher;

pub use cron_manager::CronManager;
pub use cron_utils::{build_cron_spec, CronScheduler};
pub use job_processor::JobProcessor;
pub use queue_manager::{JobHandler, QueueManager};
pub use result_aggregator::ResultAggregator;
pub use rpc_dispatcher::ScriptDispatcher;
pub use submission::JobSubmitter;
pub use task_watcher::TaskWatcher;
