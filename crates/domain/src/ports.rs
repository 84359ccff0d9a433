//! 外部协作者端口
//!
//! 节点解析、Agent RPC、脚本打包、日志、告警和集群任务记录都通过这里的 trait 注入。

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use inspection_core::InspectionResult;

use crate::entities::{
    CardType, CheckResult, HealthCode, Job, JobMode, JobNodesInfo, JobStatus, TaskEvent,
};

/// 解析作业要巡检的节点
#[async_trait]
pub trait NodeResolver: Send + Sync {
    async fn resolve(
        &self,
        cluster: &str,
        mode: JobMode,
        resource: &str,
        ip_list: &[String],
        base_ip: Option<&str>,
    ) -> InspectionResult<JobNodesInfo>;
}

/// 脚本原始日志存储
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn write(
        &self,
        job_id: &str,
        script_name: &str,
        lines: &HashMap<String, String>,
    ) -> InspectionResult<()>;

    /// 不存在时返回 `LogNotFound`
    async fn read(&self, job_id: &str, script_name: &str) -> InspectionResult<Vec<u8>>;
}

/// 一条待转发的告警
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub code: HealthCode,
    pub message: String,
    pub cluster: String,
    pub script_name: String,
    pub nodes: Vec<String>,
}

/// 告警出口，失败只记录日志
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, alert: &Alert);

    /// 作业执行前为每个脚本注册告警规则
    async fn register_rules(&self, _cluster: &str, _scripts: &[String]) {}
}

/// 打包后的脚本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBundle {
    pub file_name: String,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait ScriptArchiver: Send + Sync {
    async fn archive(&self, script_name: &str) -> InspectionResult<ScriptBundle>;
}

/// 一次脚本执行请求
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteRequest {
    pub job_id: String,
    pub process_nodes: HashMap<String, String>,
    pub base_node: Option<HashMap<String, String>>,
    pub script_name: String,
    pub params: BTreeMap<String, String>,
    pub cluster_name: String,
}

/// 与 Agent 的一次会话
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn transfer_script(&self, bundle: &ScriptBundle) -> InspectionResult<()>;
    async fn execute(&self, request: &ExecuteRequest) -> InspectionResult<CheckResult>;
    /// 节点 -> 加速卡类型
    async fn get_resource(&self, ip_list: &[String]) -> InspectionResult<HashMap<String, CardType>>;
}

/// 建立 Agent 会话
#[async_trait]
pub trait AgentConnector: Send + Sync {
    /// 集群对应的 Agent 地址
    fn resolve_address(&self, cluster: &str) -> InspectionResult<String>;

    async fn connect(&self, address: &str) -> InspectionResult<Box<dyn AgentClient>>;
}

/// 集群级任务记录
#[async_trait]
pub trait TaskRecordClient: Send + Sync {
    async fn create(&self, job: &Job) -> InspectionResult<()>;

    /// 建立一次监听，流结束表示需要重连
    async fn watch(&self) -> InspectionResult<BoxStream<'static, InspectionResult<TaskEvent>>>;

    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        finish_time: Option<DateTime<Utc>>,
    ) -> InspectionResult<()>;
}
