//! 外部协作者的手写 mock
//!
//! 全部基于 `Arc<Mutex<..>>` 记录调用，便于在测试结束后断言。

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use inspection_core::{InspectionError, InspectionResult};
use inspection_domain::{
    AgentClient, AgentConnector, Alert, AlertSink, CardType, CheckResult, ExecuteRequest, Job,
    JobMode, JobNodesInfo, JobStatus, LogSink, NodeResolver, ScriptArchiver, ScriptBundle,
    TaskEvent, TaskRecordClient,
};

/// 单个脚本在 mock Agent 上的执行结果
#[derive(Debug, Clone)]
pub enum ScriptOutcome {
    Success(CheckResult),
    TransferFailure,
    ExecuteFailure,
    Timeout,
    /// 执行一直不返回
    Hang,
}

#[derive(Debug, Default)]
struct AgentState {
    outcomes: HashMap<String, ScriptOutcome>,
    cards: HashMap<String, CardType>,
    unavailable: HashSet<String>,
    connect_failure: bool,
    connections: usize,
    transfer_delay: Option<Duration>,
    transfers_in_flight: usize,
    peak_transfers: usize,
    transferred: Vec<String>,
    executed: Vec<ExecuteRequest>,
}

/// Mock Agent 连接器，未配置结果的脚本默认所有节点健康
#[derive(Debug, Clone, Default)]
pub struct MockAgentConnector {
    state: Arc<Mutex<AgentState>>,
}

impl MockAgentConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(self, script: &str, outcome: ScriptOutcome) -> Self {
        self.state
            .lock()
            .unwrap()
            .outcomes
            .insert(script.to_string(), outcome);
        self
    }

    pub fn with_cards(self, cards: &[(&str, CardType)]) -> Self {
        self.state
            .lock()
            .unwrap()
            .cards
            .extend(cards.iter().map(|(k, v)| (k.to_string(), *v)));
        self
    }

    /// 该集群没有 Agent 地址
    pub fn without_address(self, cluster: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .unavailable
            .insert(cluster.to_string());
        self
    }

    pub fn failing_connect(self) -> Self {
        self.state.lock().unwrap().connect_failure = true;
        self
    }

    /// 每次传输耗时，用于观察传输是否串行
    pub fn with_transfer_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().transfer_delay = Some(delay);
        self
    }

    /// 同时进行的传输数峰值
    pub fn peak_transfers(&self) -> usize {
        self.state.lock().unwrap().peak_transfers
    }

    pub fn connections(&self) -> usize {
        self.state.lock().unwrap().connections
    }

    pub fn transferred(&self) -> Vec<String> {
        self.state.lock().unwrap().transferred.clone()
    }

    pub fn executed(&self) -> Vec<ExecuteRequest> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn executed_scripts(&self) -> Vec<String> {
        self.executed().into_iter().map(|r| r.script_name).collect()
    }
}

#[async_trait]
impl AgentConnector for MockAgentConnector {
    fn resolve_address(&self, cluster: &str) -> InspectionResult<String> {
        if self.state.lock().unwrap().unavailable.contains(cluster) {
            return Err(InspectionError::AgentUnavailable {
                cluster: cluster.to_string(),
            });
        }
        Ok(format!("{cluster}-agent:9000"))
    }

    async fn connect(&self, address: &str) -> InspectionResult<Box<dyn AgentClient>> {
        let mut state = self.state.lock().unwrap();
        if state.connect_failure {
            return Err(InspectionError::Transport(format!("无法连接 {address}")));
        }
        state.connections += 1;
        Ok(Box::new(MockAgentClient {
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct MockAgentClient {
    state: Arc<Mutex<AgentState>>,
}

impl MockAgentClient {
    fn outcome(&self, script: &str) -> Option<ScriptOutcome> {
        self.state.lock().unwrap().outcomes.get(script).cloned()
    }
}

fn script_of_bundle(bundle: &ScriptBundle) -> &str {
    bundle
        .file_name
        .strip_suffix(".zip")
        .unwrap_or(&bundle.file_name)
}

#[async_trait]
impl AgentClient for MockAgentClient {
    async fn transfer_script(&self, bundle: &ScriptBundle) -> InspectionResult<()> {
        let script = script_of_bundle(bundle).to_string();
        if matches!(self.outcome(&script), Some(ScriptOutcome::TransferFailure)) {
            return Err(InspectionError::Transport(format!("传输 {script} 失败")));
        }
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.transfers_in_flight += 1;
            state.peak_transfers = state.peak_transfers.max(state.transfers_in_flight);
            state.transfer_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.transfers_in_flight -= 1;
        state.transferred.push(script);
        Ok(())
    }

    async fn execute(&self, request: &ExecuteRequest) -> InspectionResult<CheckResult> {
        self.state.lock().unwrap().executed.push(request.clone());
        match self.outcome(&request.script_name) {
            Some(ScriptOutcome::Success(result)) => Ok(result),
            Some(ScriptOutcome::ExecuteFailure) => Err(InspectionError::Transport(format!(
                "执行 {} 失败",
                request.script_name
            ))),
            Some(ScriptOutcome::Timeout) => Err(InspectionError::ExecutionTimeout),
            Some(ScriptOutcome::Hang) => std::future::pending().await,
            Some(ScriptOutcome::TransferFailure) | None => Ok(CheckResult {
                logs_result: request
                    .process_nodes
                    .values()
                    .map(|host| (format!("({host})"), "ok".to_string()))
                    .collect(),
                case_result: request
                    .process_nodes
                    .values()
                    .map(|host| (format!("({host})"), 0))
                    .collect(),
            }),
        }
    }

    async fn get_resource(&self, ip_list: &[String]) -> InspectionResult<HashMap<String, CardType>> {
        let state = self.state.lock().unwrap();
        Ok(ip_list
            .iter()
            .filter_map(|ip| state.cards.get(ip).map(|c| (ip.clone(), *c)))
            .collect())
    }
}

/// 返回固定节点集的解析器
#[derive(Debug, Clone)]
pub struct MockNodeResolver {
    nodes: Arc<Mutex<Result<JobNodesInfo, String>>>,
    calls: Arc<Mutex<Vec<(String, JobMode)>>>,
}

impl MockNodeResolver {
    pub fn new(nodes: JobNodesInfo) -> Self {
        Self {
            nodes: Arc::new(Mutex::new(Ok(nodes))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            nodes: Arc::new(Mutex::new(Err(message.to_string()))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<(String, JobMode)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeResolver for MockNodeResolver {
    async fn resolve(
        &self,
        cluster: &str,
        mode: JobMode,
        _resource: &str,
        _ip_list: &[String],
        _base_ip: Option<&str>,
    ) -> InspectionResult<JobNodesInfo> {
        self.calls.lock().unwrap().push((cluster.to_string(), mode));
        self.nodes
            .lock()
            .unwrap()
            .clone()
            .map_err(InspectionError::NodeResolution)
    }
}

/// 记录所有告警和规则注册
#[derive(Debug, Clone, Default)]
pub struct RecordingAlertSink {
    alerts: Arc<Mutex<Vec<Alert>>>,
    registrations: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn registrations(&self) -> Vec<(String, Vec<String>)> {
        self.registrations.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn notify(&self, alert: &Alert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }

    async fn register_rules(&self, cluster: &str, scripts: &[String]) {
        self.registrations
            .lock()
            .unwrap()
            .push((cluster.to_string(), scripts.to_vec()));
    }
}

type StatusUpdate = (String, JobStatus, Option<DateTime<Utc>>);

/// 记录任务记录的创建和状态同步，`watch` 依次返回预置的事件批次
#[derive(Clone, Default)]
pub struct RecordingTaskRecordClient {
    created: Arc<Mutex<Vec<Job>>>,
    updates: Arc<Mutex<Vec<StatusUpdate>>>,
    batches: Arc<Mutex<VecDeque<Vec<TaskEvent>>>>,
    watch_calls: Arc<Mutex<usize>>,
    fail_create: Arc<Mutex<bool>>,
    fail_update: Arc<Mutex<bool>>,
}

impl RecordingTaskRecordClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 下一次 `watch` 返回的事件，流在事件结束后关闭
    pub fn push_batch(&self, events: Vec<TaskEvent>) {
        self.batches.lock().unwrap().push_back(events);
    }

    pub fn fail_create(&self) {
        *self.fail_create.lock().unwrap() = true;
    }

    pub fn fail_update(&self) {
        *self.fail_update.lock().unwrap() = true;
    }

    pub fn created(&self) -> Vec<Job> {
        self.created.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn watch_calls(&self) -> usize {
        *self.watch_calls.lock().unwrap()
    }
}

#[async_trait]
impl TaskRecordClient for RecordingTaskRecordClient {
    async fn create(&self, job: &Job) -> InspectionResult<()> {
        if *self.fail_create.lock().unwrap() {
            return Err(InspectionError::Kubernetes("创建任务记录失败".to_string()));
        }
        self.created.lock().unwrap().push(job.clone());
        Ok(())
    }

    async fn watch(&self) -> InspectionResult<BoxStream<'static, InspectionResult<TaskEvent>>> {
        *self.watch_calls.lock().unwrap() += 1;
        match self.batches.lock().unwrap().pop_front() {
            Some(events) => Ok(stream::iter(events.into_iter().map(Ok)).boxed()),
            // 没有更多事件时保持监听
            None => Ok(stream::pending().boxed()),
        }
    }

    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        finish_time: Option<DateTime<Utc>>,
    ) -> InspectionResult<()> {
        if *self.fail_update.lock().unwrap() {
            return Err(InspectionError::Kubernetes("更新任务记录失败".to_string()));
        }
        self.updates
            .lock()
            .unwrap()
            .push((job_id.to_string(), status, finish_time));
        Ok(())
    }
}

/// 打包结果为脚本名字节的打包器
#[derive(Debug, Clone, Default)]
pub struct MockScriptArchiver {
    missing: Arc<Mutex<HashSet<String>>>,
}

impl MockScriptArchiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing(self, script: &str) -> Self {
        self.missing.lock().unwrap().insert(script.to_string());
        self
    }
}

#[async_trait]
impl ScriptArchiver for MockScriptArchiver {
    async fn archive(&self, script_name: &str) -> InspectionResult<ScriptBundle> {
        if self.missing.lock().unwrap().contains(script_name) {
            return Err(InspectionError::ScriptNotFound(script_name.to_string()));
        }
        Ok(ScriptBundle {
            file_name: format!("{script_name}.zip"),
            data: script_name.as_bytes().to_vec(),
        })
    }
}

/// 内存日志
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    logs: Arc<Mutex<HashMap<(String, String), HashMap<String, String>>>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job_id: &str, script: &str) -> Option<HashMap<String, String>> {
        self.logs
            .lock()
            .unwrap()
            .get(&(job_id.to_string(), script.to_string()))
            .cloned()
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn write(
        &self,
        job_id: &str,
        script_name: &str,
        lines: &HashMap<String, String>,
    ) -> InspectionResult<()> {
        self.logs
            .lock()
            .unwrap()
            .insert((job_id.to_string(), script_name.to_string()), lines.clone());
        Ok(())
    }

    async fn read(&self, job_id: &str, script_name: &str) -> InspectionResult<Vec<u8>> {
        let lines = self.get(job_id, script_name).ok_or_else(|| InspectionError::LogNotFound {
            job_id: job_id.to_string(),
            script: script_name.to_string(),
        })?;
        let mut keys: Vec<_> = lines.keys().collect();
        keys.sort();
        Ok(keys
            .into_iter()
            .map(|k| format!("{}: {}\n", k, lines[k]))
            .collect::<String>()
            .into_bytes())
    }
}
