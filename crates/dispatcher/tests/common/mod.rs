#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use inspection_core::{QueueConfig, RpcConfig};
use inspection_dispatcher::{JobHandler, JobProcessor, ResultAggregator, ScriptDispatcher};
use inspection_domain::{
    AgentConnector, AlertSink, Job, JobMode, LogSink, NodeResolver, ScriptArchiver, ScriptParam,
    TaskRecordClient, Template, TemplateStore,
};
use inspection_infrastructure::MetricsCollector;
use inspection_testing_utils::{
    MemoryLogSink, MockAgentConnector, MockNodeResolver, MockScriptArchiver, RecordingAlertSink,
    RecordingTaskRecordClient, TestStores,
};

/// 记录处理顺序的作业处理器，可模拟耗时
#[derive(Default)]
pub struct RecordingHandler {
    pub handled: Mutex<Vec<(String, String)>>,
    in_flight: Mutex<HashMap<String, usize>>,
    pub max_in_flight: Mutex<HashMap<String, usize>>,
    pub delay: Duration,
}

impl RecordingHandler {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn handled_ids(&self, cluster: &str) -> Vec<String> {
        self.handled
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == cluster)
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.handled.lock().unwrap().len()
    }
}

#[async_trait]
impl JobHandler for RecordingHandler {
    async fn handle(&self, job: Job) {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let current = in_flight.entry(job.cluster_name.clone()).or_default();
            *current += 1;
            let mut max = self.max_in_flight.lock().unwrap();
            let peak = max.entry(job.cluster_name.clone()).or_default();
            *peak = (*peak).max(*current);
        }
        tokio::time::sleep(self.delay).await;
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if let Some(current) = in_flight.get_mut(&job.cluster_name) {
                *current -= 1;
            }
        }
        self.handled
            .lock()
            .unwrap()
            .push((job.cluster_name.clone(), job.job_id.clone()));
    }
}

pub fn queue_config() -> QueueConfig {
    QueueConfig {
        capacity: 16,
        idle_timeout_seconds: 600,
    }
}

pub fn rpc_config() -> RpcConfig {
    RpcConfig {
        connect_timeout_seconds: 5,
        execute_timeout_seconds: 5,
    }
}

/// 在集群 `c1` 上创建模板并登记脚本，返回模板ID
pub async fn add_template(stores: &TestStores, name: &str, scripts: &[&str]) -> i64 {
    for script in scripts {
        stores.add_script(script).await;
    }
    let params: Vec<ScriptParam> = scripts
        .iter()
        .map(|s| ScriptParam {
            script_name: s.to_string(),
            params: [("level".to_string(), "full".to_string())].into(),
        })
        .collect();
    stores
        .templates
        .insert(
            &Template::new(name, "c1", JobMode::Regular, "Z3200", "alice"),
            &params,
        )
        .await
        .unwrap()
}

/// 处理器及其全部 mock 协作者
pub struct Harness {
    pub stores: TestStores,
    pub agent: MockAgentConnector,
    pub resolver: MockNodeResolver,
    pub alerts: RecordingAlertSink,
    pub logs: MemoryLogSink,
    pub task_records: RecordingTaskRecordClient,
    pub processor: Arc<JobProcessor>,
}

impl Harness {
    pub fn new(agent: MockAgentConnector, resolver: MockNodeResolver) -> Self {
        Self::build(TestStores::new(), agent, resolver, false)
    }

    pub fn with_task_records(agent: MockAgentConnector, resolver: MockNodeResolver) -> Self {
        Self::build(TestStores::new(), agent, resolver, true)
    }

    pub fn build(
        stores: TestStores,
        agent: MockAgentConnector,
        resolver: MockNodeResolver,
        mirror: bool,
    ) -> Self {
        Self::build_with_archiver(stores, agent, resolver, MockScriptArchiver::new(), mirror)
    }

    pub fn build_with_archiver(
        stores: TestStores,
        agent: MockAgentConnector,
        resolver: MockNodeResolver,
        archiver: MockScriptArchiver,
        mirror: bool,
    ) -> Self {
        let alerts = RecordingAlertSink::new();
        let logs = MemoryLogSink::new();
        let task_records = RecordingTaskRecordClient::new();
        let metrics = Arc::new(MetricsCollector::new());

        let connector: Arc<dyn AgentConnector> = Arc::new(agent.clone());
        let alert_sink: Arc<dyn AlertSink> = Arc::new(alerts.clone());
        let log_sink: Arc<dyn LogSink> = Arc::new(logs.clone());
        let archiver: Arc<dyn ScriptArchiver> = Arc::new(archiver);
        let node_resolver: Arc<dyn NodeResolver> = Arc::new(resolver.clone());

        let aggregator = Arc::new(
            ResultAggregator::new(
                stores.record_store(),
                log_sink,
                Arc::clone(&alert_sink),
                Arc::clone(&metrics),
            )
            .unwrap(),
        );
        let dispatcher = Arc::new(ScriptDispatcher::new(
            Arc::clone(&connector),
            archiver,
            stores.script_store(),
            aggregator,
            &rpc_config(),
        ));
        let records: Option<Arc<dyn TaskRecordClient>> = if mirror {
            Some(Arc::new(task_records.clone()))
        } else {
            None
        };
        let processor = Arc::new(JobProcessor::new(
            stores.job_store(),
            stores.template_store(),
            node_resolver,
            connector,
            alert_sink,
            dispatcher,
            records,
            metrics,
        ));

        Self {
            stores,
            agent,
            resolver,
            alerts,
            logs,
            task_records,
            processor,
        }
    }

    pub fn templates(&self) -> Arc<dyn TemplateStore> {
        self.stores.template_store()
    }
}
