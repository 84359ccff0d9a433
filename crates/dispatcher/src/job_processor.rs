//! 作业状态机
//!
//! `creating → ongoing → {completed, task failed}`，解析失败直接进入 `creation failed`。
//! 本地存储是权威状态，同步集群任务记录失败只记录日志。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use inspection_domain::{
    AgentConnector, AlertSink, Job, JobNodesInfo, JobStatus, JobStore, NodeResolver,
    TaskRecordClient, TemplateStore,
};
use inspection_infrastructure::observability::{MetricsCollector, StructuredLogger};
use tracing::{error, info, warn};

use crate::queue_manager::JobHandler;
use crate::rpc_dispatcher::ScriptDispatcher;

pub struct JobProcessor {
    jobs: Arc<dyn JobStore>,
    templates: Arc<dyn TemplateStore>,
    resolver: Arc<dyn NodeResolver>,
    connector: Arc<dyn AgentConnector>,
    alerts: Arc<dyn AlertSink>,
    dispatcher: Arc<ScriptDispatcher>,
    task_records: Option<Arc<dyn TaskRecordClient>>,
    metrics: Arc<MetricsCollector>,
}

/// 准备阶段的结果
struct Prepared {
    nodes: JobNodesInfo,
    scripts: Vec<String>,
    address: String,
}

impl JobProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Arc<dyn JobStore>,
        templates: Arc<dyn TemplateStore>,
        resolver: Arc<dyn NodeResolver>,
        connector: Arc<dyn AgentConnector>,
        alerts: Arc<dyn AlertSink>,
        dispatcher: Arc<ScriptDispatcher>,
        task_records: Option<Arc<dyn TaskRecordClient>>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            jobs,
            templates,
            resolver,
            connector,
            alerts,
            dispatcher,
            task_records,
            metrics,
        }
    }

    /// 执行一个作业直到终态，重复投递的作业返回 `None`
    pub async fn process(&self, job: Job) -> Option<JobStatus> {
        let mut job = self.claim(job).await?;

        let prepared = match self.prepare(&job).await {
            Ok(prepared) => prepared,
            Err(reason) => {
                warn!("作业 {} 创建失败: {}", job.job_id, reason);
                self.transition(&mut job, JobStatus::CreationFailed).await;
                return Some(job.status);
            }
        };
        info!(
            "作业 {} 解析到 {} 个节点，{} 个脚本",
            job.job_id,
            prepared.nodes.process_nodes.len(),
            prepared.scripts.len()
        );

        self.transition(&mut job, JobStatus::Ongoing).await;
        self.alerts
            .register_rules(&job.cluster_name, &prepared.scripts)
            .await;

        let success = self
            .dispatcher
            .run(&job, &prepared.address, &prepared.scripts, &prepared.nodes)
            .await;
        let terminal = if success {
            JobStatus::Completed
        } else {
            JobStatus::TaskFailed
        };
        self.transition(&mut job, terminal).await;
        Some(job.status)
    }

    /// 以存储中的状态为准，只处理仍为 `creating` 的作业；外部创建的任务记录先补录
    async fn claim(&self, job: Job) -> Option<Job> {
        match self.jobs.find_by_id(&job.job_id).await {
            Ok(Some(stored)) if stored.status == JobStatus::Creating => Some(stored),
            Ok(Some(stored)) => {
                warn!(
                    "作业 {} 当前状态为 {}，跳过重复处理",
                    stored.job_id, stored.status
                );
                None
            }
            Ok(None) => {
                if let Err(err) = self.jobs.insert(&job).await {
                    error!("补录作业 {} 失败: {}", job.job_id, err);
                }
                Some(job)
            }
            Err(err) => {
                error!("查询作业 {} 失败，按入队内容继续处理: {}", job.job_id, err);
                Some(job)
            }
        }
    }

    async fn prepare(&self, job: &Job) -> Result<Prepared, String> {
        let nodes = self
            .resolver
            .resolve(
                &job.cluster_name,
                job.mode,
                &job.resource,
                &job.ip_list,
                job.base_ip.as_deref(),
            )
            .await
            .map_err(|e| format!("节点解析失败: {e}"))?;

        let scripts = self
            .templates
            .script_names(job.template_id)
            .await
            .map_err(|e| format!("查询模板 {} 的脚本失败: {e}", job.template_id))?;
        if scripts.is_empty() {
            return Err(format!("模板 {} 没有关联脚本", job.template_id));
        }

        let address = self
            .connector
            .resolve_address(&job.cluster_name)
            .map_err(|e| e.to_string())?;

        Ok(Prepared {
            nodes,
            scripts,
            address,
        })
    }

    /// 状态变更：写存储，终态时更新模板最近作业，并同步集群任务记录
    async fn transition(&self, job: &mut Job, next: JobStatus) {
        if !job.status.can_transition_to(next) {
            warn!(
                "作业 {} 的状态转换无效: {} -> {}",
                job.job_id, job.status, next
            );
            return;
        }

        let previous = job.status;
        let finish_time = next.is_terminal().then(Utc::now);
        job.status = next;
        job.finish_time = finish_time;

        if let Err(err) = self
            .jobs
            .update_status(&job.job_id, next, finish_time)
            .await
        {
            error!("更新作业 {} 状态为 {} 失败: {}", job.job_id, next, err);
        }

        if let Some(finished) = finish_time {
            if let Err(err) = self
                .templates
                .update_job_info(job.template_id, &job.job_id, finished)
                .await
            {
                error!("更新模板 {} 的最近作业失败: {}", job.template_id, err);
            }
            self.metrics.record_job_finished(next.as_str());
        }

        if let Some(records) = &self.task_records {
            if let Err(err) = records.update_status(&job.job_id, next, finish_time).await {
                StructuredLogger::log_mirror_failure(&job.job_id, next.as_str(), &err.to_string());
            }
        }

        StructuredLogger::log_job_transition(
            &job.job_id,
            &job.cluster_name,
            previous.as_str(),
            next.as_str(),
        );
    }
}

#[async_trait]
impl JobHandler for JobProcessor {
    async fn handle(&self, job: Job) {
        let job_id = job.job_id.clone();
        if let Some(status) = self.process(job).await {
            info!("作业 {} 处理结束，状态 {}", job_id, status);
        }
    }
}
