//! 作业提交入口
//!
//! 接口调用、定时触发和重试都从这里提交作业，保证进入同一个集群队列。

use std::sync::Arc;

use chrono::Utc;
use inspection_core::{InspectionError, InspectionResult, SubmissionMode};
use inspection_domain::{
    Job, JobProgress, JobRequest, JobStatus, JobStore, TaskRecordClient, TemplateStore,
    TestRecordStore,
};
use inspection_infrastructure::observability::MetricsCollector;
use tracing::{error, info};

use crate::queue_manager::QueueManager;

pub struct JobSubmitter {
    jobs: Arc<dyn JobStore>,
    templates: Arc<dyn TemplateStore>,
    records: Arc<dyn TestRecordStore>,
    queue: Arc<QueueManager>,
    task_records: Option<Arc<dyn TaskRecordClient>>,
    mode: SubmissionMode,
    metrics: Arc<MetricsCollector>,
}

impl JobSubmitter {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        templates: Arc<dyn TemplateStore>,
        records: Arc<dyn TestRecordStore>,
        queue: Arc<QueueManager>,
        task_records: Option<Arc<dyn TaskRecordClient>>,
        mode: SubmissionMode,
        metrics: Arc<MetricsCollector>,
    ) -> InspectionResult<Self> {
        if mode == SubmissionMode::TaskRecord && task_records.is_none() {
            return Err(InspectionError::Configuration(
                "task_record 提交方式需要集群任务记录客户端".to_string(),
            ));
        }
        Ok(Self {
            jobs,
            templates,
            records,
            queue,
            task_records,
            mode,
            metrics,
        })
    }

    /// 校验并提交作业，返回作业ID
    pub async fn submit(
        &self,
        request: &JobRequest,
        user: &str,
        cluster: &str,
    ) -> InspectionResult<String> {
        let mode = request.validate(user, cluster)?;
        let template = self
            .templates
            .find_by_name(&request.template_name, cluster)
            .await?
            .ok_or_else(|| InspectionError::TemplateNotFound {
                name: request.template_name.clone(),
                cluster: cluster.to_string(),
            })?;

        let job = Job::from_request(request, mode, user, cluster, template.template_id);
        let job_id = job.job_id.clone();
        self.jobs.insert(&job).await?;
        self.metrics.record_job_submitted();

        match (&self.mode, &self.task_records) {
            (SubmissionMode::TaskRecord, Some(records)) => {
                if let Err(err) = records.create(&job).await {
                    error!("创建作业 {} 的集群任务记录失败: {}", job_id, err);
                    if let Err(update_err) = self
                        .jobs
                        .update_status(&job_id, JobStatus::CreationFailed, Some(Utc::now()))
                        .await
                    {
                        error!("更新作业 {} 状态失败: {}", job_id, update_err);
                    }
                    return Err(err);
                }
                info!("作业 {} 已写入集群任务记录", job_id);
            }
            _ => {
                self.queue.enqueue(job).await;
                info!("作业 {} 已直接入队", job_id);
            }
        }

        Ok(job_id)
    }

    /// 以原作业参数重新提交，生成新的作业ID
    pub async fn retry(&self, job_id: &str, user: &str, cluster: &str) -> InspectionResult<String> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| InspectionError::JobNotFound {
                id: job_id.to_string(),
            })?;
        let new_id = self.submit(&job.to_request(), user, cluster).await?;
        info!("作业 {} 已重试，新作业 {}", job_id, new_id);
        Ok(new_id)
    }

    /// 已完成脚本数 / 模板脚本总数
    pub async fn progress(&self, job_id: &str) -> InspectionResult<JobProgress> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| InspectionError::JobNotFound {
                id: job_id.to_string(),
            })?;
        let total = self.templates.script_names(job.template_id).await?.len();
        let finished = self.records.find_by_job(job_id).await?.len();
        Ok(JobProgress::new(finished, total))
    }
}
