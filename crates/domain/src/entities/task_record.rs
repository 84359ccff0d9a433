use inspection_core::{InspectionError, InspectionResult};
use serde::{Deserialize, Serialize};

use super::job::{format_time, parse_time, Job, JobStatus};

/// 集群任务记录的 spec，字段与作业一一对应
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub job_id: String,
    pub job_name: String,
    pub user_name: String,
    pub cluster_name: String,
    #[serde(default)]
    pub is_cron: bool,
    pub template_name: String,
    pub template_id: i64,
    /// 逗号分隔的节点IP
    #[serde(default)]
    pub ip_list: String,
    #[serde(default)]
    pub base_ip: String,
    pub mode: String,
    pub resource: String,
    pub status: String,
    #[serde(default)]
    pub create_time: String,
    #[serde(default)]
    pub finish_time: String,
}

impl From<&Job> for TaskSpec {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            job_name: job.job_name.clone(),
            user_name: job.user_name.clone(),
            cluster_name: job.cluster_name.clone(),
            is_cron: job.is_cron,
            template_name: job.template_name.clone(),
            template_id: job.template_id,
            ip_list: job.ip_list.join(","),
            base_ip: job.base_ip.clone().unwrap_or_default(),
            mode: job.mode.as_str().to_string(),
            resource: job.resource.clone(),
            status: job.status.as_str().to_string(),
            create_time: format_time(&job.create_time),
            finish_time: job.finish_time.as_ref().map(format_time).unwrap_or_default(),
        }
    }
}

impl TaskSpec {
    pub fn is_creating(&self) -> bool {
        self.status == JobStatus::Creating.as_str()
    }

    /// 还原为作业
    pub fn to_job(&self) -> InspectionResult<Job> {
        if self.job_id.is_empty() {
            return Err(InspectionError::Validation(
                "任务记录缺少job_id".to_string(),
            ));
        }
        let create_time = parse_time(&self.create_time)?.unwrap_or_else(chrono::Utc::now);
        Ok(Job {
            job_id: self.job_id.clone(),
            job_name: self.job_name.clone(),
            user_name: self.user_name.clone(),
            cluster_name: self.cluster_name.clone(),
            is_cron: self.is_cron,
            template_name: self.template_name.clone(),
            template_id: self.template_id,
            ip_list: split_ip_list(&self.ip_list),
            base_ip: Some(self.base_ip.clone()).filter(|ip| !ip.is_empty()),
            mode: self.mode.parse()?,
            resource: self.resource.clone(),
            status: self.status.parse()?,
            create_time,
            finish_time: parse_time(&self.finish_time)?,
        })
    }
}

/// 逗号分隔的IP列表，忽略空项
pub fn split_ip_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .collect()
}

/// 任务记录监听事件
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Added(TaskSpec),
    Modified(TaskSpec),
    Deleted(TaskSpec),
}

impl TaskEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskEvent::Added(_) => "added",
            TaskEvent::Modified(_) => "modified",
            TaskEvent::Deleted(_) => "deleted",
        }
    }

    pub fn spec(&self) -> &TaskSpec {
        match self {
            TaskEvent::Added(spec) | TaskEvent::Modified(spec) | TaskEvent::Deleted(spec) => spec,
        }
    }
}
