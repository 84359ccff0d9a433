use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use inspection_core::{InspectionError, InspectionResult};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// 外部记录和日志里统一使用的时间格式
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 按本地时区格式化时间
pub fn format_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

/// 解析本地时区的时间字符串，空串视为未设置
pub fn parse_time(value: &str) -> InspectionResult<Option<DateTime<Utc>>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    let naive = NaiveDateTime::parse_from_str(value.trim(), TIME_FORMAT)
        .map_err(|e| InspectionError::Serialization(format!("无效的时间 {value}: {e}")))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| Some(t.with_timezone(&Utc)))
        .ok_or_else(|| InspectionError::Serialization(format!("无效的本地时间: {value}")))
}

/// 生成作业ID: `YYYYMMDD-` 加 6 位随机数字
pub fn generate_job_id(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::rng().random_range(0..1_000_000);
    format!("{}-{:06}", now.with_timezone(&Local).format("%Y%m%d"), suffix)
}

/// 巡检模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    /// 常规巡检
    #[default]
    Regular,
    /// 深度巡检，会跳过已被业务占用的节点
    Deep,
}

impl JobMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobMode::Regular => "regular",
            JobMode::Deep => "deep",
        }
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobMode {
    type Err = InspectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(JobMode::Regular),
            "deep" => Ok(JobMode::Deep),
            other => Err(InspectionError::Validation(format!(
                "不支持的巡检模式: {other}，仅支持 regular 或 deep"
            ))),
        }
    }
}

/// 作业状态
///
/// `creating → ongoing → {completed, task failed}`，或 `creating → creation failed`。
/// 终态不可再变更。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "creating")]
    Creating,
    #[serde(rename = "ongoing")]
    Ongoing,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "task failed")]
    TaskFailed,
    #[serde(rename = "creation failed")]
    CreationFailed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Creating => "creating",
            JobStatus::Ongoing => "ongoing",
            JobStatus::Completed => "completed",
            JobStatus::TaskFailed => "task failed",
            JobStatus::CreationFailed => "creation failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::TaskFailed | JobStatus::CreationFailed
        )
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Creating, JobStatus::Ongoing)
                | (JobStatus::Creating, JobStatus::CreationFailed)
                | (JobStatus::Ongoing, JobStatus::Completed)
                | (JobStatus::Ongoing, JobStatus::TaskFailed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = InspectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creating" => Ok(JobStatus::Creating),
            "ongoing" => Ok(JobStatus::Ongoing),
            "completed" => Ok(JobStatus::Completed),
            "task failed" => Ok(JobStatus::TaskFailed),
            "creation failed" => Ok(JobStatus::CreationFailed),
            other => Err(InspectionError::Serialization(format!(
                "无效的作业状态: {other}"
            ))),
        }
    }
}

/// 巡检作业
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub job_name: String,
    pub user_name: String,
    pub cluster_name: String,
    pub is_cron: bool,
    pub template_name: String,
    pub template_id: i64,
    /// 指定的节点IP，为空表示模板资源下的全部节点
    pub ip_list: Vec<String>,
    /// 对比基准节点IP
    pub base_ip: Option<String>,
    pub mode: JobMode,
    pub resource: String,
    pub status: JobStatus,
    pub create_time: DateTime<Utc>,
    pub finish_time: Option<DateTime<Utc>>,
}

impl Job {
    /// 根据提交请求创建一个 `creating` 状态的作业
    pub fn from_request(
        request: &JobRequest,
        mode: JobMode,
        user_name: &str,
        cluster_name: &str,
        template_id: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: generate_job_id(now),
            job_name: request.job_name.clone(),
            user_name: user_name.to_string(),
            cluster_name: cluster_name.to_string(),
            is_cron: request.is_cron,
            template_name: request.template_name.clone(),
            template_id,
            ip_list: request.ip_list.clone(),
            base_ip: request.base_ip.clone().filter(|ip| !ip.is_empty()),
            mode,
            resource: request.resource.clone(),
            status: JobStatus::Creating,
            create_time: now,
            finish_time: None,
        }
    }

    /// 用作重新提交的请求参数
    pub fn to_request(&self) -> JobRequest {
        JobRequest {
            job_name: self.job_name.clone(),
            template_name: self.template_name.clone(),
            is_cron: false,
            mode: self.mode.as_str().to_string(),
            resource: self.resource.clone(),
            ip_list: self.ip_list.clone(),
            base_ip: self.base_ip.clone(),
        }
    }

    /// 作业耗时，格式 `HH:MM:SS`，未结束时为 `None`
    pub fn time_cost(&self) -> Option<String> {
        let finish = self.finish_time?;
        let secs = (finish - self.create_time).num_seconds().max(0);
        Some(format!(
            "{:02}:{:02}:{:02}",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        ))
    }

    pub fn entity_description(&self) -> String {
        format!(
            "作业 '{}' (ID: {}, 集群: {}, 模板: {})",
            self.job_name, self.job_id, self.cluster_name, self.template_name
        )
    }
}

/// 作业提交请求
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub job_name: String,
    #[serde(rename = "template")]
    pub template_name: String,
    #[serde(default)]
    pub is_cron: bool,
    pub mode: String,
    pub resource: String,
    #[serde(default)]
    pub ip_list: Vec<String>,
    #[serde(default, rename = "baseIP")]
    pub base_ip: Option<String>,
}

impl JobRequest {
    /// 校验必填字段并返回解析后的巡检模式
    pub fn validate(&self, user_name: &str, cluster_name: &str) -> InspectionResult<JobMode> {
        let required = [
            ("jobName", self.job_name.as_str()),
            ("template", self.template_name.as_str()),
            ("mode", self.mode.as_str()),
            ("resource", self.resource.as_str()),
            ("user", user_name),
            ("cluster", cluster_name),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(InspectionError::Validation(format!("缺少必填字段: {field}")));
        }
        self.mode.parse()
    }
}

/// 作业分页查询条件
#[derive(Debug, Clone)]
pub struct JobQuery {
    pub cluster_name: Option<String>,
    pub template_name: Option<String>,
    pub user_name: Option<String>,
    pub status: Option<JobStatus>,
    /// 从1开始
    pub page: u64,
    pub page_size: u64,
}

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            cluster_name: None,
            template_name: None,
            user_name: None,
            status: None,
            page: 1,
            page_size: 20,
        }
    }
}

impl JobQuery {
    pub fn offset(&self) -> u64 {
        self.page.max(1).saturating_sub(1) * self.page_size
    }

    pub fn matches(&self, job: &Job) -> bool {
        self.cluster_name
            .as_ref()
            .is_none_or(|c| c == &job.cluster_name)
            && self
                .template_name
                .as_ref()
                .is_none_or(|t| t == &job.template_name)
            && self.user_name.as_ref().is_none_or(|u| u == &job.user_name)
            && self.status.is_none_or(|s| s == job.status)
    }
}

/// 分页结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}
