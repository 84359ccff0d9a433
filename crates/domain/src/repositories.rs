//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inspection_core::InspectionResult;

use crate::entities::{
    CronSpec, Job, JobMode, JobQuery, JobStatus, Page, Script, ScriptParam, Template,
    TemplateBasicInfo, TestInfo,
};

/// 作业仓储抽象
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &Job) -> InspectionResult<()>;
    async fn find_by_id(&self, job_id: &str) -> InspectionResult<Option<Job>>;
    async fn find_page(&self, query: &JobQuery) -> InspectionResult<Page<Job>>;
    /// 终态时带上 `finish_time`
    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        finish_time: Option<DateTime<Utc>>,
    ) -> InspectionResult<()>;
}

/// 模板仓储抽象
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// 插入模板并关联脚本及参数，返回模板ID
    async fn insert(&self, template: &Template, scripts: &[ScriptParam]) -> InspectionResult<i64>;
    async fn find_by_name(&self, name: &str, cluster: &str) -> InspectionResult<Option<Template>>;
    async fn find_by_id(&self, template_id: i64) -> InspectionResult<Option<Template>>;
    async fn find_cron_enabled(&self) -> InspectionResult<Vec<Template>>;
    /// 替换基本信息，同时重建脚本关联和参数
    async fn update_basic_info(
        &self,
        name: &str,
        cluster: &str,
        info: &TemplateBasicInfo,
    ) -> InspectionResult<()>;
    /// `None` 表示关闭定时开关并清空定时配置
    async fn update_cron_info(
        &self,
        name: &str,
        cluster: &str,
        cron: Option<&CronSpec>,
    ) -> InspectionResult<Template>;
    async fn update_job_info(
        &self,
        template_id: i64,
        job_id: &str,
        job_time: DateTime<Utc>,
    ) -> InspectionResult<()>;
    /// 按模板中的顺序返回脚本名
    async fn script_names(&self, template_id: i64) -> InspectionResult<Vec<String>>;
    /// 级联删除脚本关联和参数
    async fn delete(&self, name: &str, cluster: &str) -> InspectionResult<()>;
}

/// 脚本仓储抽象
#[async_trait]
pub trait ScriptStore: Send + Sync {
    /// 按脚本名插入或覆盖，返回 case_id
    async fn insert(&self, script: &Script) -> InspectionResult<i64>;
    /// 删除脚本，返回是否存在
    async fn delete_by_name(&self, name: &str) -> InspectionResult<bool>;
    async fn find_by_name(&self, name: &str) -> InspectionResult<Option<Script>>;
    async fn find_params_by_template(
        &self,
        template_id: i64,
        script_name: &str,
    ) -> InspectionResult<BTreeMap<String, String>>;
    async fn find_by_mode(
        &self,
        mode: JobMode,
        cluster: &str,
        resource: &str,
    ) -> InspectionResult<Vec<Script>>;
}

/// 脚本执行记录仓储抽象
#[async_trait]
pub trait TestRecordStore: Send + Sync {
    async fn insert(&self, info: &TestInfo) -> InspectionResult<()>;
    async fn find_by_job(&self, job_id: &str) -> InspectionResult<Vec<TestInfo>>;
    async fn find_by_case(&self, job_id: &str, case_name: &str) -> InspectionResult<Option<TestInfo>>;
}
