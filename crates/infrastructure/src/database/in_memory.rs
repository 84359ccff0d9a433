//! 内存仓储实现，用于测试和无数据库的本地运行

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inspection_core::{InspectionError, InspectionResult};
use inspection_domain::{
    CronSpec, Job, JobMode, JobQuery, JobStatus, JobStore, Page, Script, ScriptParam, ScriptStore,
    Template, TemplateBasicInfo, TemplateStore, TestInfo, TestRecordStore,
};
use tokio::sync::RwLock;

#[derive(Default, Clone)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<Vec<Job>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &Job) -> InspectionResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.iter().any(|j| j.job_id == job.job_id) {
            return Err(InspectionError::DatabaseOperation(format!(
                "作业ID已存在: {}",
                job.job_id
            )));
        }
        jobs.push(job.clone());
        Ok(())
    }

    async fn find_by_id(&self, job_id: &str) -> InspectionResult<Option<Job>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.iter().find(|j| j.job_id == job_id).cloned())
    }

    async fn find_page(&self, query: &JobQuery) -> InspectionResult<Page<Job>> {
        let jobs = self.jobs.read().await;
        let mut matched: Vec<&Job> = jobs.iter().filter(|j| query.matches(j)).collect();
        matched.sort_by(|a, b| b.create_time.cmp(&a.create_time));
        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(query.page_size).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(Page { items, total })
    }

    async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        finish_time: Option<DateTime<Utc>>,
    ) -> InspectionResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.job_id == job_id)
            .ok_or_else(|| InspectionError::JobNotFound {
                id: job_id.to_string(),
            })?;
        job.status = status;
        if finish_time.is_some() {
            job.finish_time = finish_time;
        }
        Ok(())
    }
}

#[derive(Default)]
struct TemplateState {
    next_id: i64,
    templates: BTreeMap<i64, Template>,
    scripts: HashMap<i64, Vec<ScriptParam>>,
}

#[derive(Default, Clone)]
pub struct InMemoryTemplateStore {
    state: Arc<RwLock<TemplateState>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模板关联的脚本参数，供 [`InMemoryScriptStore`] 共享
    pub async fn params(&self, template_id: i64, script_name: &str) -> BTreeMap<String, String> {
        let state = self.state.read().await;
        state
            .scripts
            .get(&template_id)
            .and_then(|list| list.iter().find(|s| s.script_name == script_name))
            .map(|s| s.params.clone())
            .unwrap_or_default()
    }
}

fn not_found(name: &str, cluster: &str) -> InspectionError {
    InspectionError::TemplateNotFound {
        name: name.to_string(),
        cluster: cluster.to_string(),
    }
}

fn find_id(state: &TemplateState, name: &str, cluster: &str) -> InspectionResult<i64> {
    state
        .templates
        .values()
        .find(|t| t.template_name == name && t.cluster_name == cluster)
        .map(|t| t.template_id)
        .ok_or_else(|| not_found(name, cluster))
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn insert(&self, template: &Template, scripts: &[ScriptParam]) -> InspectionResult<i64> {
        let mut state = self.state.write().await;
        if find_id(&state, &template.template_name, &template.cluster_name).is_ok() {
            return Err(InspectionError::DatabaseOperation(format!(
                "模板已存在: {}",
                template.template_name
            )));
        }
        state.next_id += 1;
        let id = state.next_id;
        let mut stored = template.clone();
        stored.template_id = id;
        state.templates.insert(id, stored);
        state.scripts.insert(id, scripts.to_vec());
        Ok(id)
    }

    async fn find_by_name(&self, name: &str, cluster: &str) -> InspectionResult<Option<Template>> {
        let state = self.state.read().await;
        Ok(state
            .templates
            .values()
            .find(|t| t.template_name == name && t.cluster_name == cluster)
            .cloned())
    }

    async fn find_by_id(&self, template_id: i64) -> InspectionResult<Option<Template>> {
        Ok(self.state.read().await.templates.get(&template_id).cloned())
    }

    async fn find_cron_enabled(&self) -> InspectionResult<Vec<Template>> {
        let state = self.state.read().await;
        Ok(state
            .templates
            .values()
            .filter(|t| t.cron_enabled())
            .cloned()
            .collect())
    }

    async fn update_basic_info(
        &self,
        name: &str,
        cluster: &str,
        info: &TemplateBasicInfo,
    ) -> InspectionResult<()> {
        let mut state = self.state.write().await;
        let id = find_id(&state, name, cluster)?;
        if let Some(template) = state.templates.get_mut(&id) {
            template.mode = info.mode;
            template.resource = info.resource.clone();
            template.description = info.description.clone();
            template.modify_user = Some(info.modify_user.clone());
            template.modify_time = Some(Utc::now());
        }
        state.scripts.insert(id, info.scripts.clone());
        Ok(())
    }

    async fn update_cron_info(
        &self,
        name: &str,
        cluster: &str,
        cron: Option<&CronSpec>,
    ) -> InspectionResult<Template> {
        let mut state = self.state.write().await;
        let id = find_id(&state, name, cluster)?;
        let template = state
            .templates
            .get_mut(&id)
            .ok_or_else(|| not_found(name, cluster))?;
        template.cron = cron.cloned();
        Ok(template.clone())
    }

    async fn update_job_info(
        &self,
        template_id: i64,
        job_id: &str,
        job_time: DateTime<Utc>,
    ) -> InspectionResult<()> {
        let mut state = self.state.write().await;
        if let Some(template) = state.templates.get_mut(&template_id) {
            template.last_job_id = Some(job_id.to_string());
            template.last_job_time = Some(job_time);
        }
        Ok(())
    }

    async fn script_names(&self, template_id: i64) -> InspectionResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .scripts
            .get(&template_id)
            .map(|list| list.iter().map(|s| s.script_name.clone()).collect())
            .unwrap_or_default())
    }

    async fn delete(&self, name: &str, cluster: &str) -> InspectionResult<()> {
        let mut state = self.state.write().await;
        let id = find_id(&state, name, cluster)?;
        state.templates.remove(&id);
        state.scripts.remove(&id);
        Ok(())
    }
}

/// 脚本参数从共享的模板仓储读取
#[derive(Clone)]
pub struct InMemoryScriptStore {
    scripts: Arc<RwLock<Vec<Script>>>,
    templates: InMemoryTemplateStore,
}

impl InMemoryScriptStore {
    pub fn new(templates: InMemoryTemplateStore) -> Self {
        Self {
            scripts: Arc::new(RwLock::new(Vec::new())),
            templates,
        }
    }
}

#[async_trait]
impl ScriptStore for InMemoryScriptStore {
    async fn insert(&self, script: &Script) -> InspectionResult<i64> {
        let mut scripts = self.scripts.write().await;
        if let Some(existing) = scripts.iter_mut().find(|s| s.name == script.name) {
            let case_id = existing.case_id;
            *existing = Script {
                case_id,
                ..script.clone()
            };
            return Ok(case_id);
        }
        let id = scripts.iter().map(|s| s.case_id).max().unwrap_or(0) + 1;
        let mut stored = script.clone();
        stored.case_id = id;
        scripts.push(stored);
        Ok(id)
    }

    async fn delete_by_name(&self, name: &str) -> InspectionResult<bool> {
        let mut scripts = self.scripts.write().await;
        let before = scripts.len();
        scripts.retain(|s| s.name != name);
        Ok(scripts.len() != before)
    }

    async fn find_by_name(&self, name: &str) -> InspectionResult<Option<Script>> {
        let scripts = self.scripts.read().await;
        Ok(scripts.iter().find(|s| s.name == name).cloned())
    }

    async fn find_params_by_template(
        &self,
        template_id: i64,
        script_name: &str,
    ) -> InspectionResult<BTreeMap<String, String>> {
        Ok(self.templates.params(template_id, script_name).await)
    }

    async fn find_by_mode(
        &self,
        mode: JobMode,
        cluster: &str,
        resource: &str,
    ) -> InspectionResult<Vec<Script>> {
        let marker = format!("{cluster}:{resource}").to_lowercase();
        let scripts = self.scripts.read().await;
        Ok(scripts
            .iter()
            .filter(|s| mode == JobMode::Deep || s.mode == JobMode::Regular)
            .filter(|s| s.cluster.is_empty() || s.cluster.to_lowercase().contains(&marker))
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryTestRecordStore {
    records: Arc<RwLock<Vec<TestInfo>>>,
}

impl InMemoryTestRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TestRecordStore for InMemoryTestRecordStore {
    async fn insert(&self, info: &TestInfo) -> InspectionResult<()> {
        self.records.write().await.push(info.clone());
        Ok(())
    }

    async fn find_by_job(&self, job_id: &str) -> InspectionResult<Vec<TestInfo>> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| r.job_id == job_id).cloned().collect())
    }

    async fn find_by_case(&self, job_id: &str, case_name: &str) -> InspectionResult<Option<TestInfo>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .find(|r| r.job_id == job_id && r.case_name == case_name)
            .cloned())
    }
}
