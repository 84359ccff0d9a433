use std::sync::Arc;

use inspection_domain::{JobStore, Script, ScriptStore, TemplateStore, TestRecordStore};
use inspection_infrastructure::{
    InMemoryJobStore, InMemoryScriptStore, InMemoryTemplateStore, InMemoryTestRecordStore,
};

/// 一组共享数据的内存仓储
#[derive(Clone)]
pub struct TestStores {
    pub jobs: Arc<InMemoryJobStore>,
    pub templates: Arc<InMemoryTemplateStore>,
    pub scripts: Arc<InMemoryScriptStore>,
    pub records: Arc<InMemoryTestRecordStore>,
}

impl TestStores {
    pub fn new() -> Self {
        let templates = InMemoryTemplateStore::new();
        Self {
            jobs: Arc::new(InMemoryJobStore::new()),
            scripts: Arc::new(InMemoryScriptStore::new(templates.clone())),
            templates: Arc::new(templates),
            records: Arc::new(InMemoryTestRecordStore::new()),
        }
    }

    pub fn job_store(&self) -> Arc<dyn JobStore> {
        self.jobs.clone()
    }

    pub fn template_store(&self) -> Arc<dyn TemplateStore> {
        self.templates.clone()
    }

    pub fn script_store(&self) -> Arc<dyn ScriptStore> {
        self.scripts.clone()
    }

    pub fn record_store(&self) -> Arc<dyn TestRecordStore> {
        self.records.clone()
    }

    /// 登记脚本元数据，集群为空表示所有集群适用
    pub async fn add_script(&self, name: &str) -> Script {
        let mut script = Script {
            case_id: 0,
            name: name.to_string(),
            ch_name: name.to_string(),
            cluster: String::new(),
            detail: format!("{name} detail"),
            domain: "default".to_string(),
            mode: inspection_domain::JobMode::Regular,
            category: "hardware".to_string(),
        };
        if let Ok(id) = self.scripts.insert(&script).await {
            script.case_id = id;
        }
        script
    }
}

impl Default for TestStores {
    fn default() -> Self {
        Self::new()
    }
}
