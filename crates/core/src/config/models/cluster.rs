use serde::{Deserialize, Serialize};

/// 单个被巡检集群的接入配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClusterConfig {
    pub agent_ip: String,
    pub agent_port: u16,
    /// kubeconfig 文件名，默认与集群同名
    pub kubeconfig: Option<String>,
    pub accept_invalid_certs: bool,
}

impl ClusterConfig {
    /// Agent 地址，形如 `ip:port`
    pub fn agent_address(&self) -> Option<String> {
        if self.agent_ip.is_empty() || self.agent_port == 0 {
            return None;
        }
        Some(format!("{}:{}", self.agent_ip, self.agent_port))
    }
}

/// 集群任务记录（自定义资源）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskRecordConfig {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespace: String,
    /// 管理集群的 kubeconfig 文件名
    pub kubeconfig: String,
    pub watch_retry_seconds: u64,
}

impl Default for TaskRecordConfig {
    fn default() -> Self {
        Self {
            group: "inspection.io".to_string(),
            version: "v1".to_string(),
            kind: "Task".to_string(),
            plural: "tasks".to_string(),
            namespace: "inspection".to_string(),
            kubeconfig: "manager".to_string(),
            watch_retry_seconds: 2,
        }
    }
}

impl TaskRecordConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.group.is_empty() || self.version.is_empty() || self.plural.is_empty() {
            return Err(anyhow::anyhow!("任务记录的group/version/plural不能为空"));
        }

        if self.namespace.is_empty() {
            return Err(anyhow::anyhow!("任务记录命名空间不能为空"));
        }

        if self.watch_retry_seconds == 0 {
            return Err(anyhow::anyhow!("监听重连间隔必须大于0"));
        }

        Ok(())
    }
}
