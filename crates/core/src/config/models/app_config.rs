use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{
    cluster::{ClusterConfig, TaskRecordConfig},
    database::DatabaseConfig,
    dispatcher::{QueueConfig, RpcConfig},
    manager::ManagerConfig,
    observability::{AlertConfig, ObservabilityConfig},
};

/// 巡检管理服务配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub manager: ManagerConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub rpc: RpcConfig,
    pub task_record: TaskRecordConfig,
    pub alert: AlertConfig,
    /// 集群名 -> 接入配置
    pub clusters: HashMap<String, ClusterConfig>,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序:
    /// 1. 默认配置
    /// 2. 配置文件（TOML）
    /// 3. 环境变量覆盖（前缀 `INSPECTION`，层级分隔符 `__`）
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/inspection.toml",
                "inspection.toml",
                "/etc/inspection/config.toml",
            ];

            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("INSPECTION")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// 从 TOML 字符串加载配置
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// 查找集群接入配置
    pub fn cluster(&self, name: &str) -> Option<&ClusterConfig> {
        self.clusters.get(name)
    }

    pub fn validate(&self) -> Result<()> {
        self.manager.validate().context("管理服务配置验证失败")?;
        self.database.validate().context("数据库配置验证失败")?;
        self.queue.validate().context("队列配置验证失败")?;
        self.rpc.validate().context("RPC配置验证失败")?;
        self.task_record
            .validate()
            .context("任务记录配置验证失败")?;
        self.alert.validate().context("告警配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        for (name, cluster) in &self.clusters {
            if name.is_empty() {
                return Err(anyhow::anyhow!("集群名称不能为空"));
            }
            if cluster.agent_address().is_none() {
                return Err(anyhow::anyhow!("集群 {} 缺少agent地址", name));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubmissionMode;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue.capacity, 100);
        assert_eq!(config.queue.idle_timeout_seconds, 600);
        assert_eq!(config.rpc.connect_timeout_seconds, 30);
        assert_eq!(config.rpc.execute_timeout_seconds, 300);
        assert_eq!(config.task_record.watch_retry_seconds, 2);
        assert_eq!(config.alert.source, "inspectionSys");
    }

    #[test]
    fn test_from_toml_with_clusters() {
        let toml_str = r#"
[manager]
submission_mode = "task_record"
script_path = "/opt/scripts"

[queue]
capacity = 10

[clusters.c1]
agent_ip = "10.0.0.1"
agent_port = 8443
"#;
        let config = AppConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.manager.submission_mode, SubmissionMode::TaskRecord);
        assert_eq!(config.queue.capacity, 10);
        assert_eq!(
            config.cluster("c1").and_then(|c| c.agent_address()),
            Some("10.0.0.1:8443".to_string())
        );
        assert!(config.cluster("c2").is_none());
    }

    #[test]
    fn test_cluster_without_agent_rejected() {
        let toml_str = r#"
[clusters.c1]
agent_ip = ""
"#;
        assert!(AppConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let toml_str = r#"
[observability]
log_level = "loud"
"#;
        assert!(AppConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rpc]\nexecute_timeout_seconds = 120").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.rpc.execute_timeout_seconds, 120);
        assert_eq!(config.rpc.connect_timeout_seconds, 30);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(AppConfig::load(Some("/nonexistent/inspection.toml")).is_err());
    }

    #[test]
    fn test_round_trip_toml() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.queue.capacity, config.queue.capacity);
    }
}
