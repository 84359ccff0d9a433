use serde::{Deserialize, Serialize};

use crate::logging::LogFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_enabled: bool,
    pub metrics_bind_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_bind_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志级别: {}，支持的级别: {:?}",
                self.log_level,
                valid_levels
            ));
        }

        if self.metrics_enabled && self.metrics_bind_address.is_empty() {
            return Err(anyhow::anyhow!("启用指标时监听地址不能为空"));
        }

        Ok(())
    }
}

/// 告警 webhook 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub fault_url: String,
    pub register_url: String,
    /// 告警来源标识
    pub source: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fault_url: String::new(),
            register_url: String::new(),
            source: "inspectionSys".to_string(),
        }
    }
}

impl AlertConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.enabled && (self.fault_url.is_empty() || self.register_url.is_empty()) {
            return Err(anyhow::anyhow!("启用告警时fault_url和register_url不能为空"));
        }
        Ok(())
    }
}
