//! 告警平台 webhook

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use inspection_core::AlertConfig;
use inspection_domain::{Alert, AlertSink, HealthCode, Script, ScriptStore};
use serde::Serialize;
use tracing::{debug, warn};

/// 告警平台中节点的镜像标识，空值记为 `none`
pub fn mirror_key(node: &str, cluster: &str) -> String {
    let or_none = |v: &str| if v.is_empty() { "none".to_string() } else { v.to_string() };
    format!(
        "{}%2Enode%2Edevice%2E{}%2Ecluster",
        or_none(node),
        or_none(cluster)
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertLabels {
    key: String,
    source: String,
    business_id: String,
    btype: String,
}

#[derive(Debug, Serialize)]
struct AlertAnnotations {
    description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertItem {
    labels: AlertLabels,
    annotations: AlertAnnotations,
    starts_at: String,
}

#[derive(Debug, Serialize)]
struct AlertBatch {
    alerts: Vec<AlertItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertRule {
    business_id: String,
    btype: String,
    cluster: String,
    desc: String,
    name: String,
    #[serde(rename = "type")]
    rule_type: String,
    level: String,
    region: String,
    rtype: String,
    source: String,
}

/// 推送告警和注册告警规则，失败只记录日志
pub struct WebhookAlertSink {
    http: reqwest::Client,
    config: AlertConfig,
    scripts: Arc<dyn ScriptStore>,
}

impl WebhookAlertSink {
    pub fn new(config: AlertConfig, scripts: Arc<dyn ScriptStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            scripts,
        }
    }

    async fn find_script(&self, name: &str) -> Option<Script> {
        match self.scripts.find_by_name(name).await {
            Ok(Some(script)) => Some(script),
            Ok(None) => {
                warn!("告警对应的脚本不存在: {}", name);
                None
            }
            Err(e) => {
                warn!("查询脚本 {} 失败: {}", name, e);
                None
            }
        }
    }

    fn build_batch(&self, alert: &Alert, script: &Script) -> Option<AlertBatch> {
        let label = alert.code.alert_label()?;
        let starts_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let alerts = alert
            .nodes
            .iter()
            .map(|node| AlertItem {
                labels: AlertLabels {
                    key: mirror_key(node, &alert.cluster),
                    source: self.config.source.clone(),
                    business_id: script.case_id.to_string(),
                    btype: label.to_string(),
                },
                annotations: AlertAnnotations {
                    description: alert.message.clone(),
                },
                starts_at: starts_at.clone(),
            })
            .collect();
        Some(AlertBatch { alerts })
    }

    fn build_rules(&self, cluster: &str, script: &Script) -> Vec<AlertRule> {
        HealthCode::alerting()
            .iter()
            .filter_map(|code| {
                Some(AlertRule {
                    business_id: script.case_id.to_string(),
                    btype: code.alert_label()?.to_string(),
                    cluster: cluster.to_string(),
                    desc: script.detail.clone(),
                    name: script.ch_name.clone(),
                    rule_type: "alert".to_string(),
                    level: code.alert_level()?.to_string(),
                    region: script.domain.clone(),
                    rtype: "node".to_string(),
                    source: self.config.source.clone(),
                })
            })
            .collect()
    }

    async fn post<T: Serialize + ?Sized + Sync>(&self, url: &str, body: &T) -> bool {
        match self.http.post(url).json(body).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("告警平台 {} 返回 {}", url, response.status());
                false
            }
            Err(e) => {
                warn!("请求告警平台 {} 失败: {}", url, e);
                false
            }
        }
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn notify(&self, alert: &Alert) {
        if !self.config.enabled || alert.nodes.is_empty() {
            return;
        }
        let Some(script) = self.find_script(&alert.script_name).await else {
            return;
        };
        let Some(batch) = self.build_batch(alert, &script) else {
            return;
        };
        if self.post(&self.config.fault_url, &batch).await {
            debug!(
                "已推送 {} 条告警: 集群 {} 脚本 {}",
                batch.alerts.len(),
                alert.cluster,
                alert.script_name
            );
        }
    }

    async fn register_rules(&self, cluster: &str, scripts: &[String]) {
        if !self.config.enabled {
            return;
        }
        let mut rules = Vec::new();
        for name in scripts {
            if let Some(script) = self.find_script(name).await {
                rules.extend(self.build_rules(cluster, &script));
            }
        }
        if rules.is_empty() {
            return;
        }
        if self.post(&self.config.register_url, &rules).await {
            debug!("已注册 {} 条告警规则, 集群 {}", rules.len(), cluster);
        }
    }
}
