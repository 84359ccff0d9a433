//! 脚本结果汇总
//!
//! 把 Agent 返回的节点分类结果转成计数、执行记录、原始日志和告警。

use std::sync::Arc;

use inspection_core::{InspectionError, InspectionResult};
use inspection_domain::{
    Alert, AlertSink, CheckResult, HealthCode, HealthCounts, LogSink, TestInfo, TestRecordStore,
};
use inspection_infrastructure::observability::{MetricsCollector, StructuredLogger};
use regex::Regex;
use tracing::{error, info, warn};

/// 节点被其他业务占用时 Agent 消息中带有的标记，这类结果不告警
const ALLOCATED_MARKER: &str = "allocated";

pub struct ResultAggregator {
    records: Arc<dyn TestRecordStore>,
    logs: Arc<dyn LogSink>,
    alerts: Arc<dyn AlertSink>,
    metrics: Arc<MetricsCollector>,
    node_key: Regex,
}

impl ResultAggregator {
    pub fn new(
        records: Arc<dyn TestRecordStore>,
        logs: Arc<dyn LogSink>,
        alerts: Arc<dyn AlertSink>,
        metrics: Arc<MetricsCollector>,
    ) -> InspectionResult<Self> {
        let node_key = Regex::new(r"\((.*?)\)")
            .map_err(|e| InspectionError::Internal(format!("节点key正则无效: {e}")))?;
        Ok(Self {
            records,
            logs,
            alerts,
            metrics,
            node_key,
        })
    }

    /// 提取 key 中括号内的节点标识
    pub fn extract_nodes(&self, key: &str) -> Vec<String> {
        self.node_key
            .captures_iter(key)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// 统计各类别节点数并收集需要转发的告警
    pub fn summarize(
        &self,
        cluster: &str,
        script: &str,
        result: &CheckResult,
    ) -> (HealthCounts, Vec<Alert>) {
        let mut counts = HealthCounts::default();
        let mut alerts = Vec::new();

        for (key, code) in &result.case_result {
            let Some(health) = HealthCode::from_code(*code) else {
                warn!("脚本 {} 的节点组 {} 返回未知健康码 {}，已忽略", script, key, code);
                continue;
            };
            let nodes = self.extract_nodes(key);
            let count = u32::try_from(nodes.len()).unwrap_or(u32::MAX);
            match health {
                HealthCode::Healthy => counts.healthy += count,
                HealthCode::Critical => counts.critical += count,
                HealthCode::Unhealthy => counts.unhealthy += count,
                HealthCode::Unknown => counts.unknown += count,
                HealthCode::Timeout => counts.timeout += count,
            }

            if health == HealthCode::Healthy {
                continue;
            }
            let message = result.logs_result.get(key).cloned().unwrap_or_default();
            if message.contains(ALLOCATED_MARKER) {
                info!("节点组 {} 已被占用，忽略告警: {}", key, message);
                continue;
            }
            alerts.push(Alert {
                code: health,
                message,
                cluster: cluster.to_string(),
                script_name: script.to_string(),
                nodes,
            });
        }

        (counts, alerts)
    }

    /// 汇总一个脚本的结果并落库，`result` 为 `None` 表示没有拿到分类结果
    pub async fn aggregate(
        &self,
        job_id: &str,
        cluster: &str,
        script: &str,
        result: Option<CheckResult>,
        node_count: u32,
        elapsed_seconds: f64,
    ) -> TestInfo {
        let info = match result {
            None => TestInfo::failed(job_id, script, node_count, elapsed_seconds),
            Some(result) => {
                // 先保存原始日志再解析
                if let Err(err) = self.logs.write(job_id, script, &result.logs_result).await {
                    error!("写入作业 {} 脚本 {} 的日志失败: {}", job_id, script, err);
                }

                let (counts, alerts) = self.summarize(cluster, script, &result);
                for alert in &alerts {
                    self.alerts.notify(alert).await;
                    self.metrics.record_alert_sent();
                    StructuredLogger::log_alert_forwarded(
                        cluster,
                        script,
                        alert.code.alert_label().unwrap_or_default(),
                        alert.nodes.len(),
                    );
                }
                TestInfo::from_counts(job_id, script, counts, elapsed_seconds)
            }
        };

        if let Err(err) = self.records.insert(&info).await {
            error!("保存作业 {} 脚本 {} 的执行记录失败: {}", job_id, script, err);
        }
        self.metrics.record_script(info.result.as_str(), info.time_cost);
        StructuredLogger::log_script_outcome(
            job_id,
            script,
            info.result.as_str(),
            info.total_num,
            info.critical_num,
            info.time_cost,
        );
        info
    }
}
