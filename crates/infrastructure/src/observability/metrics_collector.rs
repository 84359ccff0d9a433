//! 巡检系统指标采集
//!
//! 基于 `metrics` crate 的门面记录指标，导出器由二进制在启动时安装。

use metrics::{counter, gauge, histogram, Counter, Histogram};
use tracing::debug;

/// 巡检系统指标采集器
pub struct MetricsCollector {
    jobs_submitted_total: Counter,
    cron_ticks_total: Counter,
    alerts_sent_total: Counter,
    script_duration: Histogram,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            jobs_submitted_total: counter!("inspection_jobs_submitted_total"),
            cron_ticks_total: counter!("inspection_cron_ticks_total"),
            alerts_sent_total: counter!("inspection_alerts_sent_total"),
            script_duration: histogram!("inspection_script_duration_seconds"),
        }
    }

    pub fn record_job_submitted(&self) {
        self.jobs_submitted_total.increment(1);
    }

    /// 作业进入终态
    pub fn record_job_finished(&self, status: &str) {
        counter!("inspection_jobs_finished_total", "status" => status.to_string()).increment(1);
        debug!(status = status, "作业结束计数");
    }

    /// 单个脚本执行结果与耗时
    pub fn record_script(&self, result: &str, duration_seconds: f64) {
        counter!("inspection_scripts_total", "result" => result.to_string()).increment(1);
        self.script_duration.record(duration_seconds);
    }

    pub fn record_alert_sent(&self) {
        self.alerts_sent_total.increment(1);
    }

    pub fn record_cron_tick(&self) {
        self.cron_ticks_total.increment(1);
    }

    /// 集群队列深度
    pub fn update_queue_depth(&self, cluster: &str, depth: usize) {
        gauge!("inspection_queue_depth", "cluster" => cluster.to_string()).set(depth as f64);
    }
}
