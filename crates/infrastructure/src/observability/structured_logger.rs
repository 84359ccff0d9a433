//! 结构化日志工具
//!
//! 带 `event` 字段的 tracing 记录，便于按事件检索。

use tracing::{error, info, warn};

pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_job_enqueued(job_id: &str, cluster: &str, depth: usize) {
        info!(
            event = "job_enqueued",
            job.id = job_id,
            cluster = cluster,
            queue.depth = depth,
            "作业已入队"
        );
    }

    pub fn log_job_transition(job_id: &str, cluster: &str, from: &str, to: &str) {
        info!(
            event = "job_transition",
            job.id = job_id,
            cluster = cluster,
            job.from = from,
            job.to = to,
            "作业状态变更"
        );
    }

    pub fn log_script_outcome(
        job_id: &str,
        script: &str,
        result: &str,
        total: u32,
        critical: u32,
        time_cost: f64,
    ) {
        if result == "failed" {
            warn!(
                event = "script_outcome",
                job.id = job_id,
                script = script,
                script.result = result,
                script.total = total,
                script.time_cost = time_cost,
                "脚本未获得巡检结果"
            );
        } else {
            info!(
                event = "script_outcome",
                job.id = job_id,
                script = script,
                script.result = result,
                script.total = total,
                script.critical = critical,
                script.time_cost = time_cost,
                "脚本巡检完成"
            );
        }
    }

    pub fn log_alert_forwarded(cluster: &str, script: &str, label: &str, nodes: usize) {
        info!(
            event = "alert_forwarded",
            cluster = cluster,
            script = script,
            alert.label = label,
            alert.nodes = nodes,
            "告警已转发"
        );
    }

    pub fn log_schedule_started(template_id: i64, template: &str, cron_expr: &str) {
        info!(
            event = "schedule_started",
            template.id = template_id,
            template.name = template,
            cron.expr = cron_expr,
            "定时任务已启动"
        );
    }

    pub fn log_schedule_stopped(template_id: i64) {
        info!(
            event = "schedule_stopped",
            template.id = template_id,
            "定时任务已停止"
        );
    }

    pub fn log_mirror_failure(job_id: &str, status: &str, error: &str) {
        error!(
            event = "mirror_failed",
            job.id = job_id,
            job.status = status,
            error = error,
            "同步集群任务记录失败"
        );
    }
}
