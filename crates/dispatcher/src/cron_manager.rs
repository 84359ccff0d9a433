//! 模板定时任务
//!
//! 每个开启定时的模板在内存中对应一个定时器任务。定时配置变更时先停掉旧的再启动新的，
//! 启动时根据数据库中的定时配置重建。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local, Timelike};
use inspection_core::{InspectionError, InspectionResult};
use inspection_domain::{CronRequest, JobMode, Template, TemplateStore};
use inspection_infrastructure::observability::{MetricsCollector, StructuredLogger};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cron_utils::{build_cron_spec, CronScheduler};
use crate::submission::JobSubmitter;

struct ScheduleHandle {
    cron_expr: String,
    token: CancellationToken,
    timer: JoinHandle<()>,
}

pub struct CronManager {
    templates: Arc<dyn TemplateStore>,
    submitter: Arc<JobSubmitter>,
    schedules: Mutex<HashMap<i64, ScheduleHandle>>,
    shutdown: CancellationToken,
    metrics: Arc<MetricsCollector>,
}

impl CronManager {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        submitter: Arc<JobSubmitter>,
        shutdown: CancellationToken,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            templates,
            submitter,
            schedules: Mutex::new(HashMap::new()),
            shutdown,
            metrics,
        }
    }

    /// 校验并保存模板的定时配置，然后（重新）启动定时器
    ///
    /// 校验失败时模板原有定时配置和定时器保持不变。
    pub async fn create_cron_job(
        &self,
        request: &CronRequest,
        user: &str,
        cluster: &str,
    ) -> InspectionResult<Template> {
        let spec = build_cron_spec(request, Local::now().minute())?;
        CronScheduler::validate_cron_expression(&spec.cron_expr)?;

        let stored = self
            .templates
            .find_by_name(&request.template_name, cluster)
            .await?
            .ok_or_else(|| InspectionError::TemplateNotFound {
                name: request.template_name.clone(),
                cluster: cluster.to_string(),
            })?;
        ensure_regular(&stored)?;

        let template = self
            .templates
            .update_cron_info(&request.template_name, cluster, Some(&spec))
            .await?;
        self.add_schedule(&template, user).await?;
        Ok(template)
    }

    /// 停止定时器并清空模板的定时配置
    pub async fn delete_cron_job(&self, template_name: &str, cluster: &str) -> InspectionResult<()> {
        if let Some(template) = self.templates.find_by_name(template_name, cluster).await? {
            self.remove_schedule(template.template_id).await;
        }
        self.templates
            .update_cron_info(template_name, cluster, None)
            .await?;
        Ok(())
    }

    /// 删除模板，连同其定时器
    pub async fn delete_template(&self, template_name: &str, cluster: &str) -> InspectionResult<()> {
        let template = self
            .templates
            .find_by_name(template_name, cluster)
            .await?
            .ok_or_else(|| InspectionError::TemplateNotFound {
                name: template_name.to_string(),
                cluster: cluster.to_string(),
            })?;
        self.remove_schedule(template.template_id).await;
        self.templates.delete(template_name, cluster).await
    }

    /// 停止模板的定时器，不存在时返回 `false`
    pub async fn remove_schedule(&self, template_id: i64) -> bool {
        let removed = self.schedules.lock().await.remove(&template_id);
        match removed {
            Some(handle) => {
                handle.token.cancel();
                StructuredLogger::log_schedule_stopped(template_id);
                true
            }
            None => false,
        }
    }

    /// 按数据库中开启定时的模板重建全部定时器，返回重建数量
    pub async fn sync_cron(&self) -> InspectionResult<usize> {
        let templates = self.templates.find_cron_enabled().await?;
        let mut started = 0;
        for template in &templates {
            match self.add_schedule(template, template.acting_user()).await {
                Ok(()) => started += 1,
                Err(err) => error!(
                    "重建模板 {} 的定时任务失败: {}",
                    template.template_name, err
                ),
            }
        }
        info!("已重建 {}/{} 个定时任务", started, templates.len());
        Ok(started)
    }

    /// 当前运行中的定时器，模板ID升序
    pub async fn active_schedules(&self) -> Vec<i64> {
        let schedules = self.schedules.lock().await;
        let mut ids: Vec<i64> = schedules
            .iter()
            .filter(|(_, handle)| !handle.timer.is_finished())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub async fn schedule_expr(&self, template_id: i64) -> Option<String> {
        self.schedules
            .lock()
            .await
            .get(&template_id)
            .map(|h| h.cron_expr.clone())
    }

    /// 停止全部定时器并等待退出
    pub async fn shutdown(&self) {
        let handles: Vec<ScheduleHandle> =
            self.schedules.lock().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.token.cancel();
            if let Err(err) = handle.timer.await {
                error!("定时器异常退出: {}", err);
            }
        }
        info!("所有定时任务已停止");
    }

    async fn add_schedule(&self, template: &Template, user: &str) -> InspectionResult<()> {
        ensure_regular(template)?;
        let cron = template.cron.as_ref().ok_or_else(|| {
            InspectionError::Validation(format!("模板 {} 未开启定时任务", template.template_name))
        })?;
        let scheduler = CronScheduler::new(&cron.cron_expr)?;

        let token = self.shutdown.child_token();
        let timer = tokio::spawn(run_schedule(
            scheduler,
            template.template_id,
            template.cluster_name.clone(),
            user.to_string(),
            Arc::clone(&self.templates),
            Arc::clone(&self.submitter),
            Arc::clone(&self.metrics),
            token.clone(),
        ));

        let previous = self.schedules.lock().await.insert(
            template.template_id,
            ScheduleHandle {
                cron_expr: cron.cron_expr.clone(),
                token,
                timer,
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
            info!("模板 {} 的旧定时任务已替换", template.template_name);
        }
        StructuredLogger::log_schedule_started(
            template.template_id,
            &template.template_name,
            &cron.cron_expr,
        );
        Ok(())
    }
}

/// 定时任务只属于 regular 模板，以模板保存的模式为准
fn ensure_regular(template: &Template) -> InspectionResult<()> {
    if template.mode != JobMode::Regular {
        return Err(InspectionError::Validation(format!(
            "模板 {} 的模式为 {}，只有 regular 模板可以创建定时任务",
            template.template_name, template.mode
        )));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_schedule(
    scheduler: CronScheduler,
    template_id: i64,
    cluster: String,
    user: String,
    templates: Arc<dyn TemplateStore>,
    submitter: Arc<JobSubmitter>,
    metrics: Arc<MetricsCollector>,
    token: CancellationToken,
) {
    let mut last_fired: Option<DateTime<Local>> = None;
    loop {
        let now = Local::now();
        let from = last_fired.map_or(now, |last| last.max(now));
        let Some(next) = scheduler.next_execution_time(from) else {
            warn!("模板 {} 的定时任务没有下一次执行时间，退出", template_id);
            break;
        };
        let wait = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
        last_fired = Some(next);
        metrics.record_cron_tick();

        // 每次触发都读取模板当前配置
        let request = match templates.find_by_id(template_id).await {
            Ok(Some(template)) => template.cron_job_request(),
            Ok(None) => {
                warn!("模板 {} 已不存在，定时任务退出", template_id);
                break;
            }
            Err(err) => {
                error!("定时触发时查询模板 {} 失败: {}", template_id, err);
                continue;
            }
        };
        match request {
            Ok(request) => match submitter.submit(&request, &user, &cluster).await {
                Ok(job_id) => info!("模板 {} 定时触发作业 {}", template_id, job_id),
                Err(err) => error!("模板 {} 定时触发作业失败: {}", template_id, err),
            },
            Err(err) => {
                warn!("模板 {} 的定时配置已失效，定时任务退出: {}", template_id, err);
                break;
            }
        }
    }
}
