use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use inspection_core::{AppConfig, SubmissionMode};
use inspection_dispatcher::{
    CronManager, JobProcessor, JobSubmitter, QueueManager, ResultAggregator, ScriptDispatcher,
    TaskWatcher,
};
use inspection_domain::{AgentConnector, AlertSink, NodeResolver, TaskRecordClient};
use inspection_infrastructure::{
    DatabaseManager, FileLogSink, HttpAgentConnector, KubeClientCache, KubeNodeResolver,
    KubeTaskRecordClient, MetricsCollector, ScriptCatalog, WebhookAlertSink, ZipScriptArchiver,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 巡检管理服务：组装存储、集群访问、队列和定时任务
pub struct Application {
    database: DatabaseManager,
    queue: Arc<QueueManager>,
    cron: Arc<CronManager>,
    catalog: Arc<ScriptCatalog>,
    watcher: Option<Arc<TaskWatcher>>,
    shutdown: CancellationToken,
}

impl Application {
    pub async fn new(config: AppConfig, shutdown: CancellationToken) -> Result<Self> {
        info!(
            "初始化巡检管理服务，提交方式: {:?}",
            config.manager.submission_mode
        );

        let database = DatabaseManager::new(&config.database)
            .await
            .context("连接数据库失败")?;
        database.migrate().await.context("初始化数据库表失败")?;

        let metrics = Arc::new(MetricsCollector::new());
        let catalog = Arc::new(ScriptCatalog::new(
            &config.manager.script_path,
            database.script_store(),
        ));
        let kube = Arc::new(KubeClientCache::new(
            &config.manager.kube_path,
            &config.clusters,
        ));
        let connector: Arc<dyn AgentConnector> =
            Arc::new(HttpAgentConnector::new(config.clusters.clone(), &config.rpc));
        let resolver: Arc<dyn NodeResolver> =
            Arc::new(KubeNodeResolver::new(Arc::clone(&kube), Arc::clone(&connector)));
        let alerts: Arc<dyn AlertSink> = Arc::new(WebhookAlertSink::new(
            config.alert.clone(),
            database.script_store(),
        ));

        let task_records: Option<Arc<dyn TaskRecordClient>> =
            match config.manager.submission_mode {
                SubmissionMode::TaskRecord => {
                    let client = kube
                        .client(&config.task_record.kubeconfig)
                        .await
                        .context("创建管理集群客户端失败")?;
                    let records = KubeTaskRecordClient::new(client, &config.task_record);
                    if let Err(e) = records.ensure_definition().await {
                        warn!("安装任务记录 CRD 失败，需要手动创建: {e}");
                    }
                    Some(Arc::new(records))
                }
                SubmissionMode::Direct => None,
            };

        let aggregator = Arc::new(
            ResultAggregator::new(
                database.test_record_store(),
                Arc::new(FileLogSink::new(&config.manager.log_path)),
                Arc::clone(&alerts),
                Arc::clone(&metrics),
            )
            .context("创建结果汇总器失败")?,
        );
        let dispatcher = Arc::new(ScriptDispatcher::new(
            Arc::clone(&connector),
            Arc::new(ZipScriptArchiver::new(&config.manager.script_path)),
            database.script_store(),
            aggregator,
            &config.rpc,
        ));
        let processor = Arc::new(JobProcessor::new(
            database.job_store(),
            database.template_store(),
            resolver,
            connector,
            alerts,
            dispatcher,
            task_records.clone(),
            Arc::clone(&metrics),
        ));

        let queue = Arc::new(QueueManager::new(
            processor,
            &config.queue,
            shutdown.clone(),
            Arc::clone(&metrics),
        ));
        let submitter = Arc::new(
            JobSubmitter::new(
                database.job_store(),
                database.template_store(),
                database.test_record_store(),
                Arc::clone(&queue),
                task_records.clone(),
                config.manager.submission_mode,
                Arc::clone(&metrics),
            )
            .context("创建作业提交器失败")?,
        );
        let cron = Arc::new(CronManager::new(
            database.template_store(),
            submitter,
            shutdown.clone(),
            metrics,
        ));

        let watcher = task_records.map(|client| {
            Arc::new(TaskWatcher::new(
                client,
                Arc::clone(&queue),
                Duration::from_secs(config.task_record.watch_retry_seconds),
                shutdown.clone(),
            ))
        });

        Ok(Self {
            database,
            queue,
            cron,
            catalog,
            watcher,
            shutdown,
        })
    }

    /// 运行到关闭信号到达，然后停止定时器和队列
    pub async fn run(&self) -> Result<()> {
        if let Err(e) = self.catalog.scan().await {
            warn!("扫描脚本目录失败: {e}");
        }
        let catalog_handle = {
            let catalog = Arc::clone(&self.catalog);
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = catalog.watch(shutdown).await {
                    error!("脚本目录监听启动失败: {e}");
                }
            })
        };

        let restored = self.cron.sync_cron().await.context("重建定时任务失败")?;
        info!("巡检管理服务已启动，恢复 {} 个定时任务", restored);

        let watch_handle: Option<JoinHandle<()>> = self.watcher.as_ref().map(|watcher| {
            let watcher = Arc::clone(watcher);
            tokio::spawn(async move { watcher.run().await })
        });

        self.shutdown.cancelled().await;
        info!("开始停止巡检管理服务");

        self.cron.shutdown().await;
        if let Some(handle) = watch_handle {
            if let Err(e) = handle.await {
                error!("任务记录监听异常退出: {e}");
            }
        }
        self.queue.shutdown().await;
        if let Err(e) = catalog_handle.await {
            error!("脚本目录监听异常退出: {e}");
        }

        if let Err(e) = self.database.health_check().await {
            warn!("关闭前数据库健康检查失败: {e}");
        }
        self.database.close().await;
        info!("巡检管理服务已停止");
        Ok(())
    }
}
