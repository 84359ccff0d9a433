//! 按集群串行的作业队列
//!
//! 每个集群一个有界 FIFO 通道和一个常驻 worker。同一集群的作业严格按入队顺序逐个执行，
//! 不同集群之间互不阻塞。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use inspection_core::QueueConfig;
use inspection_domain::Job;
use inspection_infrastructure::observability::{MetricsCollector, StructuredLogger};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 作业完整处理流程，所有错误都应转化为作业终态
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: Job);
}

struct ClusterQueue {
    sender: mpsc::Sender<Job>,
    worker: JoinHandle<()>,
}

/// 映射中的集群槽位。关闭期间保留 Draining，直到旧 worker 退出
enum QueueSlot {
    Open(ClusterQueue),
    Draining(watch::Receiver<bool>),
}

pub struct QueueManager {
    queues: Mutex<HashMap<String, QueueSlot>>,
    handler: Arc<dyn JobHandler>,
    capacity: usize,
    idle_timeout: Duration,
    shutdown: CancellationToken,
    metrics: Arc<MetricsCollector>,
}

impl QueueManager {
    pub fn new(
        handler: Arc<dyn JobHandler>,
        config: &QueueConfig,
        shutdown: CancellationToken,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            handler,
            capacity: config.capacity.max(1),
            idle_timeout: config.idle_timeout(),
            shutdown,
            metrics,
        }
    }

    /// 入队，队列满时等待。入队本身不会失败，下游错误体现在作业状态上
    pub async fn enqueue(&self, job: Job) {
        let cluster = job.cluster_name.clone();
        let job_id = job.job_id.clone();
        let Some(sender) = self.sender_for(&cluster).await else {
            warn!("队列管理器已停止，作业 {} 未入队，保持 creating", job_id);
            return;
        };

        // 发送不持有映射锁，队列满时只阻塞当前调用方
        if let Err(err) = sender.send(job).await {
            error!("作业 {} 入队失败，集群 {} 的队列已关闭: {}", job_id, cluster, err);
            return;
        }

        let depth = self.capacity - sender.capacity();
        self.metrics.update_queue_depth(&cluster, depth);
        StructuredLogger::log_job_enqueued(&job_id, &cluster, depth);
    }

    /// 取集群的发送端。集群正在关闭时先等旧 worker 退出，保证同一集群只有一个 worker
    async fn sender_for(&self, cluster: &str) -> Option<mpsc::Sender<Job>> {
        loop {
            let mut queues = self.queues.lock().await;
            if self.shutdown.is_cancelled() {
                return None;
            }

            match queues.get(cluster) {
                Some(QueueSlot::Open(queue)) if !queue.sender.is_closed() => {
                    return Some(queue.sender.clone());
                }
                Some(QueueSlot::Open(_)) => {
                    warn!("集群 {} 的worker已退出，重新创建", cluster);
                }
                Some(QueueSlot::Draining(drained)) if drained.has_changed().is_err() => {
                    // 关闭调用被中途丢弃，槽位已失效
                    warn!("集群 {} 的关闭未完成，重新创建队列", cluster);
                    queues.remove(cluster);
                }
                Some(QueueSlot::Draining(drained)) => {
                    let mut drained = drained.clone();
                    drop(queues);
                    debug!("集群 {} 的队列正在关闭，等待旧worker退出", cluster);
                    // 发送端被丢弃同样表示关闭结束
                    let _ = drained.wait_for(|done| *done).await;
                    continue;
                }
                None => {}
            }

            let (sender, receiver) = mpsc::channel(self.capacity);
            let worker = tokio::spawn(run_worker(
                cluster.to_string(),
                receiver,
                Arc::clone(&self.handler),
                self.idle_timeout,
                self.shutdown.clone(),
                Arc::clone(&self.metrics),
            ));
            info!("为集群 {} 创建作业队列，容量 {}", cluster, self.capacity);
            queues.insert(
                cluster.to_string(),
                QueueSlot::Open(ClusterQueue {
                    sender: sender.clone(),
                    worker,
                }),
            );
            return Some(sender);
        }
    }

    /// 等待执行的作业数
    pub async fn queue_depth(&self, cluster: &str) -> usize {
        let queues = self.queues.lock().await;
        match queues.get(cluster) {
            Some(QueueSlot::Open(queue)) => self.capacity - queue.sender.capacity(),
            _ => 0,
        }
    }

    pub async fn active_clusters(&self) -> Vec<String> {
        let queues = self.queues.lock().await;
        let mut clusters: Vec<String> = queues
            .iter()
            .filter(|(_, slot)| matches!(slot, QueueSlot::Open(_)))
            .map(|(cluster, _)| cluster.clone())
            .collect();
        clusters.sort();
        clusters
    }

    /// 关闭集群队列，worker 处理完已入队的作业后退出
    pub async fn close(&self, cluster: &str) -> bool {
        let (queue, done) = {
            let mut queues = self.queues.lock().await;
            match queues.remove(cluster) {
                Some(QueueSlot::Open(queue)) => {
                    let (done, drained) = watch::channel(false);
                    queues.insert(cluster.to_string(), QueueSlot::Draining(drained));
                    (queue, done)
                }
                Some(draining) => {
                    queues.insert(cluster.to_string(), draining);
                    return false;
                }
                None => return false,
            }
        };

        drop(queue.sender);
        if let Err(err) = queue.worker.await {
            error!("集群 {} 的worker异常退出: {}", cluster, err);
        }

        {
            let mut queues = self.queues.lock().await;
            if matches!(queues.get(cluster), Some(QueueSlot::Draining(_))) {
                queues.remove(cluster);
            }
        }
        let _ = done.send(true);
        info!("集群 {} 的作业队列已关闭", cluster);
        true
    }

    /// 停止所有 worker，正在执行的作业会执行完毕
    pub async fn shutdown(&self) {
        let slots: Vec<(String, QueueSlot)> = {
            let mut queues = self.queues.lock().await;
            self.shutdown.cancel();
            queues.drain().collect()
        };
        for (cluster, slot) in slots {
            match slot {
                QueueSlot::Open(queue) => {
                    drop(queue.sender);
                    if let Err(err) = queue.worker.await {
                        error!("集群 {} 的worker异常退出: {}", cluster, err);
                    }
                }
                QueueSlot::Draining(mut drained) => {
                    let _ = drained.wait_for(|done| *done).await;
                }
            }
        }
        info!("所有集群作业队列已停止");
    }
}

async fn run_worker(
    cluster: String,
    mut receiver: mpsc::Receiver<Job>,
    handler: Arc<dyn JobHandler>,
    idle_timeout: Duration,
    shutdown: CancellationToken,
    metrics: Arc<MetricsCollector>,
) {
    info!("集群 {} 的worker已启动", cluster);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("集群 {} 的worker收到停止信号", cluster);
                break;
            }
            received = tokio::time::timeout(idle_timeout, receiver.recv()) => match received {
                Ok(Some(job)) => {
                    metrics.update_queue_depth(&cluster, receiver.len());
                    debug!("集群 {} 开始处理作业 {}", cluster, job.job_id);
                    handler.handle(job).await;
                }
                Ok(None) => {
                    info!("集群 {} 的队列已关闭，worker退出", cluster);
                    break;
                }
                Err(_) => {
                    debug!("集群 {} 的队列空闲 {:?}，继续等待", cluster, idle_timeout);
                }
            }
        }
    }
}
