//! 集群任务记录监听
//!
//! 监听新建的任务记录，状态为 `creating` 的转为作业入队。监听断开后固定间隔重连，不设上限。

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use inspection_domain::{TaskEvent, TaskRecordClient};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::queue_manager::QueueManager;

pub struct TaskWatcher {
    client: Arc<dyn TaskRecordClient>,
    queue: Arc<QueueManager>,
    retry_interval: Duration,
    shutdown: CancellationToken,
}

impl TaskWatcher {
    pub fn new(
        client: Arc<dyn TaskRecordClient>,
        queue: Arc<QueueManager>,
        retry_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            client,
            queue,
            retry_interval,
            shutdown,
        }
    }

    pub async fn run(&self) {
        info!("开始监听集群任务记录");
        loop {
            match self.client.watch().await {
                Ok(mut events) => loop {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => {
                            info!("任务记录监听已停止");
                            return;
                        }
                        next = events.next() => match next {
                            Some(Ok(event)) => {
                                self.handle_event(event).await;
                            }
                            Some(Err(err)) => {
                                warn!("任务记录监听出错: {}", err);
                                break;
                            }
                            None => {
                                warn!("任务记录监听通道已关闭");
                                break;
                            }
                        }
                    }
                },
                Err(err) => error!("建立任务记录监听失败: {}", err),
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("任务记录监听已停止");
                    return;
                }
                _ = tokio::time::sleep(self.retry_interval) => {
                    info!("重新建立任务记录监听");
                }
            }
        }
    }

    /// 处理单个事件，返回是否入队
    pub async fn handle_event(&self, event: TaskEvent) -> bool {
        let TaskEvent::Added(spec) = &event else {
            debug!("忽略 {} 事件: {}", event.kind(), event.spec().job_id);
            return false;
        };
        if !spec.is_creating() {
            debug!("任务记录 {} 状态为 {}，忽略", spec.job_id, spec.status);
            return false;
        }

        match spec.to_job() {
            Ok(job) => {
                info!("任务记录 {} 入队，集群 {}", job.job_id, job.cluster_name);
                self.queue.enqueue(job).await;
                true
            }
            Err(err) => {
                error!("任务记录 {} 无法转换为作业: {}", spec.job_id, err);
                false
            }
        }
    }
}
