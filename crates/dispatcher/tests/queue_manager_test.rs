mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{queue_config, RecordingHandler};
use inspection_core::QueueConfig;
use inspection_dispatcher::QueueManager;
use inspection_infrastructure::MetricsCollector;
use inspection_testing_utils::JobBuilder;
use tokio_util::sync::CancellationToken;

fn manager(handler: Arc<RecordingHandler>, config: &QueueConfig) -> QueueManager {
    QueueManager::new(
        handler,
        config,
        CancellationToken::new(),
        Arc::new(MetricsCollector::new()),
    )
}

#[tokio::test]
async fn test_jobs_of_one_cluster_run_in_enqueue_order() {
    let handler = Arc::new(RecordingHandler::with_delay(Duration::from_millis(5)));
    let queue = manager(Arc::clone(&handler), &queue_config());

    let ids: Vec<String> = (0..6).map(|i| format!("20260101-00000{i}")).collect();
    for id in &ids {
        queue
            .enqueue(JobBuilder::new().with_id(id).with_cluster("c1").build())
            .await;
    }

    assert!(queue.close("c1").await);
    assert_eq!(handler.handled_ids("c1"), ids);
    assert_eq!(handler.max_in_flight.lock().unwrap()["c1"], 1);
}

#[tokio::test]
async fn test_clusters_run_concurrently() {
    let handler = Arc::new(RecordingHandler::with_delay(Duration::from_millis(200)));
    let queue = manager(Arc::clone(&handler), &queue_config());

    let started = tokio::time::Instant::now();
    for cluster in ["c1", "c2", "c3"] {
        for i in 0..2 {
            queue
                .enqueue(
                    JobBuilder::new()
                        .with_id(&format!("{cluster}-{i}"))
                        .with_cluster(cluster)
                        .build(),
                )
                .await;
        }
    }
    assert_eq!(queue.active_clusters().await, vec!["c1", "c2", "c3"]);

    for cluster in ["c1", "c2", "c3"] {
        queue.close(cluster).await;
    }
    // 三个集群各两个作业，串行需要 1.2s
    assert!(started.elapsed() < Duration::from_millis(1000));
    assert_eq!(handler.total(), 6);
    for cluster in ["c1", "c2", "c3"] {
        assert_eq!(
            handler.handled_ids(cluster),
            vec![format!("{cluster}-0"), format!("{cluster}-1")]
        );
        assert_eq!(handler.max_in_flight.lock().unwrap()[cluster], 1);
    }
}

#[tokio::test]
async fn test_queue_depth_and_close() {
    let handler = Arc::new(RecordingHandler::with_delay(Duration::from_millis(100)));
    let queue = manager(Arc::clone(&handler), &queue_config());

    for i in 0..3 {
        queue
            .enqueue(JobBuilder::new().with_id(&format!("job-{i}")).build())
            .await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    // 第一个作业正在执行
    assert_eq!(queue.queue_depth("c1").await, 2);
    assert_eq!(queue.queue_depth("unknown").await, 0);

    assert!(queue.close("c1").await);
    assert!(!queue.close("c1").await);
    assert_eq!(handler.total(), 3);
    assert!(queue.active_clusters().await.is_empty());
}

#[tokio::test]
async fn test_worker_survives_idle_timeout() {
    let handler = Arc::new(RecordingHandler::default());
    let config = QueueConfig {
        capacity: 4,
        idle_timeout_seconds: 1,
    };
    let queue = manager(Arc::clone(&handler), &config);

    queue.enqueue(JobBuilder::new().with_id("first").build()).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    queue.enqueue(JobBuilder::new().with_id("second").build()).await;

    queue.close("c1").await;
    assert_eq!(handler.handled_ids("c1"), vec!["first", "second"]);
}

#[tokio::test]
async fn test_shutdown_stops_workers() {
    let handler = Arc::new(RecordingHandler::default());
    let queue = manager(Arc::clone(&handler), &queue_config());

    queue.enqueue(JobBuilder::new().with_id("a").with_cluster("c1").build()).await;
    queue.enqueue(JobBuilder::new().with_id("b").with_cluster("c2").build()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    queue.shutdown().await;
    assert!(queue.active_clusters().await.is_empty());
    assert_eq!(handler.total(), 2);
}

#[tokio::test]
async fn test_enqueue_during_close_waits_for_old_worker() {
    let handler = Arc::new(RecordingHandler::with_delay(Duration::from_millis(100)));
    let queue = Arc::new(manager(Arc::clone(&handler), &queue_config()));

    for i in 0..3 {
        queue
            .enqueue(JobBuilder::new().with_id(&format!("old-{i}")).build())
            .await;
    }
    let closing = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.close("c1").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // 旧队列还有作业未执行完，新作业必须等旧 worker 退出
    queue.enqueue(JobBuilder::new().with_id("new-0").build()).await;
    assert!(closing.await.unwrap());
    assert_eq!(queue.active_clusters().await, vec!["c1"]);

    assert!(queue.close("c1").await);
    assert_eq!(
        handler.handled_ids("c1"),
        vec!["old-0", "old-1", "old-2", "new-0"]
    );
    assert_eq!(handler.max_in_flight.lock().unwrap()["c1"], 1);
}

#[tokio::test]
async fn test_enqueue_after_shutdown_is_dropped() {
    let handler = Arc::new(RecordingHandler::default());
    let queue = manager(Arc::clone(&handler), &queue_config());

    queue.shutdown().await;
    queue.enqueue(JobBuilder::new().with_id("late").build()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(queue.active_clusters().await.is_empty());
    assert_eq!(handler.total(), 0);
}
