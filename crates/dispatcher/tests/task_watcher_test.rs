mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{queue_config, RecordingHandler};
use inspection_dispatcher::{QueueManager, TaskWatcher};
use inspection_domain::{JobStatus, TaskEvent, TaskSpec};
use inspection_infrastructure::MetricsCollector;
use inspection_testing_utils::{JobBuilder, RecordingTaskRecordClient};
use tokio_util::sync::CancellationToken;

struct Fixture {
    handler: Arc<RecordingHandler>,
    queue: Arc<QueueManager>,
    client: RecordingTaskRecordClient,
    shutdown: CancellationToken,
    watcher: Arc<TaskWatcher>,
}

fn fixture() -> Fixture {
    let handler = Arc::new(RecordingHandler::default());
    let shutdown = CancellationToken::new();
    let queue = Arc::new(QueueManager::new(
        Arc::clone(&handler) as _,
        &queue_config(),
        shutdown.clone(),
        Arc::new(MetricsCollector::new()),
    ));
    let client = RecordingTaskRecordClient::new();
    let watcher = Arc::new(TaskWatcher::new(
        Arc::new(client.clone()),
        Arc::clone(&queue),
        Duration::from_millis(10),
        shutdown.clone(),
    ));
    Fixture {
        handler,
        queue,
        client,
        shutdown,
        watcher,
    }
}

fn spec(job_id: &str) -> TaskSpec {
    TaskSpec::from(&JobBuilder::new().with_id(job_id).build())
}

async fn wait_for(handler: &RecordingHandler, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while handler.total() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("handler did not receive jobs in time");
}

#[tokio::test]
async fn test_only_added_creating_records_are_enqueued() {
    let f = fixture();

    assert!(f.watcher.handle_event(TaskEvent::Added(spec("20260101-000001"))).await);
    assert!(!f.watcher.handle_event(TaskEvent::Modified(spec("20260101-000002"))).await);
    assert!(!f.watcher.handle_event(TaskEvent::Deleted(spec("20260101-000003"))).await);

    let mut ongoing = spec("20260101-000004");
    ongoing.status = JobStatus::Ongoing.as_str().to_string();
    assert!(!f.watcher.handle_event(TaskEvent::Added(ongoing)).await);

    let mut broken = spec("20260101-000005");
    broken.mode = "thorough".to_string();
    assert!(!f.watcher.handle_event(TaskEvent::Added(broken)).await);

    assert!(f.queue.close("c1").await);
    assert_eq!(f.handler.handled_ids("c1"), vec!["20260101-000001"]);
}

#[tokio::test]
async fn test_watch_reconnects_after_stream_ends() {
    let f = fixture();
    f.client.push_batch(vec![
        TaskEvent::Added(spec("20260101-000001")),
        TaskEvent::Modified(spec("20260101-000001")),
    ]);
    f.client.push_batch(vec![TaskEvent::Added(spec("20260101-000002"))]);

    let watcher = Arc::clone(&f.watcher);
    let running = tokio::spawn(async move { watcher.run().await });

    wait_for(&f.handler, 2).await;
    assert_eq!(
        f.handler.handled_ids("c1"),
        vec!["20260101-000001", "20260101-000002"]
    );
    assert!(f.client.watch_calls() >= 2);

    f.shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_cancel_stops_idle_watch() {
    let f = fixture();
    let watcher = Arc::clone(&f.watcher);
    let running = tokio::spawn(async move { watcher.run().await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    f.shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(f.client.watch_calls(), 1);
    assert_eq!(f.handler.total(), 0);
}
