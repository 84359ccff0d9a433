mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{add_template, queue_config, RecordingHandler};
use inspection_core::{InspectionError, SubmissionMode};
use inspection_dispatcher::{build_cron_spec, CronManager, JobSubmitter, QueueManager};
use inspection_domain::{CronRequest, JobMode, JobQuery, JobStore, TemplateStore};
use inspection_infrastructure::MetricsCollector;
use inspection_testing_utils::{TemplateBuilder, TestStores};
use tokio_util::sync::CancellationToken;

struct Fixture {
    stores: TestStores,
    manager: CronManager,
}

fn fixture() -> Fixture {
    let stores = TestStores::new();
    let metrics = Arc::new(MetricsCollector::new());
    let shutdown = CancellationToken::new();
    let queue = Arc::new(QueueManager::new(
        Arc::new(RecordingHandler::default()),
        &queue_config(),
        shutdown.clone(),
        Arc::clone(&metrics),
    ));
    let submitter = Arc::new(
        JobSubmitter::new(
            stores.job_store(),
            stores.template_store(),
            stores.record_store(),
            queue,
            None,
            SubmissionMode::Direct,
            Arc::clone(&metrics),
        )
        .unwrap(),
    );
    let manager = CronManager::new(stores.template_store(), submitter, shutdown, metrics);
    Fixture { stores, manager }
}

fn daily(template: &str, hour: &str) -> CronRequest {
    CronRequest {
        template_name: template.to_string(),
        mode: "regular".to_string(),
        frequency: "daily".to_string(),
        hour: Some(hour.to_string()),
        minute: Some("30".to_string()),
        job_name: "scheduled".to_string(),
        ip_list: vec!["10.0.0.1".to_string()],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_cron_job_stores_spec_and_starts_timer() {
    let f = fixture();
    let id = add_template(&f.stores, "gpu", &["script_a"]).await;

    let template = f.manager.create_cron_job(&daily("gpu", "9"), "alice", "c1").await.unwrap();
    assert_eq!(template.template_id, id);
    assert_eq!(template.cron.as_ref().unwrap().cron_expr, "30 9 * * *");

    let stored = f.stores.templates.find_by_id(id).await.unwrap().unwrap();
    assert!(stored.cron_enabled());
    assert_eq!(f.manager.active_schedules().await, vec![id]);
    assert_eq!(f.manager.schedule_expr(id).await.as_deref(), Some("30 9 * * *"));
}

#[tokio::test]
async fn test_recreate_replaces_existing_timer() {
    let f = fixture();
    let id = add_template(&f.stores, "gpu", &["script_a"]).await;

    f.manager.create_cron_job(&daily("gpu", "9"), "alice", "c1").await.unwrap();
    f.manager.create_cron_job(&daily("gpu", "21"), "alice", "c1").await.unwrap();

    assert_eq!(f.manager.active_schedules().await, vec![id]);
    assert_eq!(f.manager.schedule_expr(id).await.as_deref(), Some("30 21 * * *"));
}

#[tokio::test]
async fn test_invalid_request_keeps_previous_schedule() {
    let f = fixture();
    let id = add_template(&f.stores, "gpu", &["script_a"]).await;
    f.manager.create_cron_job(&daily("gpu", "9"), "alice", "c1").await.unwrap();

    let err = f
        .manager
        .create_cron_job(&daily("gpu", "24"), "alice", "c1")
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let stored = f.stores.templates.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.cron.unwrap().cron_expr, "30 9 * * *");
    assert_eq!(f.manager.schedule_expr(id).await.as_deref(), Some("30 9 * * *"));
}

#[tokio::test]
async fn test_unknown_template_is_rejected() {
    let f = fixture();
    let err = f
        .manager
        .create_cron_job(&daily("missing", "9"), "alice", "c1")
        .await
        .unwrap_err();
    assert!(matches!(err, InspectionError::TemplateNotFound { .. }));
    assert!(f.manager.active_schedules().await.is_empty());
}

#[tokio::test]
async fn test_deep_template_cannot_carry_schedule() {
    let f = fixture();
    let id = f
        .stores
        .templates
        .insert(&TemplateBuilder::new("deep-tpl").with_mode(JobMode::Deep).build(), &[])
        .await
        .unwrap();

    // 请求里的 mode 不能覆盖模板保存的模式
    let err = f
        .manager
        .create_cron_job(&daily("deep-tpl", "9"), "alice", "c1")
        .await
        .unwrap_err();
    assert!(matches!(err, InspectionError::Validation(_)));
    assert!(f.manager.active_schedules().await.is_empty());
    let stored = f.stores.templates.find_by_id(id).await.unwrap().unwrap();
    assert!(!stored.cron_enabled());
}

#[tokio::test]
async fn test_sync_cron_skips_non_regular_templates() {
    let f = fixture();
    let spec = build_cron_spec(&daily("gpu", "3"), 0).unwrap();
    let regular = f
        .stores
        .templates
        .insert(&TemplateBuilder::new("gpu").with_cron(spec.clone()).build(), &[])
        .await
        .unwrap();
    f.stores
        .templates
        .insert(
            &TemplateBuilder::new("deep-tpl")
                .with_mode(JobMode::Deep)
                .with_cron(spec)
                .build(),
            &[],
        )
        .await
        .unwrap();

    assert_eq!(f.manager.sync_cron().await.unwrap(), 1);
    assert_eq!(f.manager.active_schedules().await, vec![regular]);
    f.manager.shutdown().await;
}

#[tokio::test]
async fn test_delete_cron_job_stops_timer_and_clears_spec() {
    let f = fixture();
    let id = add_template(&f.stores, "gpu", &["script_a"]).await;
    f.manager.create_cron_job(&daily("gpu", "9"), "alice", "c1").await.unwrap();

    f.manager.delete_cron_job("gpu", "c1").await.unwrap();

    assert!(f.manager.active_schedules().await.is_empty());
    let stored = f.stores.templates.find_by_id(id).await.unwrap().unwrap();
    assert!(!stored.cron_enabled());
    assert!(!f.manager.remove_schedule(id).await);
}

#[tokio::test]
async fn test_delete_template_removes_timer() {
    let f = fixture();
    let id = add_template(&f.stores, "gpu", &["script_a"]).await;
    f.manager.create_cron_job(&daily("gpu", "9"), "alice", "c1").await.unwrap();

    f.manager.delete_template("gpu", "c1").await.unwrap();
    assert!(f.manager.active_schedules().await.is_empty());
    assert!(f.stores.templates.find_by_id(id).await.unwrap().is_none());

    let err = f.manager.delete_template("gpu", "c1").await.unwrap_err();
    assert!(matches!(err, InspectionError::TemplateNotFound { .. }));
}

#[tokio::test]
async fn test_sync_cron_rebuilds_enabled_templates() {
    let f = fixture();
    let spec = build_cron_spec(&daily("gpu", "3"), 0).unwrap();
    let with_cron = f
        .stores
        .templates
        .insert(&TemplateBuilder::new("gpu").with_cron(spec.clone()).build(), &[])
        .await
        .unwrap();
    let other = f
        .stores
        .templates
        .insert(
            &TemplateBuilder::new("gpu").with_cluster("c2").with_cron(spec).build(),
            &[],
        )
        .await
        .unwrap();
    f.stores
        .templates
        .insert(&TemplateBuilder::new("plain").build(), &[])
        .await
        .unwrap();

    assert_eq!(f.manager.sync_cron().await.unwrap(), 2);
    assert_eq!(f.manager.active_schedules().await, vec![with_cron, other]);

    f.manager.shutdown().await;
    assert!(f.manager.active_schedules().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timer_submits_job_as_acting_user() {
    let f = fixture();
    let spec = build_cron_spec(&daily("gpu", "4"), 0).unwrap();
    let template = TemplateBuilder::new("gpu")
        .with_cron(spec)
        .with_modify_user("carol")
        .build();
    f.stores.templates.insert(&template, &[]).await.unwrap();
    f.manager.sync_cron().await.unwrap();

    // 暂停的时钟会自动推进到下一次触发
    tokio::time::sleep(Duration::from_secs(25 * 3600)).await;
    f.manager.shutdown().await;

    let page = f.stores.jobs.find_page(&JobQuery::default()).await.unwrap();
    assert!(page.total >= 1);
    let job = &page.items[0];
    assert!(job.is_cron);
    assert_eq!(job.user_name, "carol");
    assert_eq!(job.job_name, "scheduled");
    assert_eq!(job.template_name, "gpu");
    assert_eq!(job.ip_list, vec!["10.0.0.1"]);
}
