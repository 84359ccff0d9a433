mod common;

use common::{add_template, Harness};
use inspection_domain::{JobStatus, JobStore, TemplateStore, TestRecordStore, TestResult};
use inspection_testing_utils::{
    check_result, nodes, JobBuilder, MockAgentConnector, MockNodeResolver, MockScriptArchiver,
    ScriptOutcome, TestStores,
};

fn three_node_result(critical: bool) -> ScriptOutcome {
    let code = if critical { 1 } else { 0 };
    ScriptOutcome::Success(check_result(&[
        ("ok(node-1)(node-2)", 0, "ok"),
        ("check(node-3)", code, "ecc error"),
    ]))
}

#[tokio::test]
async fn test_health_failure_does_not_fail_job() {
    let agent = MockAgentConnector::new()
        .with_outcome("script_a", three_node_result(false))
        .with_outcome("script_b", three_node_result(true));
    let h = Harness::new(agent, MockNodeResolver::new(nodes(3)));
    let template_id = add_template(&h.stores, "gpu", &["script_a", "script_b"]).await;
    let job = JobBuilder::new().with_template("gpu", template_id).build();
    h.stores.jobs.insert(&job).await.unwrap();

    let status = h.processor.process(job.clone()).await;
    assert_eq!(status, Some(JobStatus::Completed));

    let stored = h.stores.jobs.find_by_id(&job.job_id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(stored.finish_time.is_some());
    assert!(stored.time_cost().is_some());

    let records = h.stores.records.find_by_job(&job.job_id).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].case_name, "script_a");
    assert_eq!(records[0].result, TestResult::Passed);
    assert_eq!(records[0].healthy_num, 3);
    assert_eq!(records[1].case_name, "script_b");
    assert_eq!(records[1].result, TestResult::NotPassed);
    assert_eq!(records[1].critical_num, 1);
    for record in &records {
        assert_eq!(record.counts().total(), record.total_num);
    }

    assert_eq!(h.alerts.alerts().len(), 1);
    assert_eq!(
        h.alerts.registrations(),
        vec![(
            "c1".to_string(),
            vec!["script_a".to_string(), "script_b".to_string()]
        )]
    );
    assert_eq!(h.agent.transferred(), vec!["script_a", "script_b"]);
    assert_eq!(h.agent.executed_scripts(), vec!["script_a", "script_b"]);
    assert_eq!(h.agent.connections(), 1);

    let executed = h.agent.executed();
    assert_eq!(executed[0].process_nodes.len(), 3);
    assert_eq!(executed[0].params.get("level").map(String::as_str), Some("full"));

    let template = h.templates().find_by_id(template_id).await.unwrap().unwrap();
    assert_eq!(template.last_job_id.as_deref(), Some(job.job_id.as_str()));
}

#[tokio::test]
async fn test_script_transport_failure_fails_job_but_runs_all_scripts() {
    let agent = MockAgentConnector::new()
        .with_outcome("script_a", ScriptOutcome::ExecuteFailure)
        .with_outcome("script_b", ScriptOutcome::TransferFailure)
        .with_outcome("script_c", ScriptOutcome::Timeout);
    let h = Harness::new(agent, MockNodeResolver::new(nodes(2)));
    let template_id =
        add_template(&h.stores, "gpu", &["script_a", "script_b", "script_c", "script_d"]).await;
    let job = JobBuilder::new().with_template("gpu", template_id).build();
    h.stores.jobs.insert(&job).await.unwrap();

    assert_eq!(h.processor.process(job.clone()).await, Some(JobStatus::TaskFailed));

    let records = h.stores.records.find_by_job(&job.job_id).await.unwrap();
    let results: Vec<TestResult> = records.iter().map(|r| r.result).collect();
    assert_eq!(
        results,
        vec![
            TestResult::Failed,
            TestResult::Failed,
            TestResult::Failed,
            TestResult::Passed
        ]
    );
    assert!(records.iter().all(|r| r.total_num == 2));
    // 传输失败的脚本不会执行
    assert_eq!(
        h.agent.executed_scripts(),
        vec!["script_a", "script_c", "script_d"]
    );
}

#[tokio::test]
async fn test_archive_failure_is_recorded_as_failed_script() {
    let stores = TestStores::new();
    let archiver = MockScriptArchiver::new().with_missing("script_a");
    let h = Harness::build_with_archiver(
        stores,
        MockAgentConnector::new(),
        MockNodeResolver::new(nodes(1)),
        archiver,
        false,
    );
    let template_id = add_template(&h.stores, "gpu", &["script_a", "script_b"]).await;
    let job = JobBuilder::new().with_template("gpu", template_id).build();

    assert_eq!(h.processor.process(job.clone()).await, Some(JobStatus::TaskFailed));
    let records = h.stores.records.find_by_job(&job.job_id).await.unwrap();
    assert_eq!(records[0].result, TestResult::Failed);
    assert_eq!(records[1].result, TestResult::Passed);
}

#[tokio::test]
async fn test_connect_failure_records_every_script_failed() {
    let h = Harness::new(
        MockAgentConnector::new().failing_connect(),
        MockNodeResolver::new(nodes(3)),
    );
    let template_id = add_template(&h.stores, "gpu", &["script_a", "script_b"]).await;
    let job = JobBuilder::new().with_template("gpu", template_id).build();
    h.stores.jobs.insert(&job).await.unwrap();

    assert_eq!(h.processor.process(job.clone()).await, Some(JobStatus::TaskFailed));
    let records = h.stores.records.find_by_job(&job.job_id).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.result == TestResult::Failed && r.total_num == 3));
}

#[tokio::test]
async fn test_empty_template_is_creation_failed() {
    let h = Harness::new(MockAgentConnector::new(), MockNodeResolver::new(nodes(3)));
    let template_id = add_template(&h.stores, "empty", &[]).await;
    let job = JobBuilder::new().with_template("empty", template_id).build();
    h.stores.jobs.insert(&job).await.unwrap();

    assert_eq!(
        h.processor.process(job.clone()).await,
        Some(JobStatus::CreationFailed)
    );
    let stored = h.stores.jobs.find_by_id(&job.job_id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::CreationFailed);
    assert!(stored.finish_time.is_some());
    assert!(h.agent.executed().is_empty());
    assert!(h.alerts.registrations().is_empty());
}

#[tokio::test]
async fn test_resolution_failures_are_creation_failed() {
    let h = Harness::new(
        MockAgentConnector::new(),
        MockNodeResolver::failing("api server unreachable"),
    );
    let template_id = add_template(&h.stores, "gpu", &["script_a"]).await;
    let job = JobBuilder::new().with_template("gpu", template_id).build();
    assert_eq!(
        h.processor.process(job).await,
        Some(JobStatus::CreationFailed)
    );

    let h = Harness::new(
        MockAgentConnector::new().without_address("c1"),
        MockNodeResolver::new(nodes(1)),
    );
    let template_id = add_template(&h.stores, "gpu", &["script_a"]).await;
    let job = JobBuilder::new().with_template("gpu", template_id).build();
    assert_eq!(
        h.processor.process(job).await,
        Some(JobStatus::CreationFailed)
    );
    assert_eq!(h.agent.connections(), 0);
}

#[tokio::test]
async fn test_duplicate_delivery_is_skipped() {
    let h = Harness::new(MockAgentConnector::new(), MockNodeResolver::new(nodes(1)));
    let template_id = add_template(&h.stores, "gpu", &["script_a"]).await;
    let job = JobBuilder::new().with_template("gpu", template_id).build();
    h.stores.jobs.insert(&job).await.unwrap();

    assert_eq!(h.processor.process(job.clone()).await, Some(JobStatus::Completed));
    assert_eq!(h.processor.process(job.clone()).await, None);
    assert_eq!(h.agent.executed().len(), 1);
    assert_eq!(h.resolver.calls().len(), 1);
}

#[tokio::test]
async fn test_transitions_are_mirrored_to_task_records() {
    let h = Harness::with_task_records(MockAgentConnector::new(), MockNodeResolver::new(nodes(1)));
    let template_id = add_template(&h.stores, "gpu", &["script_a"]).await;
    // 外部任务记录产生的作业，本地尚无记录
    let job = JobBuilder::new().with_template("gpu", template_id).build();

    assert_eq!(h.processor.process(job.clone()).await, Some(JobStatus::Completed));
    assert!(h.stores.jobs.find_by_id(&job.job_id).await.unwrap().is_some());

    let updates = h.task_records.updates();
    let statuses: Vec<JobStatus> = updates.iter().map(|(_, s, _)| *s).collect();
    assert_eq!(statuses, vec![JobStatus::Ongoing, JobStatus::Completed]);
    assert!(updates[0].2.is_none());
    assert!(updates[1].2.is_some());
}

#[tokio::test]
async fn test_mirror_failure_keeps_local_state() {
    let h = Harness::with_task_records(MockAgentConnector::new(), MockNodeResolver::new(nodes(1)));
    h.task_records.fail_update();
    let template_id = add_template(&h.stores, "gpu", &["script_a"]).await;
    let job = JobBuilder::new().with_template("gpu", template_id).build();
    h.stores.jobs.insert(&job).await.unwrap();

    assert_eq!(h.processor.process(job.clone()).await, Some(JobStatus::Completed));
    let stored = h.stores.jobs.find_by_id(&job.job_id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_transfers_are_serialized_across_clusters() {
    let agent = MockAgentConnector::new().with_transfer_delay(std::time::Duration::from_millis(50));
    let h = Harness::new(agent, MockNodeResolver::new(nodes(2)));
    let template_id = add_template(&h.stores, "gpu", &["script_a", "script_b"]).await;
    let job_c1 = JobBuilder::new()
        .with_id("20260101-000001")
        .with_cluster("c1")
        .with_template("gpu", template_id)
        .build();
    let job_c2 = JobBuilder::new()
        .with_id("20260101-000002")
        .with_cluster("c2")
        .with_template("gpu", template_id)
        .build();
    h.stores.jobs.insert(&job_c1).await.unwrap();
    h.stores.jobs.insert(&job_c2).await.unwrap();

    let (first, second) = tokio::join!(
        h.processor.process(job_c1.clone()),
        h.processor.process(job_c2.clone())
    );

    assert_eq!(first, Some(JobStatus::Completed));
    assert_eq!(second, Some(JobStatus::Completed));
    assert_eq!(h.agent.transferred().len(), 4);
    assert_eq!(h.agent.peak_transfers(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_execution_times_out_and_next_script_runs() {
    let agent = MockAgentConnector::new().with_outcome("script_a", ScriptOutcome::Hang);
    let h = Harness::new(agent, MockNodeResolver::new(nodes(2)));
    let template_id = add_template(&h.stores, "gpu", &["script_a", "script_b"]).await;
    let job = JobBuilder::new().with_template("gpu", template_id).build();
    h.stores.jobs.insert(&job).await.unwrap();

    let started = tokio::time::Instant::now();
    assert_eq!(h.processor.process(job.clone()).await, Some(JobStatus::TaskFailed));
    // 执行超时为 5s
    assert!(started.elapsed() >= std::time::Duration::from_secs(5));

    let records = h.stores.records.find_by_job(&job.job_id).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].case_name, "script_a");
    assert_eq!(records[0].result, TestResult::Failed);
    assert_eq!(records[1].case_name, "script_b");
    assert_eq!(records[1].result, TestResult::Passed);
    assert_eq!(h.agent.executed_scripts(), vec!["script_a", "script_b"]);
}
