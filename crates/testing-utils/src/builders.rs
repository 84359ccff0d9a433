//! 测试数据构造器

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use inspection_domain::{
    CheckResult, CronSpec, Job, JobMode, JobNodesInfo, JobStatus, Template,
};

/// 构造 `Job`，默认是集群 `c1` 上 `creating` 状态的常规作业
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new() -> Self {
        Self {
            job: Job {
                job_id: "20260101-000001".to_string(),
                job_name: "test_job".to_string(),
                user_name: "tester".to_string(),
                cluster_name: "c1".to_string(),
                is_cron: false,
                template_name: "gpu".to_string(),
                template_id: 1,
                ip_list: vec![],
                base_ip: None,
                mode: JobMode::Regular,
                resource: "Z3200".to_string(),
                status: JobStatus::Creating,
                create_time: Utc::now(),
                finish_time: None,
            },
        }
    }

    pub fn with_id(mut self, job_id: &str) -> Self {
        self.job.job_id = job_id.to_string();
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.job.job_name = name.to_string();
        self
    }

    pub fn with_cluster(mut self, cluster: &str) -> Self {
        self.job.cluster_name = cluster.to_string();
        self
    }

    pub fn with_template(mut self, name: &str, template_id: i64) -> Self {
        self.job.template_name = name.to_string();
        self.job.template_id = template_id;
        self
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.job.user_name = user.to_string();
        self
    }

    pub fn with_mode(mut self, mode: JobMode) -> Self {
        self.job.mode = mode;
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.job.status = status;
        self
    }

    pub fn with_ip_list(mut self, ips: &[&str]) -> Self {
        self.job.ip_list = ips.iter().map(|ip| ip.to_string()).collect();
        self
    }

    pub fn with_create_time(mut self, time: DateTime<Utc>) -> Self {
        self.job.create_time = time;
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

impl Default for JobBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 构造 `Template`，默认是集群 `c1` 上的常规模板
pub struct TemplateBuilder {
    template: Template,
}

impl TemplateBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            template: Template::new(name, "c1", JobMode::Regular, "Z3200", "tester"),
        }
    }

    pub fn with_cluster(mut self, cluster: &str) -> Self {
        self.template.cluster_name = cluster.to_string();
        self
    }

    pub fn with_mode(mut self, mode: JobMode) -> Self {
        self.template.mode = mode;
        self
    }

    pub fn with_resource(mut self, resource: &str) -> Self {
        self.template.resource = resource.to_string();
        self
    }

    pub fn with_cron(mut self, cron: CronSpec) -> Self {
        self.template.cron = Some(cron);
        self
    }

    pub fn with_modify_user(mut self, user: &str) -> Self {
        self.template.modify_user = Some(user.to_string());
        self
    }

    pub fn build(self) -> Template {
        self.template
    }
}

/// `(key, code, message)` 列表组成 Agent 结果
pub fn check_result(entries: &[(&str, i32, &str)]) -> CheckResult {
    CheckResult {
        logs_result: entries
            .iter()
            .map(|(key, _, msg)| (key.to_string(), msg.to_string()))
            .collect(),
        case_result: entries
            .iter()
            .map(|(key, code, _)| (key.to_string(), *code))
            .collect(),
    }
}

/// `count` 个节点 `10.0.0.N -> node-N`
pub fn nodes(count: usize) -> JobNodesInfo {
    JobNodesInfo {
        process_nodes: (1..=count)
            .map(|i| (format!("10.0.0.{i}"), format!("node-{i}")))
            .collect::<HashMap<_, _>>(),
        base_node: None,
    }
}
