//! 脚本下发与执行
//!
//! 一个作业只建立一次 Agent 会话，脚本按模板顺序逐个打包、传输、执行。
//! 全进程同一时刻只允许一个脚本包在传输。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use inspection_core::{InspectionError, InspectionResult, RpcConfig};
use inspection_domain::{
    AgentClient, AgentConnector, CheckResult, ExecuteRequest, Job, JobNodesInfo, ScriptArchiver,
    ScriptStore,
};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::result_aggregator::ResultAggregator;

pub struct ScriptDispatcher {
    connector: Arc<dyn AgentConnector>,
    archiver: Arc<dyn ScriptArchiver>,
    scripts: Arc<dyn ScriptStore>,
    aggregator: Arc<ResultAggregator>,
    /// 脚本包传输锁，全局串行
    transfer_lock: Semaphore,
    connect_timeout: Duration,
    execute_timeout: Duration,
}

impl ScriptDispatcher {
    pub fn new(
        connector: Arc<dyn AgentConnector>,
        archiver: Arc<dyn ScriptArchiver>,
        scripts: Arc<dyn ScriptStore>,
        aggregator: Arc<ResultAggregator>,
        config: &RpcConfig,
    ) -> Self {
        Self {
            connector,
            archiver,
            scripts,
            aggregator,
            transfer_lock: Semaphore::new(1),
            connect_timeout: config.connect_timeout(),
            execute_timeout: config.execute_timeout(),
        }
    }

    /// 执行作业的全部脚本，返回是否每个脚本的 RPC 都成功
    ///
    /// 单个脚本失败不会中断后续脚本，失败的脚本记为全节点失败。
    pub async fn run(
        &self,
        job: &Job,
        address: &str,
        scripts: &[String],
        nodes: &JobNodesInfo,
    ) -> bool {
        let node_count = nodes.node_count();
        let client = match self.connect(address).await {
            Ok(client) => client,
            Err(err) => {
                warn!(
                    "作业 {} 连接集群 {} 的Agent {} 失败: {}",
                    job.job_id, job.cluster_name, address, err
                );
                for script in scripts {
                    self.aggregator
                        .aggregate(&job.job_id, &job.cluster_name, script, None, node_count, 0.0)
                        .await;
                }
                return false;
            }
        };

        let mut success = true;
        for script in scripts {
            let started = Instant::now();
            info!("作业 {} 开始执行脚本 {}", job.job_id, script);
            let outcome = self.run_script(client.as_ref(), job, script, nodes).await;
            let elapsed = started.elapsed().as_secs_f64();

            let result = match outcome {
                Ok(result) => Some(result),
                Err(err) => {
                    warn!("作业 {} 脚本 {} 执行失败: {}", job.job_id, script, err);
                    success = false;
                    None
                }
            };
            self.aggregator
                .aggregate(
                    &job.job_id,
                    &job.cluster_name,
                    script,
                    result,
                    node_count,
                    elapsed,
                )
                .await;
            info!("作业 {} 脚本 {} 处理完毕，耗时 {:.2}s", job.job_id, script, elapsed);
        }
        success
    }

    async fn connect(&self, address: &str) -> InspectionResult<Box<dyn AgentClient>> {
        tokio::time::timeout(self.connect_timeout, self.connector.connect(address))
            .await
            .map_err(|_| InspectionError::Transport(format!("连接Agent {address} 超时")))?
    }

    async fn run_script(
        &self,
        client: &dyn AgentClient,
        job: &Job,
        script: &str,
        nodes: &JobNodesInfo,
    ) -> InspectionResult<CheckResult> {
        let bundle = self.archiver.archive(script).await?;

        // 传输和执行共用一个截止时间
        tokio::time::timeout(self.execute_timeout, async {
            {
                let _permit = self
                    .transfer_lock
                    .acquire()
                    .await
                    .map_err(|e| InspectionError::Internal(format!("传输锁已关闭: {e}")))?;
                client.transfer_script(&bundle).await?;
            }

            let params = self.script_params(job.template_id, script).await;
            let request = ExecuteRequest {
                job_id: job.job_id.clone(),
                process_nodes: nodes.process_nodes.clone(),
                base_node: nodes.base_node.clone(),
                script_name: script.to_string(),
                params,
                cluster_name: job.cluster_name.clone(),
            };
            client.execute(&request).await
        })
        .await
        .map_err(|_| InspectionError::ExecutionTimeout)?
    }

    /// 参数查询失败时按无参数执行
    async fn script_params(&self, template_id: i64, script: &str) -> BTreeMap<String, String> {
        match self.scripts.find_params_by_template(template_id, script).await {
            Ok(params) => params,
            Err(err) => {
                warn!("查询模板 {} 脚本 {} 的参数失败: {}", template_id, script, err);
                BTreeMap::new()
            }
        }
    }
}
