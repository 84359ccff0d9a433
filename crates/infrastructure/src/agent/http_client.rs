//! Agent 的 HTTP/JSON 客户端
//!
//! 每个集群一个 Agent，地址来自 `clusters.<name>`。所有接口返回
//! `{success, message, output}` 包装，`success == false` 视为传输失败。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use inspection_core::{ClusterConfig, InspectionError, InspectionResult, RpcConfig};
use inspection_domain::{
    AgentClient, AgentConnector, CardType, CheckResult, ExecuteRequest, ScriptBundle,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct AgentReply<T> {
    success: bool,
    #[serde(default)]
    message: String,
    output: Option<T>,
}

impl<T> AgentReply<T> {
    fn into_output(self, call: &str) -> InspectionResult<Option<T>> {
        if !self.success {
            return Err(InspectionError::Transport(format!(
                "{call} 失败: {}",
                self.message
            )));
        }
        Ok(self.output)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferBody<'a> {
    file_name: &'a str,
    file_data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteBody<'a> {
    job_id: &'a str,
    process_nodes: &'a HashMap<String, String>,
    base_node: Option<&'a HashMap<String, String>>,
    script_name: &'a str,
    params: &'a std::collections::BTreeMap<String, String>,
    cluster_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceBody<'a> {
    ip_list: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ResourceOutput {
    #[serde(default)]
    node: HashMap<String, i32>,
}

/// 按集群配置建立 Agent 会话
pub struct HttpAgentConnector {
    clusters: HashMap<String, ClusterConfig>,
    connect_timeout: Duration,
    execute_timeout: Duration,
}

impl HttpAgentConnector {
    pub fn new(clusters: HashMap<String, ClusterConfig>, rpc: &RpcConfig) -> Self {
        Self {
            clusters,
            connect_timeout: rpc.connect_timeout(),
            execute_timeout: rpc.execute_timeout(),
        }
    }

    fn accept_invalid_certs(&self, address: &str) -> bool {
        self.clusters
            .values()
            .any(|c| c.accept_invalid_certs && c.agent_address().as_deref() == Some(address))
    }
}

#[async_trait]
impl AgentConnector for HttpAgentConnector {
    fn resolve_address(&self, cluster: &str) -> InspectionResult<String> {
        self.clusters
            .get(cluster)
            .and_then(ClusterConfig::agent_address)
            .ok_or_else(|| InspectionError::AgentUnavailable {
                cluster: cluster.to_string(),
            })
    }

    #[instrument(skip(self))]
    async fn connect(&self, address: &str) -> InspectionResult<Box<dyn AgentClient>> {
        let http = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.execute_timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs(address))
            .build()
            .map_err(|e| InspectionError::Transport(format!("创建HTTP客户端失败: {e}")))?;

        let client = HttpAgentClient::new(http, address);
        client.health().await?;
        debug!("已连接Agent: {}", address);
        Ok(Box::new(client))
    }
}

/// 与单个 Agent 的会话
pub struct HttpAgentClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAgentClient {
    pub fn new(http: reqwest::Client, address: &str) -> Self {
        let base_url = if address.contains("://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{address}")
        };
        Self { http, base_url }
    }

    async fn health(&self) -> InspectionResult<()> {
        let response = self
            .http
            .get(format!("{}/api/v1/health", self.base_url))
            .send()
            .await
            .map_err(|e| InspectionError::Transport(format!("连接Agent失败: {e}")))?;
        if !response.status().is_success() {
            return Err(InspectionError::Transport(format!(
                "Agent健康检查返回 {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> InspectionResult<AgentReply<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InspectionError::ExecutionTimeout
                } else {
                    InspectionError::Transport(format!("请求 {path} 失败: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(InspectionError::Transport(format!(
                "请求 {path} 返回 {status}"
            )));
        }
        response
            .json::<AgentReply<T>>()
            .await
            .map_err(|e| InspectionError::Transport(format!("解析 {path} 响应失败: {e}")))
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn transfer_script(&self, bundle: &ScriptBundle) -> InspectionResult<()> {
        let body = TransferBody {
            file_name: &bundle.file_name,
            file_data: STANDARD.encode(&bundle.data),
        };
        self.post::<_, serde_json::Value>("/api/v1/scripts/transfer", &body)
            .await?
            .into_output("TransferScript")?;
        Ok(())
    }

    async fn execute(&self, request: &ExecuteRequest) -> InspectionResult<CheckResult> {
        let body = ExecuteBody {
            job_id: &request.job_id,
            process_nodes: &request.process_nodes,
            base_node: request.base_node.as_ref(),
            script_name: &request.script_name,
            params: &request.params,
            cluster_name: &request.cluster_name,
        };
        self.post::<_, CheckResult>("/api/v1/execute", &body)
            .await?
            .into_output("Execute")?
            .ok_or_else(|| InspectionError::Transport("Execute 未返回巡检结果".to_string()))
    }

    async fn get_resource(&self, ip_list: &[String]) -> InspectionResult<HashMap<String, CardType>> {
        let output = self
            .post::<_, ResourceOutput>("/api/v1/resource", &ResourceBody { ip_list })
            .await?
            .into_output("GetResource")?;

        Ok(output
            .map(|o| o.node)
            .unwrap_or_default()
            .into_iter()
            .map(|(node, code)| (node, CardType::from_code(code)))
            .collect())
    }
}
