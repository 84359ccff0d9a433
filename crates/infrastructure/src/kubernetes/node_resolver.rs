//! 基于 Kubernetes 节点列表和 Agent 资源查询的节点解析
//!
//! 流程: 列出非 master 节点取 InternalIP，deep 模式下把已被业务 Pod 占用
//! 设备的节点主机名加 `-skip` 后缀，再通过 Agent 查询加速卡类型，只保留卡型
//! 与资源一致的节点，最后按指定IP过滤并查找基准节点。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use inspection_core::{InspectionError, InspectionResult};
use inspection_domain::{
    device_resource_name, AgentConnector, CardType, JobMode, JobNodesInfo, NodeResolver,
    NodeStatusSummary,
};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, ListParams};
use tracing::{debug, instrument, warn};

use super::{kube_error, KubeClientCache};

const MASTER_LABELS: [&str; 2] = [
    "node-role.kubernetes.io/control-plane",
    "node-role.kubernetes.io/master",
];

/// 已分配节点的主机名后缀
pub const SKIP_SUFFIX: &str = "-skip";

pub fn is_master(node: &Node) -> bool {
    node.metadata
        .labels
        .as_ref()
        .is_some_and(|labels| MASTER_LABELS.iter().any(|l| labels.contains_key(*l)))
}

pub fn node_name(node: &Node) -> String {
    node.metadata.name.clone().unwrap_or_default()
}

pub fn internal_ip(node: &Node) -> Option<String> {
    node.status
        .as_ref()?
        .addresses
        .as_ref()?
        .iter()
        .find(|a| a.type_ == "InternalIP")
        .map(|a| a.address.clone())
}

pub fn is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

pub fn is_unschedulable(node: &Node) -> bool {
    let Some(spec) = node.spec.as_ref() else {
        return false;
    };
    spec.unschedulable.unwrap_or(false)
        || spec.taints.as_ref().is_some_and(|taints| {
            taints
                .iter()
                .any(|t| t.effect == "NoSchedule" || t.effect == "NoExecute")
        })
}

/// 运行中且申请了指定设备的 Pod 所在节点名
pub fn allocated_nodes(pods: &[Pod], device: &str) -> HashSet<String> {
    pods.iter()
        .filter(|pod| {
            pod.status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                .is_some_and(|phase| phase == "Running")
        })
        .filter_map(|pod| {
            let spec = pod.spec.as_ref()?;
            let requests_device = spec.containers.iter().any(|c| {
                c.resources.as_ref().is_some_and(|r| {
                    r.requests.as_ref().is_some_and(|m| m.contains_key(device))
                        || r.limits.as_ref().is_some_and(|m| m.contains_key(device))
                })
            });
            if requests_device {
                spec.node_name.clone()
            } else {
                None
            }
        })
        .collect()
}

/// 非 master 节点的 IP -> 主机名，已分配节点带 `-skip` 后缀
pub fn worker_node_map(nodes: &[Node], allocated: &HashSet<String>) -> HashMap<String, String> {
    nodes
        .iter()
        .filter(|node| !is_master(node))
        .filter_map(|node| {
            let ip = internal_ip(node)?;
            let name = node_name(node);
            let host = if allocated.contains(&name) {
                format!("{name}{SKIP_SUFFIX}")
            } else {
                name
            };
            Some((ip, host))
        })
        .collect()
}

/// 按 Agent 上报的卡型和指定IP筛选待巡检节点
///
/// 卡型结果可能以IP或主机名为键。
pub fn select_process_nodes(
    all: &HashMap<String, String>,
    cards: &HashMap<String, CardType>,
    resource: &str,
    ip_list: &[String],
) -> HashMap<String, String> {
    all.iter()
        .filter(|(ip, host)| {
            let base_host = host.trim_end_matches(SKIP_SUFFIX);
            cards
                .get(*ip)
                .or_else(|| cards.get(base_host))
                .is_some_and(|card| card.name() == resource)
        })
        .filter(|(ip, _)| ip_list.is_empty() || ip_list.contains(*ip))
        .map(|(ip, host)| (ip.clone(), host.clone()))
        .collect()
}

pub fn summarize_nodes(nodes: &[Node], allocated: &HashSet<String>) -> NodeStatusSummary {
    let mut summary = NodeStatusSummary::default();
    for node in nodes {
        let Some(ip) = internal_ip(node) else {
            continue;
        };
        if is_master(node) {
            summary.master.push(ip);
            continue;
        }
        if is_ready(node) {
            summary.ready.push(ip.clone());
        } else {
            summary.not_ready.push(ip.clone());
        }
        if is_unschedulable(node) {
            summary.unschedulable.push(ip.clone());
        }
        if allocated.contains(&node_name(node)) {
            summary.allocated.push(ip);
        }
    }
    for list in [
        &mut summary.master,
        &mut summary.ready,
        &mut summary.not_ready,
        &mut summary.unschedulable,
        &mut summary.allocated,
    ] {
        list.sort();
    }
    summary
}

pub struct KubeNodeResolver {
    clients: Arc<KubeClientCache>,
    connector: Arc<dyn AgentConnector>,
}

impl KubeNodeResolver {
    pub fn new(clients: Arc<KubeClientCache>, connector: Arc<dyn AgentConnector>) -> Self {
        Self { clients, connector }
    }

    async fn list_nodes(&self, cluster: &str) -> InspectionResult<Vec<Node>> {
        let client = self.clients.client(cluster).await?;
        let nodes = Api::<Node>::all(client)
            .list(&ListParams::default())
            .await
            .map_err(kube_error)?;
        Ok(nodes.items)
    }

    async fn allocated(&self, cluster: &str, resource: &str) -> InspectionResult<HashSet<String>> {
        let Some(device) = device_resource_name(resource) else {
            return Ok(HashSet::new());
        };
        let client = self.clients.client(cluster).await?;
        let pods = Api::<Pod>::all(client)
            .list(&ListParams::default().fields("status.phase=Running"))
            .await
            .map_err(kube_error)?;
        Ok(allocated_nodes(&pods.items, device))
    }

    /// 集群节点状态分布
    pub async fn node_status(
        &self,
        cluster: &str,
        resource: &str,
    ) -> InspectionResult<NodeStatusSummary> {
        let nodes = self.list_nodes(cluster).await?;
        let allocated = self.allocated(cluster, resource).await?;
        Ok(summarize_nodes(&nodes, &allocated))
    }
}

#[async_trait]
impl NodeResolver for KubeNodeResolver {
    #[instrument(skip(self, ip_list))]
    async fn resolve(
        &self,
        cluster: &str,
        mode: JobMode,
        resource: &str,
        ip_list: &[String],
        base_ip: Option<&str>,
    ) -> InspectionResult<JobNodesInfo> {
        let nodes = self.list_nodes(cluster).await?;
        let allocated = match mode {
            JobMode::Deep => self.allocated(cluster, resource).await?,
            JobMode::Regular => HashSet::new(),
        };
        let all = worker_node_map(&nodes, &allocated);

        let address = self.connector.resolve_address(cluster)?;
        let agent = self.connector.connect(&address).await?;
        let ips: Vec<String> = all.keys().cloned().collect();
        let cards = agent.get_resource(&ips).await?;

        let process_nodes = select_process_nodes(&all, &cards, resource, ip_list);
        if process_nodes.is_empty() {
            return Err(InspectionError::NodeResolution(format!(
                "集群 {cluster} 中没有资源为 {resource} 的可巡检节点"
            )));
        }

        let base_node = base_ip.filter(|ip| !ip.is_empty()).and_then(|ip| {
            match all.get(ip) {
                Some(host) => Some(HashMap::from([(ip.to_string(), host.clone())])),
                None => {
                    warn!("基准节点 {} 不在集群 {} 中", ip, cluster);
                    None
                }
            }
        });

        debug!(
            "集群 {} 解析到 {} 个巡检节点, 已分配 {} 个",
            cluster,
            process_nodes.len(),
            allocated.len()
        );
        Ok(JobNodesInfo {
            process_nodes,
            base_node,
        })
    }
}
