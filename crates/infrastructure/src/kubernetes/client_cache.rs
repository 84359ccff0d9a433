use std::collections::HashMap;
use std::path::PathBuf;

use inspection_core::{ClusterConfig, InspectionError, InspectionResult};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tokio::sync::Mutex;
use tracing::info;

/// 按集群名缓存的 Kubernetes 客户端
///
/// kubeconfig 默认为 `kube_path/<集群名>`，可在 `clusters.<name>.kubeconfig` 覆盖。
pub struct KubeClientCache {
    kube_path: PathBuf,
    overrides: HashMap<String, String>,
    clients: Mutex<HashMap<String, Client>>,
}

impl KubeClientCache {
    pub fn new(kube_path: impl Into<PathBuf>, clusters: &HashMap<String, ClusterConfig>) -> Self {
        let overrides = clusters
            .iter()
            .filter_map(|(name, c)| c.kubeconfig.clone().map(|k| (name.clone(), k)))
            .collect();
        Self {
            kube_path: kube_path.into(),
            overrides,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn kubeconfig_path(&self, cluster: &str) -> PathBuf {
        let file = self
            .overrides
            .get(cluster)
            .map(String::as_str)
            .unwrap_or(cluster);
        self.kube_path.join(file)
    }

    pub async fn client(&self, cluster: &str) -> InspectionResult<Client> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(cluster) {
            return Ok(client.clone());
        }

        let path = self.kubeconfig_path(cluster);
        let kubeconfig = Kubeconfig::read_from(&path).map_err(|e| {
            InspectionError::Kubernetes(format!("读取kubeconfig {} 失败: {e}", path.display()))
        })?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| InspectionError::Kubernetes(format!("解析kubeconfig失败: {e}")))?;
        let client = Client::try_from(config).map_err(super::kube_error)?;

        info!("已创建集群 {} 的Kubernetes客户端", cluster);
        clients.insert(cluster.to_string(), client.clone());
        Ok(client)
    }

    /// 客户端失效时移除缓存
    pub async fn invalidate(&self, cluster: &str) {
        self.clients.lock().await.remove(cluster);
    }
}
