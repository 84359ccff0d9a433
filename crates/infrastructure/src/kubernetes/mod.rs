//! Kubernetes 访问：按集群缓存客户端，节点解析和任务记录

pub mod client_cache;
pub mod node_resolver;
pub mod task_record;

pub use client_cache::KubeClientCache;
pub use node_resolver::KubeNodeResolver;
pub use task_record::KubeTaskRecordClient;

use inspection_core::InspectionError;

pub(crate) fn kube_error(err: kube::Error) -> InspectionError {
    InspectionError::Kubernetes(err.to_string())
}
