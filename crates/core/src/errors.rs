use thiserror::Error;

/// 巡检系统错误类型定义
#[derive(Debug, Error)]
pub enum InspectionError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("作业未找到: {id}")]
    JobNotFound { id: String },

    #[error("模板未找到: {name} (集群: {cluster})")]
    TemplateNotFound { name: String, cluster: String },

    #[error("脚本未找到: {0}")]
    ScriptNotFound(String),

    #[error("日志不存在: 作业 {job_id} 脚本 {script}")]
    LogNotFound { job_id: String, script: String },

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("节点解析失败: {0}")]
    NodeResolution(String),

    #[error("集群 {cluster} 的Agent地址不可用")]
    AgentUnavailable { cluster: String },

    #[error("RPC传输错误: {0}")]
    Transport(String),

    #[error("脚本执行超时")]
    ExecutionTimeout,

    #[error("Kubernetes错误: {0}")]
    Kubernetes(String),

    #[error("无效的作业状态转换: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl InspectionError {
    /// 同步拒绝类错误，不会进入队列
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            InspectionError::Validation(_) | InspectionError::InvalidCron { .. }
        )
    }

    /// 单个脚本范围内的传输类错误
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            InspectionError::Transport(_) | InspectionError::ExecutionTimeout
        )
    }
}

impl From<serde_json::Error> for InspectionError {
    fn from(err: serde_json::Error) -> Self {
        InspectionError::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type InspectionResult<T> = std::result::Result<T, InspectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(InspectionError::Validation("x".into()).is_validation());
        assert!(InspectionError::InvalidCron {
            expr: "x".into(),
            message: "y".into()
        }
        .is_validation());
        assert!(InspectionError::ExecutionTimeout.is_transport());
        assert!(InspectionError::Transport("reset".into()).is_transport());
        assert!(!InspectionError::NodeResolution("down".into()).is_transport());
    }

    #[test]
    fn test_error_display() {
        let err = InspectionError::AgentUnavailable {
            cluster: "c1".to_string(),
        };
        assert!(err.to_string().contains("c1"));
    }
}
