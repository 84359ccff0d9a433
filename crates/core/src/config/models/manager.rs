use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 作业提交方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    /// 进程内直接入队
    #[default]
    Direct,
    /// 创建集群任务记录，由监听器入队
    TaskRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub submission_mode: SubmissionMode,
    /// 脚本源码根目录，每个脚本一个子目录
    pub script_path: PathBuf,
    /// 脚本原始日志目录
    pub log_path: PathBuf,
    /// kubeconfig 目录，每个集群一个文件
    pub kube_path: PathBuf,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            submission_mode: SubmissionMode::Direct,
            script_path: PathBuf::from("scripts"),
            log_path: PathBuf::from("logs"),
            kube_path: PathBuf::from("kube"),
        }
    }
}

impl ManagerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.script_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("脚本目录不能为空"));
        }

        if self.log_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("日志目录不能为空"));
        }

        if self.kube_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("kubeconfig目录不能为空"));
        }

        Ok(())
    }
}
