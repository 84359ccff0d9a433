use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 每个集群的作业队列配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 队列容量，满时入队阻塞
    pub capacity: usize,
    /// 空闲等待周期，超时后继续等待而不是退出
    pub idle_timeout_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            idle_timeout_seconds: 600,
        }
    }
}

impl QueueConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.capacity == 0 {
            return Err(anyhow::anyhow!("队列容量必须大于0"));
        }

        if self.idle_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("队列空闲周期必须大于0"));
        }

        Ok(())
    }
}

/// Agent RPC 超时配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub connect_timeout_seconds: u64,
    pub execute_timeout_seconds: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 30,
            execute_timeout_seconds: 300,
        }
    }
}

impl RpcConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn execute_timeout(&self) -> Duration {
        Duration::from_secs(self.execute_timeout_seconds)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.connect_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("连接超时时间必须大于0"));
        }

        if self.execute_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("执行超时时间必须大于0"));
        }

        Ok(())
    }
}
