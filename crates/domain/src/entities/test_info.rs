use std::fmt;
use std::str::FromStr;

use inspection_core::InspectionError;
use serde::{Deserialize, Serialize};

/// 单个脚本的巡检结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestResult {
    /// 没有故障节点
    #[serde(rename = "passed")]
    Passed,
    /// 存在故障节点
    #[serde(rename = "not passed")]
    NotPassed,
    /// 没有拿到分类结果（传输或执行失败）
    #[serde(rename = "failed")]
    Failed,
}

impl TestResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestResult::Passed => "passed",
            TestResult::NotPassed => "not passed",
            TestResult::Failed => "failed",
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestResult {
    type Err = InspectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(TestResult::Passed),
            "not passed" => Ok(TestResult::NotPassed),
            "failed" => Ok(TestResult::Failed),
            other => Err(InspectionError::Serialization(format!(
                "无效的巡检结论: {other}"
            ))),
        }
    }
}

/// 各健康类别的节点计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCounts {
    pub healthy: u32,
    pub unhealthy: u32,
    pub critical: u32,
    pub unknown: u32,
    pub timeout: u32,
}

impl HealthCounts {
    pub fn total(&self) -> u32 {
        self.healthy + self.unhealthy + self.critical + self.unknown + self.timeout
    }
}

/// 单个脚本在一次作业中的执行记录，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestInfo {
    pub job_id: String,
    pub case_name: String,
    pub healthy_num: u32,
    pub unhealthy_num: u32,
    pub critical_num: u32,
    pub unknown_num: u32,
    pub timeout_num: u32,
    pub total_num: u32,
    /// 秒，保留两位小数
    pub time_cost: f64,
    pub result: TestResult,
}

impl TestInfo {
    /// 由分类计数生成记录，`critical > 0` 时为 `not passed`
    pub fn from_counts(job_id: &str, case_name: &str, counts: HealthCounts, time_cost: f64) -> Self {
        let result = if counts.critical == 0 {
            TestResult::Passed
        } else {
            TestResult::NotPassed
        };
        Self {
            job_id: job_id.to_string(),
            case_name: case_name.to_string(),
            healthy_num: counts.healthy,
            unhealthy_num: counts.unhealthy,
            critical_num: counts.critical,
            unknown_num: counts.unknown,
            timeout_num: counts.timeout,
            total_num: counts.total(),
            time_cost: round_seconds(time_cost),
            result,
        }
    }

    /// 没有分类结果时的全失败记录，全部节点计为未知
    ///
    /// 各分类不全部置零，而是把节点数记到 `unknown_num`，分类之和始终等于 `total_num`。
    pub fn failed(job_id: &str, case_name: &str, node_count: u32, time_cost: f64) -> Self {
        Self {
            job_id: job_id.to_string(),
            case_name: case_name.to_string(),
            healthy_num: 0,
            unhealthy_num: 0,
            critical_num: 0,
            unknown_num: node_count,
            timeout_num: 0,
            total_num: node_count,
            time_cost: round_seconds(time_cost),
            result: TestResult::Failed,
        }
    }

    pub fn counts(&self) -> HealthCounts {
        HealthCounts {
            healthy: self.healthy_num,
            unhealthy: self.unhealthy_num,
            critical: self.critical_num,
            unknown: self.unknown_num,
            timeout: self.timeout_num,
        }
    }
}

pub fn round_seconds(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

/// 作业进度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub finished: usize,
    pub total: usize,
}

impl JobProgress {
    pub fn new(finished: usize, total: usize) -> Self {
        Self {
            finished: finished.min(total),
            total,
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        round_seconds(self.finished as f64 * 100.0 / self.total as f64)
    }
}
