use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Agent 返回的单节点组健康码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthCode {
    Healthy,
    Critical,
    Unhealthy,
    Unknown,
    Timeout,
}

impl HealthCode {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(HealthCode::Healthy),
            1 => Some(HealthCode::Critical),
            2 => Some(HealthCode::Unhealthy),
            3 => Some(HealthCode::Unknown),
            4 => Some(HealthCode::Timeout),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            HealthCode::Healthy => 0,
            HealthCode::Critical => 1,
            HealthCode::Unhealthy => 2,
            HealthCode::Unknown => 3,
            HealthCode::Timeout => 4,
        }
    }

    /// 告警类别名称，健康节点没有
    pub fn alert_label(&self) -> Option<&'static str> {
        match self {
            HealthCode::Healthy => None,
            HealthCode::Critical => Some("故障"),
            HealthCode::Unhealthy => Some("不健康"),
            HealthCode::Unknown => Some("未知"),
            HealthCode::Timeout => Some("超时"),
        }
    }

    pub fn alert_level(&self) -> Option<&'static str> {
        match self {
            HealthCode::Healthy => None,
            HealthCode::Critical => Some("critical"),
            HealthCode::Unhealthy => Some("serious"),
            HealthCode::Unknown | HealthCode::Timeout => Some("unknown"),
        }
    }

    /// 需要注册告警规则的类别
    pub fn alerting() -> [HealthCode; 4] {
        [
            HealthCode::Critical,
            HealthCode::Unhealthy,
            HealthCode::Unknown,
            HealthCode::Timeout,
        ]
    }
}

/// Agent 对一个脚本的分类结果
///
/// key 形如 `group(node-a)(node-b)`，括号内为节点标识。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub logs_result: HashMap<String, String>,
    pub case_result: HashMap<String, i32>,
}

/// 一个作业要巡检的节点，IP -> 主机名
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobNodesInfo {
    pub process_nodes: HashMap<String, String>,
    pub base_node: Option<HashMap<String, String>>,
}

impl JobNodesInfo {
    pub fn node_count(&self) -> u32 {
        u32::try_from(self.process_nodes.len()).unwrap_or(u32::MAX)
    }
}

/// Agent 上报的加速卡类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    Unidentified,
    Z1120,
    Z3200,
    Z2120,
    V5000,
    U2000,
    W64,
    X10000,
}

impl CardType {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => CardType::Z1120,
            2 => CardType::Z3200,
            3 => CardType::Z2120,
            4 => CardType::V5000,
            5 => CardType::U2000,
            6 => CardType::W64,
            7 => CardType::X10000,
            _ => CardType::Unidentified,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CardType::Unidentified => "Unidentified",
            CardType::Z1120 => "Z1120",
            CardType::Z3200 => "Z3200",
            CardType::Z2120 => "Z2120",
            CardType::V5000 => "V5000",
            CardType::U2000 => "U2000",
            CardType::W64 => "W64",
            CardType::X10000 => "X10000",
        }
    }
}

/// 资源名对应的设备插件资源名，未知资源或无设备插件时为 `None`
pub fn device_resource_name(resource: &str) -> Option<&'static str> {
    match resource {
        "Z1120" | "Z3200" | "Z2120" => Some("nvidia.com/gpu"),
        "V5000" => Some("kunlunxin.com/xpu"),
        "W64" => Some("metax-tech.com/gpu"),
        "X10000" => Some("mthreads.com/gpu"),
        _ => None,
    }
}

/// 集群节点状态分布，值为节点IP
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatusSummary {
    pub master: Vec<String>,
    pub ready: Vec<String>,
    pub not_ready: Vec<String>,
    pub unschedulable: Vec<String>,
    pub allocated: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_codes() {
        for code in 0..=4 {
            assert_eq!(HealthCode::from_code(code).unwrap().code(), code);
        }
        assert!(HealthCode::from_code(5).is_none());
        assert!(HealthCode::Healthy.alert_label().is_none());
        assert_eq!(HealthCode::Critical.alert_level(), Some("critical"));
        assert_eq!(HealthCode::Unhealthy.alert_label(), Some("不健康"));
        assert_eq!(HealthCode::Timeout.alert_level(), Some("unknown"));
    }

    #[test]
    fn test_card_types() {
        assert_eq!(CardType::from_code(4), CardType::V5000);
        assert_eq!(CardType::from_code(42), CardType::Unidentified);
        assert_eq!(CardType::X10000.name(), "X10000");
    }

    #[test]
    fn test_device_resource_name() {
        assert_eq!(device_resource_name("Z3200"), Some("nvidia.com/gpu"));
        assert_eq!(device_resource_name("V5000"), Some("kunlunxin.com/xpu"));
        assert_eq!(device_resource_name("U2000"), None);
        assert_eq!(device_resource_name("unknown"), None);
    }
}
