use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use inspection_core::{InspectionError, InspectionResult};
use serde::{Deserialize, Serialize};

use super::job::{JobMode, JobRequest};

/// 模板中单个脚本及其参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParam {
    pub script_name: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// 定时频率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Minutely => "minutely",
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    /// 是否需要小时字段
    pub fn needs_hour(&self) -> bool {
        matches!(
            self,
            Frequency::Daily | Frequency::Weekly | Frequency::Monthly
        )
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = InspectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minutely" => Ok(Frequency::Minutely),
            "hourly" => Ok(Frequency::Hourly),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "" => Err(InspectionError::Validation("缺少定时频率".to_string())),
            other => Err(InspectionError::Validation(format!(
                "不支持的定时频率: {other}"
            ))),
        }
    }
}

/// 模板的定时配置，`cron_expr` 总是由其余字段推导得出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSpec {
    pub frequency: Frequency,
    pub hour: Option<u32>,
    pub minute: u32,
    pub day_of_week: Option<String>,
    pub day_of_month: Option<u32>,
    /// 五段式cron表达式
    pub cron_expr: String,
    pub job_name: String,
    pub ip_list: Vec<String>,
    pub base_ip: Option<String>,
}

/// 创建或修改模板定时任务的请求
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronRequest {
    #[serde(rename = "template")]
    pub template_name: String,
    pub mode: String,
    pub frequency: String,
    pub hour: Option<String>,
    pub minute: Option<String>,
    pub day_of_week: Option<String>,
    pub day_of_month: Option<String>,
    pub job_name: String,
    #[serde(default, rename = "IPList")]
    pub ip_list: Vec<String>,
    #[serde(default, rename = "baseIP")]
    pub base_ip: Option<String>,
}

/// 巡检模板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub template_id: i64,
    pub template_name: String,
    pub cluster_name: String,
    pub description: String,
    pub mode: JobMode,
    pub resource: String,
    pub last_job_id: Option<String>,
    pub last_job_time: Option<DateTime<Utc>>,
    /// 为 `Some` 时定时开关打开
    pub cron: Option<CronSpec>,
    pub create_user: String,
    pub create_time: DateTime<Utc>,
    pub modify_user: Option<String>,
    pub modify_time: Option<DateTime<Utc>>,
}

impl Template {
    pub fn new(
        template_name: &str,
        cluster_name: &str,
        mode: JobMode,
        resource: &str,
        create_user: &str,
    ) -> Self {
        Self {
            template_id: 0,
            template_name: template_name.to_string(),
            cluster_name: cluster_name.to_string(),
            description: String::new(),
            mode,
            resource: resource.to_string(),
            last_job_id: None,
            last_job_time: None,
            cron: None,
            create_user: create_user.to_string(),
            create_time: Utc::now(),
            modify_user: None,
            modify_time: None,
        }
    }

    pub fn cron_enabled(&self) -> bool {
        self.cron.is_some()
    }

    /// 定时作业的提交人：最后修改人，未修改过则为创建人
    pub fn acting_user(&self) -> &str {
        self.modify_user
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.create_user)
    }

    /// 定时触发时生成的作业请求
    pub fn cron_job_request(&self) -> InspectionResult<JobRequest> {
        let cron = self.cron.as_ref().ok_or_else(|| {
            InspectionError::Validation(format!("模板 {} 未开启定时任务", self.template_name))
        })?;
        Ok(JobRequest {
            job_name: cron.job_name.clone(),
            template_name: self.template_name.clone(),
            is_cron: true,
            mode: self.mode.as_str().to_string(),
            resource: self.resource.clone(),
            ip_list: cron.ip_list.clone(),
            base_ip: cron.base_ip.clone(),
        })
    }
}

/// 模板基本信息修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateBasicInfo {
    pub mode: JobMode,
    pub resource: String,
    pub description: String,
    pub modify_user: String,
    pub scripts: Vec<ScriptParam>,
}

/// 巡检脚本元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub case_id: i64,
    pub name: String,
    pub ch_name: String,
    pub cluster: String,
    pub detail: String,
    pub domain: String,
    pub mode: JobMode,
    pub category: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cron_spec() -> CronSpec {
        CronSpec {
            frequency: Frequency::Daily,
            hour: Some(9),
            minute: 30,
            day_of_week: None,
            day_of_month: None,
            cron_expr: "30 9 * * *".to_string(),
            job_name: "daily-check".to_string(),
            ip_list: vec!["10.0.0.1".to_string()],
            base_ip: None,
        }
    }

    #[test]
    fn test_acting_user_prefers_modifier() {
        let mut template = Template::new("t1", "c1", JobMode::Regular, "Z1120", "alice");
        assert_eq!(template.acting_user(), "alice");
        template.modify_user = Some(String::new());
        assert_eq!(template.acting_user(), "alice");
        template.modify_user = Some("bob".to_string());
        assert_eq!(template.acting_user(), "bob");
    }

    #[test]
    fn test_cron_job_request() {
        let mut template = Template::new("t1", "c1", JobMode::Regular, "Z1120", "alice");
        assert!(template.cron_job_request().is_err());

        template.cron = Some(cron_spec());
        let request = template.cron_job_request().unwrap();
        assert!(request.is_cron);
        assert_eq!(request.job_name, "daily-check");
        assert_eq!(request.template_name, "t1");
        assert_eq!(request.mode, "regular");
        assert_eq!(request.ip_list, vec!["10.0.0.1".to_string()]);
    }

    #[test]
    fn test_frequency_parse() {
        assert_eq!("weekly".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert!("".parse::<Frequency>().is_err());
        assert!("yearly".parse::<Frequency>().is_err());
        assert!(Frequency::Monthly.needs_hour());
        assert!(!Frequency::Hourly.needs_hour());
    }
}
