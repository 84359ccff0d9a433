use std::str::FromStr;

use chrono::{DateTime, Duration, Local};
use cron::Schedule;
use inspection_core::{InspectionError, InspectionResult};
use inspection_domain::{CronRequest, CronSpec, Frequency, JobMode};

/// 周几的取值，依次对应 1..7
pub const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// `cron` crate 使用的星期名称，与 [`WEEKDAYS`] 一一对应
const CRON_WEEKDAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

fn validation(message: impl Into<String>) -> InspectionError {
    InspectionError::Validation(message.into())
}

fn parse_field(value: Option<&str>, field: &str) -> InspectionResult<Option<u32>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<u32>()
            .map(Some)
            .map_err(|_| validation(format!("{field} 必须是整数: {v}"))),
    }
}

/// 周几名称转为 1..7
pub fn weekday_number(day: &str) -> Option<u32> {
    WEEKDAYS
        .iter()
        .position(|d| *d == day)
        .map(|i| i as u32 + 1)
}

/// 根据定时请求生成五段式cron表达式
///
/// `now_minute` 仅用于 `minutely`：从下一分钟开始，按 `minute` 为间隔触发。
pub fn build_cron_spec(request: &CronRequest, now_minute: u32) -> InspectionResult<CronSpec> {
    let mode: JobMode = request.mode.parse()?;
    if mode != JobMode::Regular {
        return Err(validation("只有 regular 模式的模板可以创建定时任务"));
    }
    let frequency: Frequency = request.frequency.trim().parse()?;

    let minute = parse_field(request.minute.as_deref(), "minute")?
        .filter(|m| *m <= 59)
        .ok_or_else(|| validation("minute 必须是 0 到 59 之间的整数"))?;

    let hour = if frequency.needs_hour() {
        Some(
            parse_field(request.hour.as_deref(), "hour")?
                .filter(|h| *h <= 23)
                .ok_or_else(|| validation("hour 必须是 0 到 23 之间的整数"))?,
        )
    } else {
        None
    };

    let mut day_of_week = None;
    let mut day_of_month = None;
    let cron_expr = match (frequency, hour) {
        (Frequency::Minutely, _) => {
            if minute == 0 {
                return Err(validation("minutely 的间隔必须在 1 到 59 之间"));
            }
            format!("{}/{} * * * *", (now_minute + 1) % 60, minute)
        }
        (Frequency::Hourly, _) => format!("{minute} * * * *"),
        (Frequency::Daily, Some(h)) => format!("{minute} {h} * * *"),
        (Frequency::Weekly, Some(h)) => {
            let day = request
                .day_of_week
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .ok_or_else(|| validation("weekly 频率缺少 dayOfWeek"))?;
            let number = weekday_number(day).ok_or_else(|| {
                validation(format!(
                    "无效的 dayOfWeek: {day}，必须是 {} 之一",
                    WEEKDAYS.join(", ")
                ))
            })?;
            day_of_week = Some(day.to_string());
            format!("{minute} {h} * * {number}")
        }
        (Frequency::Monthly, Some(h)) => {
            let day = parse_field(request.day_of_month.as_deref(), "dayOfMonth")?
                .ok_or_else(|| validation("monthly 频率缺少 dayOfMonth"))?;
            if !(1..=31).contains(&day) {
                return Err(validation("dayOfMonth 必须是 1 到 31 之间的整数"));
            }
            day_of_month = Some(day);
            format!("{minute} {h} {day} * *")
        }
        (_, None) => return Err(validation("缺少 hour")),
    };

    Ok(CronSpec {
        frequency,
        hour,
        minute,
        day_of_week,
        day_of_month,
        cron_expr,
        job_name: request.job_name.clone(),
        ip_list: request
            .ip_list
            .iter()
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty())
            .collect(),
        base_ip: request.base_ip.clone().filter(|ip| !ip.is_empty()),
    })
}

/// 五段式表达式转为 `cron` crate 的六段式：补秒字段，星期数字换成名称
pub fn to_schedule_expr(expr: &str) -> InspectionResult<String> {
    let invalid = |message: &str| InspectionError::InvalidCron {
        expr: expr.to_string(),
        message: message.to_string(),
    };
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(invalid("需要五个字段"));
    }

    let weekday = match fields[4].parse::<usize>() {
        Ok(n) if (1..=7).contains(&n) => CRON_WEEKDAY_NAMES[n - 1].to_string(),
        Ok(_) => return Err(invalid("星期必须在 1 到 7 之间")),
        Err(_) => fields[4].to_string(),
    };

    Ok(format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], weekday
    ))
}

/// CRON表达式解析和调度工具
pub struct CronScheduler {
    schedule: Schedule,
}

impl CronScheduler {
    /// 由五段式表达式创建
    pub fn new(cron_expr: &str) -> InspectionResult<Self> {
        let converted = to_schedule_expr(cron_expr)?;
        let schedule = Schedule::from_str(&converted).map_err(|e| InspectionError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self { schedule })
    }

    /// 验证CRON表达式是否有效
    pub fn validate_cron_expression(cron_expr: &str) -> InspectionResult<()> {
        Self::new(cron_expr).map(|_| ())
    }

    /// 获取下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Local>) -> Option<DateTime<Local>> {
        self.schedule.after(&from).next()
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Local>, count: usize) -> Vec<DateTime<Local>> {
        self.schedule.after(&from).take(count).collect()
    }

    /// 计算下次执行时间距离现在的时长
    pub fn time_until_next_execution(&self, now: DateTime<Local>) -> Option<Duration> {
        self.schedule.after(&now).next().map(|next| next - now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_schedule_expr() {
        assert_eq!(to_schedule_expr("30 9 * * *").unwrap(), "0 30 9 * * *");
        assert_eq!(to_schedule_expr("0 9 * * 1").unwrap(), "0 0 9 * * Mon");
        assert_eq!(to_schedule_expr("0 9 * * 7").unwrap(), "0 0 9 * * Sun");
        assert!(to_schedule_expr("0 9 * *").is_err());
        assert!(to_schedule_expr("0 9 * * 8").is_err());
    }

    #[test]
    fn test_weekday_number() {
        assert_eq!(weekday_number("mon"), Some(1));
        assert_eq!(weekday_number("sun"), Some(7));
        assert_eq!(weekday_number("Mon"), None);
        assert_eq!(weekday_number("xyz"), None);
    }
}
