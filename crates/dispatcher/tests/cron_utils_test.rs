use chrono::{Datelike, Local, TimeZone, Timelike, Weekday};
use inspection_dispatcher::cron_utils::{build_cron_spec, CronScheduler};
use inspection_domain::{CronRequest, Frequency};

fn request(frequency: &str) -> CronRequest {
    CronRequest {
        template_name: "gpu".to_string(),
        mode: "regular".to_string(),
        frequency: frequency.to_string(),
        job_name: "scheduled".to_string(),
        ..Default::default()
    }
}

fn with_time(mut request: CronRequest, hour: Option<&str>, minute: &str) -> CronRequest {
    request.hour = hour.map(str::to_string);
    request.minute = Some(minute.to_string());
    request
}

#[test]
fn test_daily_expression() {
    let spec = build_cron_spec(&with_time(request("daily"), Some("9"), "30"), 0).unwrap();
    assert_eq!(spec.cron_expr, "30 9 * * *");
    assert_eq!(spec.frequency, Frequency::Daily);
    assert_eq!(spec.hour, Some(9));
}

#[test]
fn test_weekly_expression() {
    let mut req = with_time(request("weekly"), Some("9"), "0");
    req.day_of_week = Some("mon".to_string());
    let spec = build_cron_spec(&req, 0).unwrap();
    assert_eq!(spec.cron_expr, "0 9 * * 1");
    assert_eq!(spec.day_of_week.as_deref(), Some("mon"));

    req.day_of_week = Some("xyz".to_string());
    assert!(build_cron_spec(&req, 0).unwrap_err().is_validation());

    req.day_of_week = None;
    assert!(build_cron_spec(&req, 0).is_err());
}

#[test]
fn test_monthly_expression() {
    let mut req = with_time(request("monthly"), Some("2"), "15");
    req.day_of_month = Some("31".to_string());
    assert_eq!(build_cron_spec(&req, 0).unwrap().cron_expr, "15 2 31 * *");

    req.day_of_month = Some("32".to_string());
    assert!(build_cron_spec(&req, 0).is_err());
    req.day_of_month = Some("0".to_string());
    assert!(build_cron_spec(&req, 0).is_err());
}

#[test]
fn test_hourly_and_minutely_expressions() {
    let spec = build_cron_spec(&with_time(request("hourly"), None, "45"), 0).unwrap();
    assert_eq!(spec.cron_expr, "45 * * * *");
    assert!(spec.hour.is_none());

    // 从下一分钟开始
    let spec = build_cron_spec(&with_time(request("minutely"), None, "5"), 10).unwrap();
    assert_eq!(spec.cron_expr, "11/5 * * * *");
    let spec = build_cron_spec(&with_time(request("minutely"), None, "5"), 59).unwrap();
    assert_eq!(spec.cron_expr, "0/5 * * * *");

    assert!(build_cron_spec(&with_time(request("minutely"), None, "0"), 10).is_err());
}

#[test]
fn test_invalid_requests_are_rejected() {
    let cases = [
        with_time(request("xyz"), Some("9"), "30"),
        with_time(request("daily"), Some("24"), "30"),
        with_time(request("daily"), Some("9"), "60"),
        with_time(request("daily"), None, "30"),
        with_time(request("daily"), Some("9"), "abc"),
        request("hourly"),
    ];
    for case in &cases {
        let err = build_cron_spec(case, 0).unwrap_err();
        assert!(err.is_validation(), "{case:?} -> {err}");
    }

    let mut deep = with_time(request("daily"), Some("9"), "30");
    deep.mode = "deep".to_string();
    assert!(build_cron_spec(&deep, 0).is_err());
}

#[test]
fn test_request_fields_are_carried() {
    let mut req = with_time(request("daily"), Some("1"), "0");
    req.ip_list = vec![" 10.0.0.1 ".to_string(), String::new()];
    req.base_ip = Some(String::new());
    let spec = build_cron_spec(&req, 0).unwrap();
    assert_eq!(spec.ip_list, vec!["10.0.0.1"]);
    assert!(spec.base_ip.is_none());
    assert_eq!(spec.job_name, "scheduled");
}

#[test]
fn test_scheduler_next_execution() {
    let from = Local.with_ymd_and_hms(2026, 3, 4, 8, 0, 0).unwrap();

    let daily = CronScheduler::new("30 9 * * *").unwrap();
    let next = daily.next_execution_time(from).unwrap();
    assert_eq!((next.hour(), next.minute()), (9, 30));
    assert_eq!(next.day(), 4);

    let weekly = CronScheduler::new("0 9 * * 1").unwrap();
    let times = weekly.upcoming_times(from, 2);
    assert_eq!(times.len(), 2);
    assert!(times.iter().all(|t| t.weekday() == Weekday::Mon && t.hour() == 9));
    assert_eq!((times[1] - times[0]).num_days(), 7);

    let until = daily.time_until_next_execution(from).unwrap();
    assert_eq!(until.num_minutes(), 90);
}

#[test]
fn test_scheduler_rejects_garbage() {
    assert!(CronScheduler::validate_cron_expression("xyz").is_err());
    assert!(CronScheduler::validate_cron_expression("61 * * * *").is_err());
    assert!(CronScheduler::validate_cron_expression("15 2 31 * *").is_ok());
    assert!(CronScheduler::validate_cron_expression("11/5 * * * *").is_ok());
}
