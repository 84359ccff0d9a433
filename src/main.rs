use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use inspection_core::{init_logging, AppConfig, LogFormat};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod app;
mod shutdown;

use app::Application;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("inspection-manager")
        .version(env!("CARGO_PKG_VERSION"))
        .about("集群巡检作业编排服务")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，未指定时按默认路径查找"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .arg(
            Arg::new("check-config")
                .long("check-config")
                .help("只校验配置后退出")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = AppConfig::load(config_path).context("加载配置失败")?;

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.observability.log_format = format.parse::<LogFormat>()?;
    }

    init_logging(
        &config.observability.log_level,
        config.observability.log_format,
    )?;

    if matches.get_flag("check-config") {
        info!("配置校验通过");
        return Ok(());
    }

    info!("启动集群巡检作业编排服务");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    if config.observability.metrics_enabled {
        init_metrics(&config.observability.metrics_bind_address)?;
    }

    let shutdown = CancellationToken::new();
    let app = Application::new(config, shutdown.clone()).await?;
    let signal_handle = tokio::spawn(shutdown::cancel_on_signal(shutdown.clone()));

    let mut app_handle = tokio::spawn(async move { app.run().await });

    tokio::select! {
        result = &mut app_handle => {
            // 服务提前退出时不再等待信号
            shutdown.cancel();
            report(result);
        }
        _ = shutdown.cancelled() => {
            info!("收到关闭信号，开始优雅关闭...");
            match tokio::time::timeout(Duration::from_secs(30), &mut app_handle).await {
                Ok(result) => report(result),
                Err(_) => warn!("服务关闭超时，强制退出"),
            }
        }
    }
    signal_handle.abort();

    info!("集群巡检作业编排服务已退出");
    Ok(())
}

fn report(result: std::result::Result<Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => info!("服务已优雅关闭"),
        Ok(Err(e)) => error!("服务运行失败: {e:#}"),
        Err(e) => error!("服务任务异常退出: {e}"),
    }
}

/// 安装 Prometheus 导出器
fn init_metrics(bind_address: &str) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {bind_address}"))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("安装Prometheus导出器失败")?;
    info!("Prometheus指标导出已启动: {addr}");
    Ok(())
}
