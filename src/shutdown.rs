use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// 等待 Ctrl+C 或 SIGTERM，然后取消令牌
pub async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("安装Ctrl+C信号处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("安装SIGTERM信号处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
        _ = token.cancelled() => return,
    }

    token.cancel();
}
