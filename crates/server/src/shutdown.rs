//! # 停止処理
//!
//! 停止シグナルを受けたら新規接続の受付を止め、処理中のリクエストを
//! `drain_timeout` まで待つ。期限を過ぎた接続は打ち切る。

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::bail;
use axum::Router;
use tokio::net::TcpListener;

/// シグナルを受けるまでサーバーを動かし、上限付きで停止する。
pub async fn serve(
    listener: TcpListener,
    app: Router,
    signal: impl Future<Output = ()> + Send + 'static,
    drain_timeout: Duration,
) -> anyhow::Result<()> {
    let (draining_tx, draining_rx) = tokio::sync::oneshot::channel::<()>();
    let graceful = async move {
        signal.await;
        let _ = draining_tx.send(());
    };

    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(graceful)
        .await
    });

    tokio::select! {
        joined = &mut server => {
            joined??;
            return Ok(());
        }
        _ = draining_rx => {}
    }

    match tokio::time::timeout(drain_timeout, &mut server).await {
        Ok(joined) => {
            joined??;
            Ok(())
        }
        Err(_) => {
            server.abort();
            bail!("処理中のリクエストが{drain_timeout:?}以内に完了しなかったため打ち切りました")
        }
    }
}

/// SIGINT（Ctrl+C）またはSIGTERMを待つ。
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+Cハンドラの登録に失敗しました");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERMハンドラの登録に失敗しました");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("停止シグナルを受信しました。処理中のリクエストを完了させます");
}
