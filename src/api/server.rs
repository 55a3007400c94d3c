use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;

use super::types::AppState;

pub async fn serve(port: u16, state: AppState) -> Result<()> {
    let app = super::routes::create_router(state);
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => tracing::warn!("Failed to install signal handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
