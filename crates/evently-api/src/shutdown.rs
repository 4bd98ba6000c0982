//! Graceful shutdown handling
//!
//! SIGINT/SIGTERM trigger a [`ShutdownSignal`]. The server then stops
//! accepting connections and in-flight requests get a bounded grace period
//! before the server task is aborted.

use axum::Router;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Shutdown signal that can be cloned and shared across tasks
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Trigger shutdown; later calls are no-ops
    pub fn trigger(&self) {
        if !self.sender.send_replace(true) {
            tracing::info!("Shutdown signal triggered");
        }
    }

    /// Future that resolves once shutdown is triggered, including when it
    /// already was
    pub fn notified(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async move {
            let _ = receiver.wait_for(|triggered| *triggered).await;
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Listen for SIGTERM and SIGINT and trigger the shutdown signal
pub async fn listen_for_shutdown_signals(shutdown: ShutdownSignal) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    shutdown.trigger();
}

/// Serve `app` until shutdown, then drain in-flight requests for at most
/// `grace`.
pub async fn serve_with_shutdown(
    listener: TcpListener,
    app: Router,
    shutdown: ShutdownSignal,
    grace: Duration,
) -> anyhow::Result<()> {
    let stop = shutdown.notified();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app).with_graceful_shutdown(stop).await
    });

    let deadline = async {
        shutdown.notified().await;
        tracing::info!(grace_secs = grace.as_secs(), "Draining in-flight requests");
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        joined = &mut server => {
            joined??;
            tracing::info!("Server stopped gracefully");
        }
        _ = deadline => {
            tracing::warn!(grace_secs = grace.as_secs(), "Grace period elapsed, aborting open connections");
            server.abort();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notified_after_trigger() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());

        let waiter = tokio::spawn(signal.notified());
        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_notified_when_already_triggered() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), signal.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_serve_stops_on_signal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let signal = ShutdownSignal::new();
        let server = tokio::spawn(serve_with_shutdown(
            listener,
            Router::new(),
            signal.clone(),
            Duration::from_secs(5),
        ));

        signal.trigger();
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
