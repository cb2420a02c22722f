//! Server lifecycle: signal wiring and bounded graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::health::HealthState;

/// Coordinator for graceful shutdown.
///
/// A broadcast channel whose receivers act as cancellation tokens: the accept
/// loop (and anything else long-running) subscribes, and a single trigger
/// fans out to every subscriber.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire OS interrupt signals (SIGINT, and SIGTERM on unix) to the
/// shutdown coordinator.
pub fn listen_for_interrupt(shutdown: Shutdown) {
    tokio::spawn(async move {
        wait_for_interrupt().await;
        info!("interrupt received, shutting down");
        shutdown.trigger();
    });
}

async fn wait_for_interrupt() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Serving failures.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shutdown deadline exceeded with connections still open")]
    ShutdownTimeout,

    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Serve the router until shutdown.
///
/// Marks the health state ready once the listener is live, and draining when
/// the shutdown signal arrives. After the signal, new connections are no
/// longer accepted and in-flight requests get the grace period to complete;
/// exceeding it is a [`ServeError::ShutdownTimeout`], which the process must
/// treat as fatal rather than hang.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    health: Arc<HealthState>,
    shutdown: Shutdown,
    grace: Duration,
) -> Result<(), ServeError> {
    let addr = listener.local_addr()?;

    let mut signal = shutdown.subscribe();
    let graceful = axum::serve(listener, app.into_make_service()).with_graceful_shutdown(
        async move {
            let _ = signal.recv().await;
        },
    );

    health.mark_ready();
    info!(address = %addr, "server ready");

    let mut server = tokio::spawn(async move { graceful.await });
    let mut draining = shutdown.subscribe();

    tokio::select! {
        result = &mut server => {
            // Listener ended without a shutdown trigger.
            result??;
            Ok(())
        }
        _ = draining.recv() => {
            health.mark_draining();
            info!(grace = ?grace, "draining in-flight requests");
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => {
                    result??;
                    info!("server stopped");
                    Ok(())
                }
                Err(_) => {
                    server.abort();
                    error!(grace = ?grace, "shutdown deadline exceeded");
                    Err(ServeError::ShutdownTimeout)
                }
            }
        }
    }
}
