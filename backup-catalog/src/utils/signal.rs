//! Turns SIGINT/SIGTERM into cancellation of the running catalog or transfer
//! operation.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Spawn a task that cancels `token` on the first SIGINT or SIGTERM.
///
/// The operation holding the token stops between two entries; objects that
/// were already uploaded stay in place.
pub fn cancel_on_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT (Ctrl+C), cancelling"),
            _ = terminate => info!("Received SIGTERM, cancelling"),
            _ = token.cancelled() => return,
        }

        token.cancel();
    })
}
