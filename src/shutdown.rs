use tokio::sync::broadcast;
use tracing::{error, info};

#[derive(Clone)]
pub struct ShutdownController {
    tx: broadcast::Sender<()>,
}

impl ShutdownController {
    pub fn new() -> (Self, ShutdownReceiver) {
        let (tx, rx) = broadcast::channel(1);
        (Self { tx }, ShutdownReceiver { rx })
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

pub struct ShutdownReceiver {
    rx: broadcast::Receiver<()>,
}

impl ShutdownReceiver {
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.rx.resubscribe()
    }
}

/// Fires the returned receiver on SIGINT or SIGTERM.
pub fn setup_signal_handlers() -> ShutdownReceiver {
    let (controller, receiver) = ShutdownController::new();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C)");
            }
            _ = terminate => {
                info!("Received SIGTERM");
            }
        }

        controller.shutdown();
    });

    receiver
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_reaches_every_subscriber() {
        let (controller, receiver) = ShutdownController::new();
        let mut first = receiver.subscribe();
        let mut second = receiver.subscribe();

        controller.shutdown();

        tokio::time::timeout(Duration::from_secs(1), first.recv())
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), second.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_subscriber_sees_signal_sent_before_it_waits() {
        let (controller, receiver) = ShutdownController::new();
        let mut rx = receiver.subscribe();
        controller.shutdown();
        assert!(tokio_test::block_on(rx.recv()).is_ok());
    }
}
