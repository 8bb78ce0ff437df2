use launcher_session::Terminator;
use tokio::sync::watch;
use tracing::info;

/// Ends the daemon by flipping its shutdown channel to `true`.
#[derive(Clone, Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn new(tx: watch::Sender<bool>) -> Self {
        Self { tx }
    }
}

impl Terminator for ShutdownTrigger {
    fn terminate(&self) -> anyhow::Result<()> {
        if !self.tx.send_replace(true) {
            info!("shutdown requested by session provider");
        }
        Ok(())
    }
}

/// Resolves once `rx` reads `true`, or its sender is gone.
pub async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn terminate_flips_the_channel() {
        let (tx, rx) = watch::channel(false);
        let trigger = ShutdownTrigger::new(tx);
        let waiter = tokio::spawn(shutdown_requested(rx));

        trigger.terminate().unwrap();
        trigger.terminate().unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn false_value_keeps_waiting() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(shutdown_requested(rx));
        tx.send_replace(false);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        waiter.abort();
    }
}
