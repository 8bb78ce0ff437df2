use std::sync::Arc;

use launcher_protocol::Signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Something whose cached state can be dropped on demand.
pub trait Invalidate: Send + Sync {
    fn invalidate(&self);
}

/// Ends the hosting application.
pub trait Terminator: Send + Sync {
    fn terminate(&self) -> anyhow::Result<()>;
}

/// Reacts to provider signals, one at a time, in arrival order.
pub struct NotificationListener {
    cache: Arc<dyn Invalidate>,
    terminator: Arc<dyn Terminator>,
}

impl NotificationListener {
    pub fn new(cache: Arc<dyn Invalidate>, terminator: Arc<dyn Terminator>) -> Self {
        Self { cache, terminator }
    }

    pub fn handle(&self, signal: Signal) {
        match signal {
            // Either kind of change usually precedes a teardown, so both slots go.
            Signal::SessionChanged { .. } => {
                info!("session changed, invalidating cached sessions");
                self.cache.invalidate();
            }
            Signal::ShutdownRequested => {
                info!("application shutdown requested");
                if let Err(e) = self.terminator.terminate() {
                    error!(err = %e, "unable to terminate application");
                }
            }
        }
    }

    pub async fn run(self, mut rx: mpsc::Receiver<Signal>) {
        while let Some(signal) = rx.recv().await {
            self.handle(signal);
        }
        info!("signal channel closed, listener stopping");
    }

    pub fn spawn(self, rx: mpsc::Receiver<Signal>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }
}
