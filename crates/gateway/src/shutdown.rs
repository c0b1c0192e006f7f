//! Shutdown signal handling.
//!
//! The lifecycle controller only awaits a future. [`ShutdownSignal`] is the
//! bridge that turns SIGTERM/SIGINT (or a manual [`ShutdownSignal::trigger`])
//! into that future.

use std::{future::Future, io};

use tokio_util::sync::CancellationToken;
use tracing::info;

/// A cloneable, one-shot shutdown notification.
///
/// Every clone observes the same trigger. Triggering more than once is a no-op.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal triggered by the first SIGTERM or SIGINT (Ctrl+C elsewhere).
    ///
    /// Handlers are installed before this returns, so a signal delivered right
    /// after the call is not lost. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS signal handlers cannot be registered.
    pub fn with_os_signals() -> io::Result<Self> {
        let signal = Self::new();
        let trigger = signal.clone();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal as unix_signal, SignalKind};

            let mut term = unix_signal(SignalKind::terminate())?;
            let mut int = unix_signal(SignalKind::interrupt())?;
            tokio::spawn(async move {
                tokio::select! {
                    _ = term.recv() => info!(signal = "SIGTERM", "termination signal received"),
                    _ = int.recv() => info!(signal = "SIGINT", "interrupt signal received"),
                }
                trigger.trigger();
            });
        }

        #[cfg(not(unix))]
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!(signal = "ctrl_c", "interrupt signal received");
                trigger.trigger();
            }
        });

        Ok(signal)
    }

    /// Trigger shutdown. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that completes once shutdown is triggered, immediately if it
    /// already was.
    pub fn recv(&self) -> impl Future<Output = ()> + Send + 'static {
        let token = self.token.clone();
        async move { token.cancelled().await }
    }
}
