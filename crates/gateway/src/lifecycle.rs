//! Lifecycle controller: start the server, wait for shutdown, stop it.
//!
//! ```text
//! Idle → Starting → Running → Stopping → Stopped
//!            └──────────┬──────────┘
//!                       ▼
//!                     Failed
//! ```
//!
//! `start` and `stop` each run at most once; a controller is never restarted.

use std::future::Future;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info};

use crate::server::ServerError;

/// The outermost layer of a pipeline: something that can serve and stop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Server: Send {
    /// Open the listener and begin serving in the background.
    async fn start(&mut self) -> Result<(), ServerError>;

    /// Release the listener; in-flight requests may be abandoned.
    async fn stop(&mut self) -> Result<(), ServerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// Errors produced by the lifecycle controller.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("server failed to start: {0}")]
    Start(#[source] ServerError),

    #[error("server failed to stop: {0}")]
    Stop(#[source] ServerError),

    #[error("invalid lifecycle transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
}

/// Owns one [`Server`] and drives it through its states.
pub struct Lifecycle<S> {
    server: S,
    state: watch::Sender<LifecycleState>,
}

impl<S: Server> Lifecycle<S> {
    pub fn new(server: S) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self { server, state }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Watch state changes, e.g. to learn when the server is `Running`.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    fn transition(&self, expected: LifecycleState, to: LifecycleState) -> Result<(), LifecycleError> {
        let from = self.state();
        if from != expected {
            return Err(LifecycleError::InvalidTransition { from, to });
        }
        self.state.send_replace(to);
        Ok(())
    }

    /// `Idle → Starting → Running`, or `Failed` if the server cannot start.
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        self.transition(LifecycleState::Idle, LifecycleState::Starting)?;
        match self.server.start().await {
            Ok(()) => {
                self.state.send_replace(LifecycleState::Running);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "server failed to start");
                self.state.send_replace(LifecycleState::Failed);
                Err(LifecycleError::Start(e))
            }
        }
    }

    /// `Running → Stopping → Stopped`, or `Failed` if the server cannot stop.
    pub async fn stop(&mut self) -> Result<(), LifecycleError> {
        self.transition(LifecycleState::Running, LifecycleState::Stopping)?;
        match self.server.stop().await {
            Ok(()) => {
                self.state.send_replace(LifecycleState::Stopped);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "server failed to stop");
                self.state.send_replace(LifecycleState::Failed);
                Err(LifecycleError::Stop(e))
            }
        }
    }

    /// Start, wait for `shutdown`, stop.
    ///
    /// `shutdown` is only awaited once the server is running; a start failure
    /// returns immediately.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        info!("server running; waiting for shutdown signal");
        shutdown.await;
        info!("shutdown signal received");
        self.stop().await
    }
}
