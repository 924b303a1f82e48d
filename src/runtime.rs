//! Runtime for executing registration conversations
//!
//! One [`SessionRuntime`] actor per user serializes that user's turns; turns of
//! different users run in parallel. Actors exit when idle and are recreated on
//! the next message.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;

use crate::gateway::Gateway;
use crate::platform::Outbound;
use crate::prompt::Prompts;
use crate::render::NotificationRenderer;
use crate::session::{SessionStore, StoreError};
use crate::state_machine::{Input, TransitionError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Type alias for the runtime built from the injected trait objects
pub type ProductionRuntime =
    SessionRuntime<Arc<dyn SessionStore>, Arc<dyn Gateway>, Arc<dyn NotificationRenderer>>;

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session store failed: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("session runtime for {0} is unavailable")]
    Unavailable(String),
}

/// What to do with an input when the user has no live session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenAbsent {
    /// Drop the input without a reply
    Ignore,
    /// Treat the input as arriving at `Begin`
    Begin,
}

/// One turn submitted to a session runtime
#[derive(Debug)]
pub struct Command {
    pub input: Input,
    pub delivery_id: Option<String>,
    pub when_absent: WhenAbsent,
    pub reply: oneshot::Sender<Result<Vec<Outbound>, EngineError>>,
}

/// Handle to a running session runtime
#[derive(Clone)]
pub struct SessionHandle {
    pub command_tx: mpsc::Sender<Command>,
}

/// Manager for all session runtimes
pub struct RuntimeManager {
    store: Arc<dyn SessionStore>,
    gateway: Arc<dyn Gateway>,
    renderer: Arc<dyn NotificationRenderer>,
    prompts: Arc<Prompts>,
    confirm_token: String,
    idle_timeout: Duration,
    runtimes: RwLock<HashMap<String, SessionHandle>>,
}

impl RuntimeManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        gateway: Arc<dyn Gateway>,
        renderer: Arc<dyn NotificationRenderer>,
        prompts: Arc<Prompts>,
        confirm_token: String,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            renderer,
            prompts,
            confirm_token,
            idle_timeout,
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    /// Get the live runtime handle for a user, spawning a runtime if needed
    async fn get_or_create(&self, user_id: &str) -> SessionHandle {
        {
            let runtimes = self.runtimes.read().await;
            if let Some(handle) = runtimes.get(user_id) {
                if !handle.command_tx.is_closed() {
                    return handle.clone();
                }
            }
        }

        let mut runtimes = self.runtimes.write().await;
        // Another caller may have created it while we waited for the lock
        if let Some(handle) = runtimes.get(user_id) {
            if !handle.command_tx.is_closed() {
                return handle.clone();
            }
        }
        runtimes.retain(|_, handle| !handle.command_tx.is_closed());

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let runtime: ProductionRuntime = SessionRuntime::new(
            user_id.to_string(),
            self.store.clone(),
            self.gateway.clone(),
            self.renderer.clone(),
            self.prompts.clone(),
            self.confirm_token.clone(),
            self.idle_timeout,
            command_rx,
        );
        tokio::spawn(runtime.run());

        let handle = SessionHandle { command_tx };
        runtimes.insert(user_id.to_string(), handle.clone());
        handle
    }

    /// Run one turn for a user and return the replies it produced.
    ///
    /// A runtime that stopped before taking the command is replaced and the
    /// command resent once.
    pub async fn submit(
        &self,
        user_id: &str,
        input: Input,
        delivery_id: Option<String>,
        when_absent: WhenAbsent,
    ) -> Result<Vec<Outbound>, EngineError> {
        for _ in 0..2 {
            let handle = self.get_or_create(user_id).await;
            let (reply_tx, reply_rx) = oneshot::channel();
            let command = Command {
                input: input.clone(),
                delivery_id: delivery_id.clone(),
                when_absent,
                reply: reply_tx,
            };

            if handle.command_tx.send(command).await.is_err() {
                tracing::debug!(user_id = %user_id, "Session runtime gone, restarting");
                continue;
            }
            match reply_rx.await {
                Ok(result) => return result,
                Err(_) => {
                    tracing::debug!(user_id = %user_id, "Session runtime dropped command, restarting");
                }
            }
        }
        Err(EngineError::Unavailable(user_id.to_string()))
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    /// Whether the user is in the middle of a registration
    pub async fn has_session(&self, user_id: &str) -> Result<bool, EngineError> {
        Ok(self.store.get(user_id).await?.is_some())
    }

    /// Number of live runtimes
    #[cfg(test)]
    pub async fn active_runtimes(&self) -> usize {
        self.runtimes
            .read()
            .await
            .values()
            .filter(|handle| !handle.command_tx.is_closed())
            .count()
    }
}

/// Periodically drop expired sessions until `cancel` fires
pub fn spawn_session_sweeper(
    store: Arc<dyn SessionStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::info!(purged, "Purged expired sessions"),
                    Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
                },
            }
        }
        tracing::info!("Session sweeper stopped");
    })
}
