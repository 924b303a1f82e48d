//! Per-user session runtime

use super::{Command, EngineError, WhenAbsent};
use crate::gateway::{Gateway, GatewayError};
use crate::platform::Outbound;
use crate::prompt::Prompts;
use crate::render::NotificationRenderer;
use crate::session::{Session, SessionStore, RECENT_DELIVERY_LIMIT};
use crate::state_machine::{transition, CommitFailure, Effect, FormContext, Input};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Serializes the turns of one user.
///
/// The session is re-read from the store at the start of every turn, so the
/// store stays the source of truth and an actor can be dropped at any time.
/// Recent delivery ids are kept both in the session and in the actor, so a
/// redelivered message is skipped after an actor restart and after the
/// session it belonged to has ended.
pub struct SessionRuntime<S, G, R>
where
    S: SessionStore + 'static,
    G: Gateway + 'static,
    R: NotificationRenderer + 'static,
{
    user_id: String,
    store: S,
    gateway: G,
    renderer: R,
    prompts: Arc<Prompts>,
    confirm_token: String,
    idle_timeout: Duration,
    command_rx: mpsc::Receiver<Command>,
    recent_deliveries: VecDeque<String>,
}

impl<S, G, R> SessionRuntime<S, G, R>
where
    S: SessionStore + 'static,
    G: Gateway + 'static,
    R: NotificationRenderer + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: String,
        store: S,
        gateway: G,
        renderer: R,
        prompts: Arc<Prompts>,
        confirm_token: String,
        idle_timeout: Duration,
        command_rx: mpsc::Receiver<Command>,
    ) -> Self {
        Self {
            user_id,
            store,
            gateway,
            renderer,
            prompts,
            confirm_token,
            idle_timeout,
            command_rx,
            recent_deliveries: VecDeque::new(),
        }
    }

    pub async fn run(mut self) {
        tracing::debug!(user_id = %self.user_id, "Starting session runtime");

        loop {
            match tokio::time::timeout(self.idle_timeout, self.command_rx.recv()).await {
                Ok(Some(command)) => {
                    let result = self
                        .handle(command.input, command.delivery_id, command.when_absent)
                        .await;
                    if let Err(e) = &result {
                        tracing::error!(user_id = %self.user_id, error = %e, "Turn aborted");
                    }
                    let _ = command.reply.send(result);
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::debug!(user_id = %self.user_id, "Session runtime idle");
                    break;
                }
            }
        }

        tracing::debug!(user_id = %self.user_id, "Session runtime stopped");
    }

    /// Run one turn: load the session, apply the input and every follow-up
    /// input its effects produce, and collect the replies.
    pub async fn handle(
        &mut self,
        input: Input,
        delivery_id: Option<String>,
        when_absent: WhenAbsent,
    ) -> Result<Vec<Outbound>, EngineError> {
        let context = FormContext::new(
            self.user_id.clone(),
            self.prompts.clone(),
            self.confirm_token.clone(),
        );

        let stored = self.store.get(&self.user_id).await?;
        if let Some(session) = &stored {
            self.adopt_deliveries(&session.recent_deliveries);
        }

        if let Some(id) = &delivery_id {
            if self.recent_deliveries.contains(id) {
                tracing::info!(user_id = %self.user_id, delivery_id = %id, "Skipping redelivered message");
                return Ok(vec![]);
            }
        }

        let mut state = match stored {
            Some(session) => session,
            None if matches!(input, Input::Register) || when_absent == WhenAbsent::Begin => {
                Session::new(self.user_id.clone())
            }
            None => {
                tracing::debug!(user_id = %self.user_id, "No active session, ignoring message");
                return Ok(vec![]);
            }
        };

        // The actor keeps the new id only after the turn succeeds
        let mut deliveries = self.recent_deliveries.clone();
        if let Some(id) = delivery_id {
            push_bounded(&mut deliveries, id);
        }

        let mut outbound = Vec::new();
        let mut inputs = vec![input];

        while let Some(current) = inputs.pop() {
            let from = state.step();
            let result = transition(&state, &context, current)?;
            state = result.new_state;
            state.recent_deliveries.clone_from(&deliveries);

            tracing::debug!(
                user_id = %self.user_id,
                from = %from,
                to = %state.step(),
                effects = result.effects.len(),
                "Transition"
            );

            for effect in result.effects {
                if let Some(next) = self.execute_effect(effect, &state, &mut outbound).await? {
                    inputs.push(next);
                }
            }
        }

        self.recent_deliveries = deliveries;
        Ok(outbound)
    }

    /// Merge ids recorded in a stored session, e.g. after this actor restarted
    fn adopt_deliveries(&mut self, stored: &VecDeque<String>) {
        for id in stored {
            if !self.recent_deliveries.contains(id) {
                push_bounded(&mut self.recent_deliveries, id.clone());
            }
        }
    }

    /// Execute an effect and optionally return a follow-up input
    async fn execute_effect(
        &self,
        effect: Effect,
        state: &Session,
        outbound: &mut Vec<Outbound>,
    ) -> Result<Option<Input>, EngineError> {
        match effect {
            Effect::PersistSession => {
                self.store.save(state).await?;
                Ok(None)
            }

            Effect::InvalidateSession => {
                self.store.invalidate(&self.user_id).await?;
                Ok(None)
            }

            Effect::Reply { text } => {
                outbound.push(Outbound::Text(text));
                Ok(None)
            }

            Effect::CommitEvent { event } => match self.gateway.add_event(&event).await {
                Ok(()) => {
                    tracing::info!(
                        host_id = %event.host_id,
                        event_name = %event.event_name,
                        "Event registered"
                    );
                    Ok(Some(Input::CommitSucceeded { event }))
                }
                Err(e) => {
                    tracing::warn!(
                        host_id = %event.host_id,
                        event_name = %event.event_name,
                        error = %e,
                        "Event commit failed"
                    );
                    Ok(Some(Input::CommitFailed {
                        kind: commit_failure(&e),
                    }))
                }
            },

            Effect::RenderTicket { event } => {
                outbound.push(Outbound::Ticket(self.renderer.render_ticket(&event)));
                Ok(None)
            }
        }
    }
}

fn push_bounded(deliveries: &mut VecDeque<String>, id: String) {
    if deliveries.len() >= RECENT_DELIVERY_LIMIT {
        deliveries.pop_front();
    }
    deliveries.push_back(id);
}

fn commit_failure(error: &GatewayError) -> CommitFailure {
    match error {
        GatewayError::Conflict(_) => CommitFailure::Conflict,
        GatewayError::NotFound(_) => CommitFailure::NotFound,
        GatewayError::Invalid(_) | GatewayError::Transport(_) | GatewayError::Backend(_) => {
            CommitFailure::Transport
        }
    }
}
