//! Entry dispatcher
//!
//! Routes inbound messages by intent keyword. Anything that is not a keyword
//! goes to the conversation engine, which ignores it unless the sender has a
//! live session.

use crate::config::Keywords;
use crate::db::User;
use crate::gateway::{Gateway, GatewayError};
use crate::platform::{InboundMessage, Outbound, PlatformClient, PlatformError};
use crate::runtime::{EngineError, RuntimeManager, WhenAbsent};
use crate::state_machine::Input;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// What an inbound message asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Signup,
    WhoAmI,
    Register,
    Cancel,
    Events,
    /// Free text for the registration form
    Text,
}

pub fn classify(keywords: &Keywords, text: &str) -> Intent {
    let text = text.trim();
    if text == keywords.signup {
        Intent::Signup
    } else if text == keywords.whoami {
        Intent::WhoAmI
    } else if text == keywords.register {
        Intent::Register
    } else if text == keywords.cancel {
        Intent::Cancel
    } else if text == keywords.events {
        Intent::Events
    } else {
        Intent::Text
    }
}

pub struct Dispatcher {
    keywords: Keywords,
    manager: Arc<RuntimeManager>,
    gateway: Arc<dyn Gateway>,
    platform: Arc<dyn PlatformClient>,
}

impl Dispatcher {
    pub fn new(
        keywords: Keywords,
        manager: Arc<RuntimeManager>,
        gateway: Arc<dyn Gateway>,
        platform: Arc<dyn PlatformClient>,
    ) -> Self {
        Self {
            keywords,
            manager,
            gateway,
            platform,
        }
    }

    /// Handle a message and send its replies.
    ///
    /// Engine failures are returned so the webhook can ask for redelivery.
    /// A failed reply is only logged: the turn already took effect.
    pub async fn handle(&self, message: InboundMessage) -> Result<(), DispatchError> {
        let replies = self.dispatch(&message).await?;
        if replies.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.platform.reply(&message.reply_token, &replies).await {
            tracing::warn!(user_id = %message.sender_id, error = %e, "Failed to send reply");
        }
        Ok(())
    }

    /// Work out the replies for one message.
    ///
    /// Gateway and platform failures are logged and answered with a generic
    /// failure; only engine failures are returned.
    pub async fn dispatch(&self, message: &InboundMessage) -> Result<Vec<Outbound>, DispatchError> {
        let user_id = message.sender_id.as_str();
        let mut intent = classify(&self.keywords, &message.text);
        // Inside a form these keywords are plain field values
        if matches!(intent, Intent::Signup | Intent::WhoAmI | Intent::Events)
            && self.manager.has_session(user_id).await?
        {
            intent = Intent::Text;
        }
        tracing::info!(user_id = %user_id, intent = ?intent, "Inbound message");

        let delivery_id = message.delivery_id.clone();
        let result = match intent {
            Intent::Signup => self.signup(user_id).await,
            Intent::WhoAmI => self.whoami(user_id).await,
            Intent::Events => self.hosted_events(user_id).await,
            Intent::Register => Ok(self
                .manager
                .submit(user_id, Input::Register, delivery_id, WhenAbsent::Begin)
                .await?),
            Intent::Cancel => Ok(self
                .manager
                .submit(user_id, Input::Cancel, delivery_id, WhenAbsent::Begin)
                .await?),
            Intent::Text => Ok(self
                .manager
                .submit(
                    user_id,
                    Input::message(message.text.clone()),
                    delivery_id,
                    WhenAbsent::Ignore,
                )
                .await?),
        };

        match result {
            Err(e @ (DispatchError::Gateway(_) | DispatchError::Platform(_))) => {
                tracing::error!(user_id = %user_id, intent = ?intent, error = %e, "Request failed");
                Ok(vec![Outbound::text(self.manager.prompts().unavailable.clone())])
            }
            other => other,
        }
    }

    async fn signup(&self, user_id: &str) -> Result<Vec<Outbound>, DispatchError> {
        let user_name = self.platform.display_name(user_id).await?;
        match self.gateway.add_user(&User::new(user_id, &user_name)).await {
            Ok(()) => {
                tracing::info!(user_id = %user_id, "User signed up");
                Ok(vec![Outbound::text(format!("Signed up as {user_name}."))])
            }
            Err(GatewayError::Conflict(_)) => {
                Ok(vec![Outbound::text("You are already signed up.")])
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn whoami(&self, user_id: &str) -> Result<Vec<Outbound>, DispatchError> {
        match self.gateway.get_user(user_id).await {
            Ok(user) => Ok(vec![Outbound::text(format!(
                "Your ID is {} and your name is {}.",
                user.user_id, user.user_name
            ))]),
            Err(GatewayError::NotFound(_)) => Ok(vec![Outbound::text(format!(
                "You have not signed up yet. Send \"{}\" first.",
                self.keywords.signup
            ))]),
            Err(e) => Err(e.into()),
        }
    }

    async fn hosted_events(&self, user_id: &str) -> Result<Vec<Outbound>, DispatchError> {
        let events = self.gateway.list_events_hosted_by(user_id).await?;
        if events.is_empty() {
            return Ok(vec![Outbound::text("You are not hosting any events.")]);
        }

        let mut text = String::from("Your events:");
        for event in &events {
            text.push_str(&format!("\n- {} ({})", event.event_name, event.date));
        }
        Ok(vec![Outbound::text(text)])
    }
}
