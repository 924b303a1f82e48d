//! Gateway client for a remote eventline data server

use super::{Gateway, GatewayError};
use crate::db::{Event, EventKey, Participant, User};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ParticipantForm<'a> {
    #[serde(rename = "participantID")]
    participant_id: &'a str,
}

/// Talks to the gateway routes served by `api::create_router`
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::Invalid(format!("gateway url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Invalid(format!(
                "gateway url {base_url} cannot be a base"
            )));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Base URL with `segments` appended, each percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Invalid(format!("gateway url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, GatewayError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Transport(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                GatewayError::Transport(format!("Connection failed: {e}"))
            } else {
                GatewayError::Transport(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(format!("Failed to read response: {e}")))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(classify_error(status, &body))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, GatewayError> {
        let body = self.send(self.client.get(url)).await?;
        serde_json::from_str(&body)
            .map_err(|e| GatewayError::Transport(format!("Failed to parse response: {e}")))
    }

    async fn post_form<F: Serialize + ?Sized>(&self, url: Url, form: &F) -> Result<(), GatewayError> {
        self.send(self.client.post(url).form(form)).await.map(|_| ())
    }

    async fn post_empty(&self, url: Url) -> Result<(), GatewayError> {
        self.send(self.client.post(url)).await.map(|_| ())
    }

    fn participant_url(&self, participant: &Participant) -> Result<Url, GatewayError> {
        self.url(&[
            "event",
            &participant.host_id,
            &participant.event_name,
            "participants",
            &participant.participant_id,
        ])
    }
}

fn classify_error(status: StatusCode, body: &str) -> GatewayError {
    let message = body.trim().to_string();
    match status {
        StatusCode::NOT_FOUND => GatewayError::NotFound(message),
        StatusCode::CONFLICT => GatewayError::Conflict(message),
        StatusCode::BAD_REQUEST => GatewayError::Invalid(message),
        _ if status.is_server_error() => GatewayError::Backend(message),
        _ => GatewayError::Transport(format!("HTTP {status}: {message}")),
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn add_user(&self, user: &User) -> Result<(), GatewayError> {
        self.post_form(self.url(&["signup"])?, user).await
    }

    async fn get_user(&self, user_id: &str) -> Result<User, GatewayError> {
        self.get_json(self.url(&["user", user_id])?).await
    }

    async fn list_users(&self) -> Result<Vec<User>, GatewayError> {
        self.get_json(self.url(&["userlist"])?).await
    }

    async fn update_user(&self, user: &User) -> Result<(), GatewayError> {
        self.post_form(self.url(&["user", &user.user_id])?, user).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), GatewayError> {
        self.post_empty(self.url(&["user", user_id, "delete"])?).await
    }

    async fn add_event(&self, event: &Event) -> Result<(), GatewayError> {
        self.post_form(self.url(&["event", "register"])?, event).await
    }

    async fn get_event(&self, key: &EventKey) -> Result<Event, GatewayError> {
        self.get_json(self.url(&["event", &key.host_id, &key.event_name])?)
            .await
    }

    async fn list_events(&self) -> Result<Vec<Event>, GatewayError> {
        self.get_json(self.url(&["event", "list"])?).await
    }

    async fn list_events_hosted_by(&self, host_id: &str) -> Result<Vec<Event>, GatewayError> {
        let mut url = self.url(&["event", "list"])?;
        url.query_pairs_mut().append_pair("hostID", host_id);
        self.get_json(url).await
    }

    async fn update_event(&self, event: &Event) -> Result<(), GatewayError> {
        self.post_form(self.url(&["event", &event.host_id, &event.event_name])?, event)
            .await
    }

    async fn delete_event(&self, key: &EventKey) -> Result<(), GatewayError> {
        self.post_empty(self.url(&["event", &key.host_id, &key.event_name, "delete"])?)
            .await
    }

    async fn add_participant(&self, participant: &Participant) -> Result<(), GatewayError> {
        let url = self.url(&[
            "event",
            &participant.host_id,
            &participant.event_name,
            "participants",
        ])?;
        let form = ParticipantForm {
            participant_id: &participant.participant_id,
        };
        self.post_form(url, &form).await
    }

    async fn get_participant(
        &self,
        participant: &Participant,
    ) -> Result<Participant, GatewayError> {
        self.get_json(self.participant_url(participant)?).await
    }

    async fn list_participants(&self) -> Result<Vec<Participant>, GatewayError> {
        self.get_json(self.url(&["participants"])?).await
    }

    async fn list_participants_of(
        &self,
        key: &EventKey,
    ) -> Result<Vec<Participant>, GatewayError> {
        self.get_json(self.url(&["event", &key.host_id, &key.event_name, "participants"])?)
            .await
    }

    async fn delete_participant(&self, participant: &Participant) -> Result<(), GatewayError> {
        let mut url = self.participant_url(participant)?;
        url.path_segments_mut()
            .map_err(|()| GatewayError::Invalid(format!("gateway url {}", self.base_url)))?
            .push("delete");
        self.post_empty(url).await
    }
}
