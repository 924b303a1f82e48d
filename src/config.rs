//! Process configuration read from the environment

use crate::prompt::Prompts;
use crate::session::DEFAULT_SESSION_TTL_SECS;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;

/// Where sessions are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    Database,
}

impl SessionBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(SessionBackend::Memory),
            "sqlite" | "database" | "db" => Some(SessionBackend::Database),
            _ => None,
        }
    }
}

/// Intent keywords recognized by the dispatcher
#[derive(Debug, Clone)]
pub struct Keywords {
    pub signup: String,
    pub whoami: String,
    pub register: String,
    pub cancel: String,
    pub events: String,
    /// Accepts the summary at the end of the form
    pub confirm: String,
}

impl Default for Keywords {
    fn default() -> Self {
        Self {
            signup: "signup".to_string(),
            whoami: "whoami".to_string(),
            register: "register-event-intent".to_string(),
            cancel: "cancel".to_string(),
            events: "events".to_string(),
            confirm: "ok".to_string(),
        }
    }
}

impl Keywords {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            signup: env_or("EVENTLINE_KEYWORD_SIGNUP", defaults.signup),
            whoami: env_or("EVENTLINE_KEYWORD_WHOAMI", defaults.whoami),
            register: env_or("EVENTLINE_KEYWORD_REGISTER", defaults.register),
            cancel: env_or("EVENTLINE_KEYWORD_CANCEL", defaults.cancel),
            events: env_or("EVENTLINE_KEYWORD_EVENTS", defaults.events),
            confirm: env_or("EVENTLINE_KEYWORD_CONFIRM", defaults.confirm),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub session_ttl: Duration,
    pub session_backend: SessionBackend,
    /// Remote gateway; records are kept in the local database when unset
    pub gateway_url: Option<String>,
    /// LINE channel access token; replies are only logged when unset
    pub line_channel_token: Option<String>,
    pub line_api_base: String,
    pub ticket_image_url: Option<String>,
    pub keywords: Keywords,
    pub prompts: Prompts,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("EVENTLINE_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let session_ttl = std::env::var("EVENTLINE_SESSION_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(Duration::from_secs(DEFAULT_SESSION_TTL_SECS), Duration::from_secs);

        let session_backend = std::env::var("EVENTLINE_SESSION_BACKEND")
            .ok()
            .and_then(|b| SessionBackend::parse(&b))
            .unwrap_or(SessionBackend::Database);

        Self {
            db_path: std::env::var("EVENTLINE_DB_PATH")
                .map_or_else(|_| default_db_path(), PathBuf::from),
            port,
            session_ttl,
            session_backend,
            gateway_url: non_empty_var("EVENTLINE_GATEWAY_URL"),
            line_channel_token: non_empty_var("LINE_CHANNEL_TOKEN"),
            line_api_base: env_or("LINE_API_BASE", crate::platform::LINE_API_BASE.to_string()),
            ticket_image_url: non_empty_var("EVENTLINE_TICKET_IMAGE_URL"),
            keywords: Keywords::from_env(),
            prompts: Prompts::default(),
        }
    }
}

fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(format!("{home}/.eventline/eventline.db"))
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: String) -> String {
    non_empty_var(key).unwrap_or(default)
}
