use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use shared_config::AppConfig;

pub mod doctor;
pub mod notification;
pub mod patient;

pub use doctor::DoctorDirectoryClient;
pub use notification::NotificationClient;
pub use patient::PatientDirectoryClient;

/// Closed result taxonomy for collaborator lookups. A remote 404 is a
/// distinct outcome from the remote being unreachable, so the orchestrator
/// can tell "doctor doesn't exist" apart from "doctor service is down".
#[derive(Error, Debug, Clone)]
pub enum CollaboratorError {
    #[error("resource not found")]
    NotFound,

    #[error("remote service unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CollaboratorError::Unavailable("request timed out".to_string())
        } else if e.is_connect() {
            CollaboratorError::Unavailable("connection failed".to_string())
        } else {
            CollaboratorError::Unavailable(e.to_string())
        }
    }
}

/// Every collaborator call is bounded by the configured connect/read timeouts.
pub(crate) fn build_http_client(config: &AppConfig) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(config.collaborator_timeout_secs))
        .connect_timeout(Duration::from_secs(config.collaborator_connect_timeout_secs))
        .build()
        .unwrap_or_default()
}
