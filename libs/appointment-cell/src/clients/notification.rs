// libs/appointment-cell/src/clients/notification.rs
use reqwest::Client;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::clients::{build_http_client, CollaboratorError};
use crate::models::NotificationEvent;

/// Fire-and-forget client for the notification service. Delivery is
/// best-effort: a failed or slow dispatch never blocks or fails the
/// appointment operation that triggered it.
#[derive(Clone)]
pub struct NotificationClient {
    client: Client,
    base_url: String,
}

impl NotificationClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: build_http_client(config),
            base_url: config.notification_service_url.clone(),
        }
    }

    /// Detach the send onto its own task. Failures are logged and dropped.
    pub fn dispatch(&self, event: NotificationEvent) {
        if self.base_url.is_empty() {
            debug!("Notification service not configured, skipping dispatch");
            return;
        }

        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.send(&event).await {
                warn!(
                    "Failed to dispatch notification for appointment {}: {}",
                    event.appointment_id, e
                );
            }
        });
    }

    pub async fn send(&self, event: &NotificationEvent) -> Result<(), CollaboratorError> {
        let url = format!("{}/notifications", self.base_url);
        debug!("Dispatching notification to {}", url);

        let response = self.client.post(&url).json(event).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Unavailable(format!("HTTP {}", status)));
        }

        Ok(())
    }
}
