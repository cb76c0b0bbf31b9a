// libs/appointment-cell/src/clients/doctor.rs
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::clients::{build_http_client, CollaboratorError};
use crate::models::DoctorAvailability;

/// Read-only client for the doctor directory service.
/// GET {base}/doctors/{id}/availability?time=RFC3339
#[derive(Clone)]
pub struct DoctorDirectoryClient {
    client: Client,
    base_url: String,
}

impl DoctorDirectoryClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: build_http_client(config),
            base_url: config.doctor_service_url.clone(),
        }
    }

    pub async fn fetch_availability(
        &self,
        doctor_id: Uuid,
        time: DateTime<Utc>,
    ) -> Result<DoctorAvailability, CollaboratorError> {
        let url = format!("{}/doctors/{}/availability", self.base_url, doctor_id);
        debug!("Fetching doctor availability from {} at {}", url, time);

        let response = self
            .client
            .get(&url)
            .query(&[("time", time.to_rfc3339())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CollaboratorError::NotFound);
        }
        if !status.is_success() {
            error!("Doctor service returned {} for doctor {}", status, doctor_id);
            return Err(CollaboratorError::Unavailable(format!("HTTP {}", status)));
        }

        let availability = response
            .json::<DoctorAvailability>()
            .await
            .map_err(|e| CollaboratorError::Unavailable(format!("invalid response body: {}", e)))?;

        Ok(availability)
    }
}
