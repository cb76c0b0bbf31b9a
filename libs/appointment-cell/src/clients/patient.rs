// libs/appointment-cell/src/clients/patient.rs
use reqwest::{Client, StatusCode};
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::clients::{build_http_client, CollaboratorError};
use crate::models::PatientProfile;

/// Read-only client for the patient directory service.
/// GET {base}/patients/{id}
#[derive(Clone)]
pub struct PatientDirectoryClient {
    client: Client,
    base_url: String,
}

impl PatientDirectoryClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: build_http_client(config),
            base_url: config.patient_service_url.clone(),
        }
    }

    pub async fn fetch_profile(&self, patient_id: Uuid) -> Result<PatientProfile, CollaboratorError> {
        let url = format!("{}/patients/{}", self.base_url, patient_id);
        debug!("Fetching patient profile from {}", url);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CollaboratorError::NotFound);
        }
        if !status.is_success() {
            error!("Patient service returned {} for patient {}", status, patient_id);
            return Err(CollaboratorError::Unavailable(format!("HTTP {}", status)));
        }

        let profile = response
            .json::<PatientProfile>()
            .await
            .map_err(|e| CollaboratorError::Unavailable(format!("invalid response body: {}", e)))?;

        Ok(profile)
    }
}
