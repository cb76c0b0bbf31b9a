use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub store_url: String,
    pub patient_service_url: String,
    pub doctor_service_url: String,
    pub notification_service_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            store_url: "http://localhost:54321".to_string(),
            patient_service_url: "http://localhost:7101".to_string(),
            doctor_service_url: "http://localhost:7102".to_string(),
            notification_service_url: "http://localhost:7103".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            store_url: self.store_url.clone(),
            store_service_key: "test-service-key".to_string(),
            jwt_secret: self.jwt_secret.clone(),
            patient_service_url: self.patient_service_url.clone(),
            doctor_service_url: self.doctor_service_url.clone(),
            notification_service_url: self.notification_service_url.clone(),
            collaborator_timeout_secs: 2,
            collaborator_connect_timeout_secs: 1,
            cancellation_cutoff_hours: 24,
            max_appointment_duration_minutes: None,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn with_id(id: Uuid, email: &str, role: &str) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }
}

/// Canned JSON bodies matching the collaborator and store wire contracts.
pub struct MockCollaboratorResponses;

impl MockCollaboratorResponses {
    pub fn patient_profile(patient_id: &str, active: bool) -> Value {
        json!({
            "id": patient_id,
            "active": active,
            "status": if active { "active" } else { "suspended" }
        })
    }

    pub fn doctor_availability(available: bool, auto_accept: bool, display_name: &str) -> Value {
        json!({
            "available": available,
            "auto_accept": auto_accept,
            "display_name": display_name
        })
    }

    pub fn appointment_row(
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        scheduled_time: DateTime<Utc>,
        status: &str,
    ) -> Value {
        let now = Utc::now();
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "scheduled_time": scheduled_time.to_rfc3339(),
            "duration_minutes": 30,
            "status": status,
            "notes": null,
            "cancellation_reason": null,
            "medical_record_id": null,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        })
    }

    pub fn audit_row(appointment_id: Uuid, action: &str, actor_role: &str) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "appointment_id": appointment_id,
            "action": action,
            "actor_id": null,
            "actor_role": actor_role,
            "details": null,
            "created_at": Utc::now().to_rfc3339()
        })
    }
}
