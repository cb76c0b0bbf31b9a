use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_url: String,
    pub store_service_key: String,
    pub jwt_secret: String,
    pub patient_service_url: String,
    pub doctor_service_url: String,
    pub notification_service_url: String,
    pub collaborator_timeout_secs: u64,
    pub collaborator_connect_timeout_secs: u64,
    pub cancellation_cutoff_hours: i64,
    pub max_appointment_duration_minutes: Option<i64>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            store_url: env::var("STORE_URL")
                .unwrap_or_else(|_| {
                    warn!("STORE_URL not set, using empty value");
                    String::new()
                }),
            store_service_key: env::var("STORE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("STORE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            patient_service_url: env::var("PATIENT_SERVICE_URL")
                .unwrap_or_else(|_| {
                    warn!("PATIENT_SERVICE_URL not set, using empty value");
                    String::new()
                }),
            doctor_service_url: env::var("DOCTOR_SERVICE_URL")
                .unwrap_or_else(|_| {
                    warn!("DOCTOR_SERVICE_URL not set, using empty value");
                    String::new()
                }),
            notification_service_url: env::var("NOTIFICATION_SERVICE_URL")
                .unwrap_or_else(|_| {
                    warn!("NOTIFICATION_SERVICE_URL not set, using empty value");
                    String::new()
                }),
            collaborator_timeout_secs: parse_env_or("COLLABORATOR_TIMEOUT_SECS", 5),
            collaborator_connect_timeout_secs: parse_env_or("COLLABORATOR_CONNECT_TIMEOUT_SECS", 2),
            cancellation_cutoff_hours: parse_env_or("CANCELLATION_CUTOFF_HOURS", 24),
            max_appointment_duration_minutes: env::var("MAX_APPOINTMENT_DURATION_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.store_url.is_empty()
            && !self.jwt_secret.is_empty()
            && !self.patient_service_url.is_empty()
            && !self.doctor_service_url.is_empty()
    }

    pub fn is_notification_configured(&self) -> bool {
        !self.notification_service_url.is_empty()
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid value, using default", key);
            default
        }),
        Err(_) => default,
    }
}
