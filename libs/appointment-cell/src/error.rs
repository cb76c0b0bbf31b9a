use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Closed error taxonomy for the appointment core. Every variant carries a
/// stable machine-readable code; transport and stack detail never crosses
/// the API boundary.
#[derive(Error, Debug, Clone)]
pub enum AppointmentError {
    #[error("Patient not found")]
    PatientNotFound,

    #[error("Patient is not eligible for booking")]
    PatientInactive,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor is not available at the requested time")]
    DoctorNotAvailable,

    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment slot is already booked")]
    SlotConflict,

    #[error("Invalid appointment state: {0}")]
    InvalidState(String),

    #[error("Cancellation window of {0} hours has passed")]
    CancellationWindowClosed(i64),

    #[error("Unsupported appointment status: {0}")]
    UnsupportedStatus(String),

    #[error("Remote service failure: {0}")]
    RemoteServiceFailure(String),

    #[error("Not authorized to perform this action")]
    Unauthorized,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl AppointmentError {
    pub fn code(&self) -> &'static str {
        match self {
            AppointmentError::PatientNotFound => "PATIENT_NOT_FOUND",
            AppointmentError::PatientInactive => "PATIENT_INACTIVE",
            AppointmentError::DoctorNotFound => "DOCTOR_NOT_FOUND",
            AppointmentError::DoctorNotAvailable => "DOCTOR_UNAVAILABLE",
            AppointmentError::NotFound => "APPOINTMENT_NOT_FOUND",
            AppointmentError::SlotConflict => "APPOINTMENT_CONFLICT",
            AppointmentError::InvalidState(_) => "INVALID_APPOINTMENT_STATE",
            AppointmentError::CancellationWindowClosed(_) => "CANCELLATION_WINDOW_CLOSED",
            AppointmentError::UnsupportedStatus(_) => "UNSUPPORTED_APPOINTMENT_STATUS",
            AppointmentError::RemoteServiceFailure(_) => "REMOTE_SERVICE_FAILURE",
            AppointmentError::Unauthorized => "AUTHORIZATION_DENIED",
            AppointmentError::Validation(_) => "VALIDATION_ERROR",
            AppointmentError::Database(_) => "DATABASE_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppointmentError::PatientNotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::NotFound => StatusCode::NOT_FOUND,
            AppointmentError::PatientInactive
            | AppointmentError::DoctorNotAvailable => StatusCode::UNPROCESSABLE_ENTITY,
            AppointmentError::SlotConflict
            | AppointmentError::InvalidState(_)
            | AppointmentError::CancellationWindowClosed(_) => StatusCode::CONFLICT,
            AppointmentError::UnsupportedStatus(_)
            | AppointmentError::Validation(_) => StatusCode::BAD_REQUEST,
            AppointmentError::RemoteServiceFailure(_) => StatusCode::BAD_GATEWAY,
            AppointmentError::Unauthorized => StatusCode::FORBIDDEN,
            AppointmentError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppointmentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        tracing::error!("Appointment error {}: {}", self.code(), message);

        let body = Json(json!({
            "error": message,
            "code": self.code()
        }));

        (status, body).into_response()
    }
}
