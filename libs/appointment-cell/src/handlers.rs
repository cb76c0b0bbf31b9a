// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

use crate::error::AppointmentError;
use crate::models::{
    Actor, ActorRole, BookAppointmentRequest, CancelAppointmentRequest, UpdateStatusRequest,
};
use crate::services::booking::AppointmentBookingService;

/// Resolve the authenticated user into a typed actor. A missing or unknown
/// role claim, or a non-UUID subject, is an authorization failure.
fn actor_from_user(user: &User) -> Result<Actor, AppointmentError> {
    let id = user
        .id
        .parse::<Uuid>()
        .map_err(|_| AppointmentError::Unauthorized)?;
    let role =
        ActorRole::from_claim(user.role.as_deref()).ok_or(AppointmentError::Unauthorized)?;

    Ok(Actor::new(id, role))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppointmentError> {
    let actor = actor_from_user(&user)?;

    // Patients may only book for themselves; doctors and admins may book
    // on a patient's behalf.
    if actor.role == ActorRole::Patient && actor.id != request.patient_id {
        return Err(AppointmentError::Unauthorized);
    }

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.book_appointment(request, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppointmentError> {
    let actor = actor_from_user(&user)?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.get_appointment(appointment_id, &actor).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppointmentError> {
    let actor = actor_from_user(&user)?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .cancel_appointment(appointment_id, &actor, request.reason)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppointmentError> {
    let actor = actor_from_user(&user)?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .update_status(appointment_id, &request.status, &actor, request.notes)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment status updated"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment_audit(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppointmentError> {
    let actor = actor_from_user(&user)?;

    let booking_service = AppointmentBookingService::new(&state);
    let entries = booking_service
        .get_audit_trail(appointment_id, &actor)
        .await?;

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "entries": entries
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppointmentError> {
    let actor = actor_from_user(&user)?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service.list_for_patient(patient_id, &actor).await?;

    Ok(Json(json!({ "appointments": appointments })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppointmentError> {
    let actor = actor_from_user(&user)?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service.list_for_doctor(doctor_id, &actor).await?;

    Ok(Json(json!({ "appointments": appointments })))
}
