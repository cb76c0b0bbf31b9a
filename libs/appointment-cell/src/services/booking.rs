// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::clients::{
    CollaboratorError, DoctorDirectoryClient, NotificationClient, PatientDirectoryClient,
};
use crate::error::AppointmentError;
use crate::models::{
    Actor, ActorRole, Appointment, AppointmentAudit, AppointmentStatus, AuditAction,
    BookAppointmentRequest, BookingPolicy, NewAppointment, NewAudit, NotificationChannel,
    NotificationEvent, StatusUpdate,
};
use crate::services::rules::{self, CancellationDecision};
use crate::services::store::{AppointmentStore, PostgrestAppointmentStore, StoreError};

/// Orchestrates the appointment lifecycle: validates remote state via the
/// collaborator clients, applies the scheduling rules, drives the status
/// state machine through the store's transaction boundary, and dispatches
/// best-effort notifications. Holds no mutable state of its own.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    patients: PatientDirectoryClient,
    doctors: DoctorDirectoryClient,
    notifications: NotificationClient,
    policy: BookingPolicy,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_store(config, Arc::new(PostgrestAppointmentStore::new(config)))
    }

    pub fn with_store(config: &AppConfig, store: Arc<dyn AppointmentStore>) -> Self {
        Self {
            store,
            patients: PatientDirectoryClient::new(config),
            doctors: DoctorDirectoryClient::new(config),
            notifications: NotificationClient::new(config),
            policy: BookingPolicy::from_config(config),
        }
    }

    /// Book an appointment. Remote checks run before anything is persisted;
    /// a failed check aborts with no appointment and no audit row. The
    /// conflict check and the insert share one store transaction.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        actor: &Actor,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for patient {} with doctor {} at {}",
            request.patient_id, request.doctor_id, request.scheduled_time
        );

        rules::validate_booking(&request, Utc::now(), &self.policy)?;

        let profile = self
            .patients
            .fetch_profile(request.patient_id)
            .await
            .map_err(|e| match e {
                CollaboratorError::NotFound => AppointmentError::PatientNotFound,
                CollaboratorError::Unavailable(msg) => {
                    AppointmentError::RemoteServiceFailure(format!("patient service: {}", msg))
                }
            })?;

        if !profile.active {
            warn!(
                "Rejecting booking for inactive patient {} (status {})",
                profile.id, profile.status
            );
            return Err(AppointmentError::PatientInactive);
        }

        let availability = self
            .doctors
            .fetch_availability(request.doctor_id, request.scheduled_time)
            .await
            .map_err(|e| match e {
                CollaboratorError::NotFound => AppointmentError::DoctorNotFound,
                CollaboratorError::Unavailable(msg) => {
                    AppointmentError::RemoteServiceFailure(format!("doctor service: {}", msg))
                }
            })?;

        if !availability.available {
            info!(
                "Doctor {} ({}) not accepting bookings at {}",
                request.doctor_id, availability.display_name, request.scheduled_time
            );
            return Err(AppointmentError::DoctorNotAvailable);
        }

        let status = rules::initial_status(availability.auto_accept);
        let details = availability
            .auto_accept
            .then(|| "auto-accepted by doctor settings".to_string());

        let new = NewAppointment {
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            scheduled_time: request.scheduled_time,
            duration_minutes: request.duration_minutes,
            status,
            notes: request.notes,
        };
        let audit = NewAudit {
            action: AuditAction::Create,
            actor_id: Some(actor.id),
            actor_role: actor.role,
            details,
        };

        let appointment = self
            .store
            .create_appointment(new, audit)
            .await
            .map_err(map_store_error)?;

        info!(
            "Appointment {} booked with status {}",
            appointment.id, appointment.status
        );

        self.notifications.dispatch(booking_event(&appointment));

        Ok(appointment)
    }

    /// Cancel an appointment. The requester must be a party to the
    /// appointment or an admin; the cutoff applies to everyone but admins,
    /// whose override is recorded in the audit entry.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment {}", appointment_id);

        let appointment = self.load(appointment_id).await?;
        self.authorize_participant(actor, &appointment)?;

        rules::validate_transition(appointment.status, AppointmentStatus::Cancelled, actor.role)?;

        let decision = rules::check_cancellation_window(
            appointment.scheduled_time,
            Utc::now(),
            self.policy.cancellation_cutoff_hours,
            actor.role,
        )?;

        let details = match decision {
            CancellationDecision::Allowed => format!("cancelled by {}", actor.role),
            CancellationDecision::AdminOverride => format!(
                "cancelled by {}; cutoff of {}h bypassed by admin override",
                actor.role, self.policy.cancellation_cutoff_hours
            ),
        };

        let update = StatusUpdate {
            status: AppointmentStatus::Cancelled,
            cancellation_reason: reason,
            notes: None,
        };
        let audit = NewAudit {
            action: AuditAction::Cancel,
            actor_id: Some(actor.id),
            actor_role: actor.role,
            details: Some(details),
        };

        let cancelled = self
            .store
            .transition(appointment_id, appointment.status, update, audit)
            .await
            .map_err(map_store_error)?;

        info!("Appointment {} cancelled", appointment_id);

        self.notifications.dispatch(status_event(&cancelled));

        Ok(cancelled)
    }

    /// Generic transition endpoint behind the confirm/complete flows. The
    /// submitted status string must map to a known code; the transition is
    /// gated by the same authorization and legality checks as cancel.
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        target_status: &str,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        debug!(
            "Updating appointment {} status to {}",
            appointment_id, target_status
        );

        let target: AppointmentStatus = target_status
            .parse()
            .map_err(AppointmentError::UnsupportedStatus)?;

        if target == AppointmentStatus::Cancelled {
            return self.cancel_appointment(appointment_id, actor, notes).await;
        }

        let appointment = self.load(appointment_id).await?;
        self.authorize_participant(actor, &appointment)?;

        rules::validate_transition(appointment.status, target, actor.role)?;

        let update = StatusUpdate {
            status: target,
            cancellation_reason: None,
            notes,
        };
        let audit = NewAudit {
            action: rules::audit_action_for(target),
            actor_id: Some(actor.id),
            actor_role: actor.role,
            details: None,
        };

        let updated = self
            .store
            .transition(appointment_id, appointment.status, update, audit)
            .await
            .map_err(map_store_error)?;

        info!(
            "Appointment {} transitioned to {}",
            appointment_id, updated.status
        );

        self.notifications.dispatch(status_event(&updated));

        Ok(updated)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        self.authorize_participant(actor, &appointment)?;
        Ok(appointment)
    }

    pub async fn get_audit_trail(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
    ) -> Result<Vec<AppointmentAudit>, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        self.authorize_participant(actor, &appointment)?;

        self.store
            .audit_trail(appointment_id)
            .await
            .map_err(map_store_error)
    }

    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
        actor: &Actor,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let allowed = match actor.role {
            ActorRole::Admin | ActorRole::System => true,
            ActorRole::Patient => actor.id == patient_id,
            ActorRole::Doctor => false,
        };
        if !allowed {
            return Err(AppointmentError::Unauthorized);
        }

        self.store
            .list_for_patient(patient_id)
            .await
            .map_err(map_store_error)
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        actor: &Actor,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let allowed = match actor.role {
            ActorRole::Admin | ActorRole::System => true,
            ActorRole::Doctor => actor.id == doctor_id,
            ActorRole::Patient => false,
        };
        if !allowed {
            return Err(AppointmentError::Unauthorized);
        }

        self.store
            .list_for_doctor(doctor_id)
            .await
            .map_err(map_store_error)
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .fetch(appointment_id)
            .await
            .map_err(map_store_error)?
            .ok_or(AppointmentError::NotFound)
    }

    /// The requester must be the patient or doctor on the appointment, or
    /// an admin. System actors are internal callers and always pass.
    fn authorize_participant(
        &self,
        actor: &Actor,
        appointment: &Appointment,
    ) -> Result<(), AppointmentError> {
        let allowed = match actor.role {
            ActorRole::Admin | ActorRole::System => true,
            ActorRole::Patient => actor.id == appointment.patient_id,
            ActorRole::Doctor => actor.id == appointment.doctor_id,
        };

        if !allowed {
            warn!(
                "Actor {} ({}) denied access to appointment {}",
                actor.id, actor.role, appointment.id
            );
            return Err(AppointmentError::Unauthorized);
        }

        Ok(())
    }
}

fn map_store_error(e: StoreError) -> AppointmentError {
    match e {
        StoreError::SlotTaken => AppointmentError::SlotConflict,
        StoreError::StaleStatus => {
            AppointmentError::InvalidState("appointment was modified concurrently".to_string())
        }
        StoreError::NotFound => AppointmentError::NotFound,
        StoreError::Timeout => AppointmentError::Database("store request timed out".to_string()),
        StoreError::Backend(msg) => AppointmentError::Database(msg),
    }
}

fn booking_event(appointment: &Appointment) -> NotificationEvent {
    NotificationEvent {
        patient_id: appointment.patient_id,
        doctor_id: appointment.doctor_id,
        appointment_id: appointment.id,
        subject: "Lịch hẹn mới".to_string(),
        message: format!(
            "Lịch hẹn ngày {}: {}",
            appointment.scheduled_time.format("%d/%m/%Y %H:%M"),
            appointment.status.vietnamese_label()
        ),
        channel: NotificationChannel::Email,
    }
}

fn status_event(appointment: &Appointment) -> NotificationEvent {
    NotificationEvent {
        patient_id: appointment.patient_id,
        doctor_id: appointment.doctor_id,
        appointment_id: appointment.id,
        subject: "Cập nhật lịch hẹn".to_string(),
        message: format!(
            "Lịch hẹn ngày {}: {}",
            appointment.scheduled_time.format("%d/%m/%Y %H:%M"),
            appointment.status.vietnamese_label()
        ),
        channel: NotificationChannel::Email,
    }
}
