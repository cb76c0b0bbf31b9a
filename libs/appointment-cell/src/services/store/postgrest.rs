// libs/appointment-cell/src/services/store/postgrest.rs
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::{PostgrestClient, PostgrestError};

use crate::models::{
    Appointment, AppointmentAudit, AppointmentStatus, NewAppointment, NewAudit, StatusUpdate,
};
use crate::services::store::{AppointmentStore, StoreError};

/// PostgREST-backed store. The two mutating paths go through SQL functions
/// so the appointment row and its audit entry commit in one transaction:
///
/// - `book_appointment_slot` inserts the appointment plus the `create`
///   audit entry; the partial unique index
///   `(doctor_id, scheduled_time) where status <> 'cancelled'` rejects a
///   concurrent booking of the same slot with a conflict, surfaced here as
///   `StoreError::SlotTaken`.
/// - `transition_appointment` updates the row only while its status still
///   equals the expected value, appending the audit entry in the same
///   transaction; a guard miss returns no row and maps to `StaleStatus`.
pub struct PostgrestAppointmentStore {
    db: PostgrestClient,
}

impl PostgrestAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
        }
    }

    fn parse_row(row: Value) -> Result<Appointment, StoreError> {
        serde_json::from_value(row)
            .map_err(|e| StoreError::Backend(format!("failed to parse appointment row: {}", e)))
    }

    fn map_error(e: PostgrestError) -> StoreError {
        match e {
            PostgrestError::Conflict(_) => StoreError::SlotTaken,
            PostgrestError::Timeout => StoreError::Timeout,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[async_trait]
impl AppointmentStore for PostgrestAppointmentStore {
    async fn create_appointment(
        &self,
        new: NewAppointment,
        audit: NewAudit,
    ) -> Result<Appointment, StoreError> {
        debug!(
            "Inserting appointment for doctor {} at {}",
            new.doctor_id, new.scheduled_time
        );

        let payload = json!({
            "p_patient_id": new.patient_id,
            "p_doctor_id": new.doctor_id,
            "p_scheduled_time": new.scheduled_time.to_rfc3339(),
            "p_duration_minutes": new.duration_minutes,
            "p_status": new.status.to_string(),
            "p_notes": new.notes,
            "p_audit_action": audit.action.to_string(),
            "p_actor_id": audit.actor_id,
            "p_actor_role": audit.actor_role.to_string(),
            "p_audit_details": audit.details,
        });

        let row: Value = self
            .db
            .request(Method::POST, "/rest/v1/rpc/book_appointment_slot", Some(payload))
            .await
            .map_err(Self::map_error)?;

        Self::parse_row(row)
    }

    async fn fetch(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .db
            .request(Method::GET, &path, None)
            .await
            .map_err(Self::map_error)?;

        match rows.into_iter().next() {
            Some(row) => Ok(Some(Self::parse_row(row)?)),
            None => Ok(None),
        }
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        update: StatusUpdate,
        audit: NewAudit,
    ) -> Result<Appointment, StoreError> {
        debug!(
            "Transitioning appointment {} from {} to {}",
            appointment_id, expected, update.status
        );

        let payload = json!({
            "p_appointment_id": appointment_id,
            "p_expected_status": expected.to_string(),
            "p_new_status": update.status.to_string(),
            "p_cancellation_reason": update.cancellation_reason,
            "p_notes": update.notes,
            "p_audit_action": audit.action.to_string(),
            "p_actor_id": audit.actor_id,
            "p_actor_role": audit.actor_role.to_string(),
            "p_audit_details": audit.details,
        });

        let rows: Vec<Value> = self
            .db
            .request(Method::POST, "/rest/v1/rpc/transition_appointment", Some(payload))
            .await
            .map_err(Self::map_error)?;

        // The function returns no row when the status guard misses.
        match rows.into_iter().next() {
            Some(row) => Self::parse_row(row),
            None => Err(StoreError::StaleStatus),
        }
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=scheduled_time.desc",
            patient_id
        );
        let rows: Vec<Value> = self
            .db
            .request(Method::GET, &path, None)
            .await
            .map_err(Self::map_error)?;

        rows.into_iter().map(Self::parse_row).collect()
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&order=scheduled_time.desc",
            doctor_id
        );
        let rows: Vec<Value> = self
            .db
            .request(Method::GET, &path, None)
            .await
            .map_err(Self::map_error)?;

        rows.into_iter().map(Self::parse_row).collect()
    }

    async fn audit_trail(&self, appointment_id: Uuid) -> Result<Vec<AppointmentAudit>, StoreError> {
        let path = format!(
            "/rest/v1/appointment_audits?appointment_id=eq.{}&order=created_at.asc",
            appointment_id
        );
        let rows: Vec<Value> = self
            .db
            .request(Method::GET, &path, None)
            .await
            .map_err(Self::map_error)?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| StoreError::Backend(format!("failed to parse audit row: {}", e)))
            })
            .collect()
    }
}
