// libs/appointment-cell/src/services/store/mod.rs
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentAudit, AppointmentStatus, NewAppointment, NewAudit, StatusUpdate};

pub mod memory;
pub mod postgrest;

pub use memory::MemoryAppointmentStore;
pub use postgrest::PostgrestAppointmentStore;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Another non-cancelled appointment already holds the (doctor, time) slot.
    #[error("appointment slot already taken")]
    SlotTaken,

    /// The row's status no longer matches what the caller observed; a
    /// concurrent transition won.
    #[error("appointment status changed concurrently")]
    StaleStatus,

    #[error("appointment not found")]
    NotFound,

    #[error("store request timed out")]
    Timeout,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persistence boundary for appointments and their audit trail. All shared
/// mutable state lives behind this trait; every mutating operation commits
/// the row change and its audit entry in one transaction, or neither.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Transactionally insert a new appointment and its `create` audit entry.
    /// The conflict check against the (doctor, scheduled_time) slot runs
    /// inside the same transaction; of two concurrent creates for one slot,
    /// exactly one succeeds and the other observes `SlotTaken`.
    async fn create_appointment(
        &self,
        new: NewAppointment,
        audit: NewAudit,
    ) -> Result<Appointment, StoreError>;

    async fn fetch(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Guarded status transition: applies `update` and appends `audit` only
    /// if the row's current status still equals `expected`.
    async fn transition(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        update: StatusUpdate,
        audit: NewAudit,
    ) -> Result<Appointment, StoreError>;

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError>;

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, StoreError>;

    async fn audit_trail(&self, appointment_id: Uuid) -> Result<Vec<AppointmentAudit>, StoreError>;
}
