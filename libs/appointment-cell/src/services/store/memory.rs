// libs/appointment-cell/src/services/store/memory.rs
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentAudit, AppointmentStatus, NewAppointment, NewAudit, StatusUpdate,
};
use crate::services::store::{AppointmentStore, StoreError};

#[derive(Default)]
struct Inner {
    appointments: HashMap<Uuid, Appointment>,
    audits: Vec<AppointmentAudit>,
}

/// In-memory store used by the service-level tests. One mutex serializes
/// every operation, which gives the same observable guarantee as the
/// transactional backend: the slot check and the insert are indivisible, so
/// concurrent creates for one slot admit exactly one winner.
#[derive(Default)]
pub struct MemoryAppointmentStore {
    inner: Mutex<Inner>,
}

impl MemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn appointment_count(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").appointments.len()
    }

    pub fn audit_count(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").audits.len()
    }

    fn append_audit(inner: &mut Inner, appointment_id: Uuid, audit: NewAudit) {
        inner.audits.push(AppointmentAudit {
            id: Uuid::new_v4(),
            appointment_id,
            action: audit.action,
            actor_id: audit.actor_id,
            actor_role: audit.actor_role,
            details: audit.details,
            created_at: Utc::now(),
        });
    }
}

#[async_trait]
impl AppointmentStore for MemoryAppointmentStore {
    async fn create_appointment(
        &self,
        new: NewAppointment,
        audit: NewAudit,
    ) -> Result<Appointment, StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");

        let slot_taken = inner.appointments.values().any(|apt| {
            apt.doctor_id == new.doctor_id
                && apt.scheduled_time == new.scheduled_time
                && apt.status.occupies_slot()
        });
        if slot_taken {
            return Err(StoreError::SlotTaken);
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            scheduled_time: new.scheduled_time,
            duration_minutes: new.duration_minutes,
            status: new.status,
            notes: new.notes,
            cancellation_reason: None,
            medical_record_id: None,
            created_at: now,
            updated_at: now,
        };

        inner.appointments.insert(appointment.id, appointment.clone());
        Self::append_audit(&mut inner, appointment.id, audit);

        Ok(appointment)
    }

    async fn fetch(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.appointments.get(&appointment_id).cloned())
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        update: StatusUpdate,
        audit: NewAudit,
    ) -> Result<Appointment, StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");

        let appointment = inner
            .appointments
            .get_mut(&appointment_id)
            .ok_or(StoreError::NotFound)?;

        if appointment.status != expected {
            return Err(StoreError::StaleStatus);
        }

        appointment.status = update.status;
        if update.cancellation_reason.is_some() {
            appointment.cancellation_reason = update.cancellation_reason;
        }
        if update.notes.is_some() {
            appointment.notes = update.notes;
        }
        appointment.updated_at = Utc::now();

        let updated = appointment.clone();
        Self::append_audit(&mut inner, appointment_id, audit);

        Ok(updated)
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut appointments: Vec<Appointment> = inner
            .appointments
            .values()
            .filter(|apt| apt.patient_id == patient_id)
            .cloned()
            .collect();
        appointments.sort_by(|a, b| b.scheduled_time.cmp(&a.scheduled_time));
        Ok(appointments)
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut appointments: Vec<Appointment> = inner
            .appointments
            .values()
            .filter(|apt| apt.doctor_id == doctor_id)
            .cloned()
            .collect();
        appointments.sort_by(|a, b| b.scheduled_time.cmp(&a.scheduled_time));
        Ok(appointments)
    }

    async fn audit_trail(&self, appointment_id: Uuid) -> Result<Vec<AppointmentAudit>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner
            .audits
            .iter()
            .filter(|entry| entry.appointment_id == appointment_id)
            .cloned()
            .collect())
    }
}
