// libs/appointment-cell/src/services/rules.rs
//
// Pure scheduling rules: no I/O, no clock reads. Callers pass `now` in so
// every decision is deterministic and unit-testable.
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::error::AppointmentError;
use crate::models::{
    ActorRole, AppointmentStatus, AuditAction, BookAppointmentRequest, BookingPolicy,
};

/// Outcome of the cancellation-window check. The override variant exists so
/// the audit entry can record that an admin bypassed the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationDecision {
    Allowed,
    AdminOverride,
}

/// Validate a booking request against the invariants that hold at creation
/// time: the slot must be in the future and the duration positive (with an
/// optional configured upper bound).
pub fn validate_booking(
    request: &BookAppointmentRequest,
    now: DateTime<Utc>,
    policy: &BookingPolicy,
) -> Result<(), AppointmentError> {
    if request.scheduled_time <= now {
        return Err(AppointmentError::Validation(
            "Appointment must be scheduled for a future time".to_string(),
        ));
    }

    if request.duration_minutes < 1 {
        return Err(AppointmentError::Validation(
            "Appointment duration must be at least 1 minute".to_string(),
        ));
    }

    if let Some(max) = policy.max_duration_minutes {
        if request.duration_minutes as i64 > max {
            return Err(AppointmentError::Validation(format!(
                "Appointment duration cannot exceed {} minutes",
                max
            )));
        }
    }

    Ok(())
}

/// Auto-accept doctors produce appointments that are confirmed at creation.
pub fn initial_status(auto_accept: bool) -> AppointmentStatus {
    if auto_accept {
        AppointmentStatus::Confirmed
    } else {
        AppointmentStatus::Pending
    }
}

/// Cancellation is permitted only while `now` is earlier than the scheduled
/// time minus the cutoff. Admins may bypass the cutoff; the bypass is
/// surfaced explicitly so it lands in the audit trail.
pub fn check_cancellation_window(
    scheduled_time: DateTime<Utc>,
    now: DateTime<Utc>,
    cutoff_hours: i64,
    role: ActorRole,
) -> Result<CancellationDecision, AppointmentError> {
    let cutoff = scheduled_time - Duration::hours(cutoff_hours);

    if now < cutoff {
        return Ok(CancellationDecision::Allowed);
    }

    if role == ActorRole::Admin {
        warn!(
            "Cancellation cutoff of {}h bypassed by admin for appointment at {}",
            cutoff_hours, scheduled_time
        );
        return Ok(CancellationDecision::AdminOverride);
    }

    Err(AppointmentError::CancellationWindowClosed(cutoff_hours))
}

/// Role-gated status transition table.
///
/// | from      | to        | allowed roles          |
/// |-----------|-----------|------------------------|
/// | pending   | confirmed | doctor, admin          |
/// | pending   | cancelled | patient, doctor, admin |
/// | confirmed | cancelled | patient, doctor, admin |
/// | confirmed | completed | doctor, admin          |
///
/// Everything else is rejected, including self-transitions and any
/// transition out of a terminal status.
pub fn allowed_roles(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Option<&'static [ActorRole]> {
    use ActorRole::*;
    use AppointmentStatus::*;

    match (from, to) {
        (Pending, Confirmed) => Some(&[Doctor, Admin]),
        (Pending, Cancelled) => Some(&[Patient, Doctor, Admin]),
        (Confirmed, Cancelled) => Some(&[Patient, Doctor, Admin]),
        (Confirmed, Completed) => Some(&[Doctor, Admin]),
        _ => None,
    }
}

/// Validate that a transition is legal for the requesting role. An illegal
/// (from, to) pair is an invalid-state error; a legal pair requested by a
/// role outside its gate is an authorization failure.
pub fn validate_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
    role: ActorRole,
) -> Result<(), AppointmentError> {
    debug!("Validating status transition {} -> {} by {}", from, to, role);

    let Some(roles) = allowed_roles(from, to) else {
        warn!("Invalid status transition attempted: {} -> {}", from, to);
        return Err(AppointmentError::InvalidState(format!(
            "cannot transition from {} to {}",
            from, to
        )));
    };

    if !roles.contains(&role) {
        warn!("Role {} not permitted for transition {} -> {}", role, from, to);
        return Err(AppointmentError::Unauthorized);
    }

    Ok(())
}

/// The audit action recorded for a successful transition into `to`.
pub fn audit_action_for(to: AppointmentStatus) -> AuditAction {
    match to {
        AppointmentStatus::Confirmed => AuditAction::Confirm,
        AppointmentStatus::Completed => AuditAction::Complete,
        AppointmentStatus::Cancelled => AuditAction::Cancel,
        // Nothing transitions into pending; a create is audited as Create.
        AppointmentStatus::Pending => AuditAction::Create,
    }
}
