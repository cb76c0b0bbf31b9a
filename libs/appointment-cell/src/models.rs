// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use shared_config::AppConfig;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub medical_record_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn scheduled_end_time(&self) -> DateTime<Utc> {
        self.scheduled_time + chrono::Duration::minutes(self.duration_minutes as i64)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Terminal statuses absorb: no transition ever leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// A non-cancelled appointment keeps its (doctor, time) slot occupied.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    /// Localized label used only when rendering notification messages.
    pub fn vietnamese_label(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Chờ xác nhận",
            AppointmentStatus::Confirmed => "Đã xác nhận",
            AppointmentStatus::Completed => "Đã hoàn thành",
            AppointmentStatus::Cancelled => "Đã hủy",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(other.to_string()),
        }
    }
}

// ==============================================================================
// AUDIT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentAudit {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub action: AuditAction,
    pub actor_id: Option<Uuid>,
    pub actor_role: ActorRole,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Confirm,
    Complete,
    Cancel,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditAction::Create => write!(f, "create"),
            AuditAction::Confirm => write!(f, "confirm"),
            AuditAction::Complete => write!(f, "complete"),
            AuditAction::Cancel => write!(f, "cancel"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Patient,
    Doctor,
    Admin,
    System,
}

impl ActorRole {
    pub fn from_claim(role: Option<&str>) -> Option<Self> {
        match role {
            Some("patient") => Some(ActorRole::Patient),
            Some("doctor") => Some(ActorRole::Doctor),
            Some("admin") => Some(ActorRole::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Patient => write!(f, "patient"),
            ActorRole::Doctor => write!(f, "doctor"),
            ActorRole::Admin => write!(f, "admin"),
            ActorRole::System => write!(f, "system"),
        }
    }
}

/// The authenticated requester of a mutating operation.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: Uuid, role: ActorRole) -> Self {
        Self { id, role }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub notes: Option<String>,
}

// ==============================================================================
// COLLABORATOR CONTRACTS
// ==============================================================================

/// Patient directory projection consumed by the booking flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: Uuid,
    pub active: bool,
    pub status: String,
}

/// Doctor availability at one requested time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAvailability {
    pub available: bool,
    pub auto_accept: bool,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Uuid,
    pub subject: String,
    pub message: String,
    pub channel: NotificationChannel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
}

// ==============================================================================
// BOOKING POLICY
// ==============================================================================

#[derive(Debug, Clone)]
pub struct BookingPolicy {
    pub cancellation_cutoff_hours: i64,
    pub max_duration_minutes: Option<i64>,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            cancellation_cutoff_hours: 24,
            max_duration_minutes: None,
        }
    }
}

impl BookingPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cancellation_cutoff_hours: config.cancellation_cutoff_hours,
            max_duration_minutes: config.max_appointment_duration_minutes,
        }
    }
}

// ==============================================================================
// STORE WRITE MODELS
// ==============================================================================

/// Insert payload for the transactional create path.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

/// Status mutation applied together with its audit entry.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
}

/// Audit entry recorded in the same transaction as the row mutation.
#[derive(Debug, Clone)]
pub struct NewAudit {
    pub action: AuditAction,
    pub actor_id: Option<Uuid>,
    pub actor_role: ActorRole,
    pub details: Option<String>,
}
