use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::error::AppointmentError;
use appointment_cell::models::{
    Actor, ActorRole, AppointmentStatus, AuditAction, BookAppointmentRequest,
};
use appointment_cell::services::booking::AppointmentBookingService;
use appointment_cell::services::store::MemoryAppointmentStore;
use shared_config::AppConfig;
use shared_utils::test_utils::{MockCollaboratorResponses, TestConfig};

struct TestHarness {
    service: AppointmentBookingService,
    store: Arc<MemoryAppointmentStore>,
    patient_id: Uuid,
    doctor_id: Uuid,
}

impl TestHarness {
    fn patient_actor(&self) -> Actor {
        Actor::new(self.patient_id, ActorRole::Patient)
    }

    fn doctor_actor(&self) -> Actor {
        Actor::new(self.doctor_id, ActorRole::Doctor)
    }

    fn admin_actor(&self) -> Actor {
        Actor::new(Uuid::new_v4(), ActorRole::Admin)
    }

    fn booking_request(&self, offset_hours: i64) -> BookAppointmentRequest {
        BookAppointmentRequest {
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            scheduled_time: Utc::now() + Duration::hours(offset_hours),
            duration_minutes: 30,
            notes: None,
        }
    }
}

fn collaborator_config(mock_server: &MockServer) -> AppConfig {
    let mut config = TestConfig::default().to_app_config();
    config.patient_service_url = mock_server.uri();
    config.doctor_service_url = mock_server.uri();
    config.notification_service_url = mock_server.uri();
    config
}

/// Mount healthy collaborator responses: active patient, available doctor
/// with the given auto-accept setting, accepting notification sink.
async fn setup_collaborators(mock_server: &MockServer, patient_id: Uuid, doctor_id: Uuid, auto_accept: bool) {
    Mock::given(method("GET"))
        .and(path(format!("/patients/{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockCollaboratorResponses::patient_profile(&patient_id.to_string(), true),
        ))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/doctors/{}/availability", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockCollaboratorResponses::doctor_availability(true, auto_accept, "Dr. Test"),
        ))
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(200))
        .mount(mock_server)
        .await;
}

async fn harness(mock_server: &MockServer, auto_accept: bool) -> TestHarness {
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    setup_collaborators(mock_server, patient_id, doctor_id, auto_accept).await;

    let config = collaborator_config(mock_server);
    let store = Arc::new(MemoryAppointmentStore::new());
    let service = AppointmentBookingService::with_store(&config, store.clone());

    TestHarness {
        service,
        store,
        patient_id,
        doctor_id,
    }
}

#[tokio::test]
async fn booking_creates_pending_appointment_with_audit() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server, false).await;

    let appointment = h
        .service
        .book_appointment(h.booking_request(72), &h.patient_actor())
        .await
        .expect("booking should succeed");

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.patient_id, h.patient_id);
    assert_eq!(appointment.doctor_id, h.doctor_id);
    assert_eq!(h.store.appointment_count(), 1);

    let trail = h
        .service
        .get_audit_trail(appointment.id, &h.patient_actor())
        .await
        .expect("audit trail should be readable");
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, AuditAction::Create);
    assert_eq!(trail[0].appointment_id, appointment.id);
    assert_eq!(trail[0].actor_role, ActorRole::Patient);
}

#[tokio::test]
async fn auto_accept_doctor_creates_confirmed_appointment() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server, true).await;

    let appointment = h
        .service
        .book_appointment(h.booking_request(72), &h.patient_actor())
        .await
        .expect("booking should succeed");

    assert_eq!(appointment.status, AppointmentStatus::Confirmed);

    let trail = h
        .service
        .get_audit_trail(appointment.id, &h.patient_actor())
        .await
        .unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(
        trail[0].details.as_deref(),
        Some("auto-accepted by doctor settings")
    );
}

#[tokio::test]
async fn inactive_patient_is_rejected_without_persistence() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/patients/{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockCollaboratorResponses::patient_profile(&patient_id.to_string(), false),
        ))
        .mount(&mock_server)
        .await;

    let config = collaborator_config(&mock_server);
    let store = Arc::new(MemoryAppointmentStore::new());
    let service = AppointmentBookingService::with_store(&config, store.clone());

    let request = BookAppointmentRequest {
        patient_id,
        doctor_id,
        scheduled_time: Utc::now() + Duration::hours(72),
        duration_minutes: 30,
        notes: None,
    };
    let actor = Actor::new(patient_id, ActorRole::Patient);

    let result = service.book_appointment(request, &actor).await;
    assert_matches!(result, Err(AppointmentError::PatientInactive));
    assert_eq!(store.appointment_count(), 0);
    assert_eq!(store.audit_count(), 0);
}

#[tokio::test]
async fn unknown_patient_is_rejected() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/patients/{}", patient_id)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let config = collaborator_config(&mock_server);
    let store = Arc::new(MemoryAppointmentStore::new());
    let service = AppointmentBookingService::with_store(&config, store.clone());

    let request = BookAppointmentRequest {
        patient_id,
        doctor_id: Uuid::new_v4(),
        scheduled_time: Utc::now() + Duration::hours(72),
        duration_minutes: 30,
        notes: None,
    };
    let actor = Actor::new(patient_id, ActorRole::Patient);

    let result = service.book_appointment(request, &actor).await;
    assert_matches!(result, Err(AppointmentError::PatientNotFound));
    assert_eq!(store.appointment_count(), 0);
}

#[tokio::test]
async fn patient_service_outage_aborts_booking() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/patients/{}", patient_id)))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = collaborator_config(&mock_server);
    let store = Arc::new(MemoryAppointmentStore::new());
    let service = AppointmentBookingService::with_store(&config, store.clone());

    let request = BookAppointmentRequest {
        patient_id,
        doctor_id: Uuid::new_v4(),
        scheduled_time: Utc::now() + Duration::hours(72),
        duration_minutes: 30,
        notes: None,
    };
    let actor = Actor::new(patient_id, ActorRole::Patient);

    let result = service.book_appointment(request, &actor).await;
    assert_matches!(result, Err(AppointmentError::RemoteServiceFailure(_)));
    assert_eq!(store.appointment_count(), 0);
    assert_eq!(store.audit_count(), 0);
}

#[tokio::test]
async fn unknown_doctor_is_rejected() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/patients/{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockCollaboratorResponses::patient_profile(&patient_id.to_string(), true),
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/doctors/{}/availability", doctor_id)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let config = collaborator_config(&mock_server);
    let store = Arc::new(MemoryAppointmentStore::new());
    let service = AppointmentBookingService::with_store(&config, store.clone());

    let request = BookAppointmentRequest {
        patient_id,
        doctor_id,
        scheduled_time: Utc::now() + Duration::hours(72),
        duration_minutes: 30,
        notes: None,
    };
    let actor = Actor::new(patient_id, ActorRole::Patient);

    let result = service.book_appointment(request, &actor).await;
    assert_matches!(result, Err(AppointmentError::DoctorNotFound));
    assert_eq!(store.appointment_count(), 0);
}

#[tokio::test]
async fn unavailable_doctor_is_rejected_without_persistence() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/patients/{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockCollaboratorResponses::patient_profile(&patient_id.to_string(), true),
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/doctors/{}/availability", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockCollaboratorResponses::doctor_availability(false, false, "Dr. Test"),
        ))
        .mount(&mock_server)
        .await;

    let config = collaborator_config(&mock_server);
    let store = Arc::new(MemoryAppointmentStore::new());
    let service = AppointmentBookingService::with_store(&config, store.clone());

    let request = BookAppointmentRequest {
        patient_id,
        doctor_id,
        scheduled_time: Utc::now() + Duration::hours(72),
        duration_minutes: 30,
        notes: None,
    };
    let actor = Actor::new(patient_id, ActorRole::Patient);

    let result = service.book_appointment(request, &actor).await;
    assert_matches!(result, Err(AppointmentError::DoctorNotAvailable));
    assert_eq!(store.appointment_count(), 0);
    assert_eq!(store.audit_count(), 0);
}

#[tokio::test]
async fn duplicate_slot_is_rejected() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server, false).await;

    let request = h.booking_request(72);

    h.service
        .book_appointment(request.clone(), &h.patient_actor())
        .await
        .expect("first booking should succeed");

    let result = h
        .service
        .book_appointment(request, &h.patient_actor())
        .await;
    assert_matches!(result, Err(AppointmentError::SlotConflict));
    assert_eq!(h.store.appointment_count(), 1);
}

#[tokio::test]
async fn concurrent_bookings_for_one_slot_admit_exactly_one_winner() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server, false).await;

    let request = h.booking_request(72);
    let actor = h.patient_actor();

    let attempts: Vec<_> = (0..8)
        .map(|_| h.service.book_appointment(request.clone(), &actor))
        .collect();
    let results = futures::future::join_all(attempts).await;

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(AppointmentError::SlotConflict)))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(h.store.appointment_count(), 1);
    assert_eq!(h.store.audit_count(), 1);
}

#[tokio::test]
async fn cancelled_slot_can_be_rebooked() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server, false).await;

    let request = h.booking_request(72);

    let appointment = h
        .service
        .book_appointment(request.clone(), &h.patient_actor())
        .await
        .expect("booking should succeed");

    let cancelled = h
        .service
        .cancel_appointment(
            appointment.id,
            &h.patient_actor(),
            Some("schedule changed".to_string()),
        )
        .await
        .expect("cancellation should succeed");

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("schedule changed"));

    let trail = h
        .service
        .get_audit_trail(appointment.id, &h.patient_actor())
        .await
        .unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[1].action, AuditAction::Cancel);

    // The cancelled appointment no longer occupies the slot.
    let rebooked = h
        .service
        .book_appointment(request, &h.patient_actor())
        .await
        .expect("rebooking a freed slot should succeed");
    assert_eq!(rebooked.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn cancellation_inside_cutoff_is_rejected_for_patient() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server, false).await;

    // Inside the 24h cutoff.
    let appointment = h
        .service
        .book_appointment(h.booking_request(2), &h.patient_actor())
        .await
        .expect("booking should succeed");

    let result = h
        .service
        .cancel_appointment(appointment.id, &h.patient_actor(), None)
        .await;
    assert_matches!(result, Err(AppointmentError::CancellationWindowClosed(24)));

    // Status must not have been mutated.
    let reloaded = h
        .service
        .get_appointment(appointment.id, &h.patient_actor())
        .await
        .unwrap();
    assert_eq!(reloaded.status, AppointmentStatus::Pending);
    assert_eq!(h.store.audit_count(), 1);
}

#[tokio::test]
async fn admin_cancellation_bypasses_cutoff_with_override_audit() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server, false).await;

    let appointment = h
        .service
        .book_appointment(h.booking_request(2), &h.patient_actor())
        .await
        .expect("booking should succeed");

    let cancelled = h
        .service
        .cancel_appointment(appointment.id, &h.admin_actor(), Some("clinic closure".to_string()))
        .await
        .expect("admin cancellation should bypass the cutoff");
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    let trail = h
        .service
        .get_audit_trail(appointment.id, &h.admin_actor())
        .await
        .unwrap();
    let cancel_entry = trail.last().unwrap();
    assert_eq!(cancel_entry.action, AuditAction::Cancel);
    assert!(cancel_entry
        .details
        .as_deref()
        .unwrap_or_default()
        .contains("admin override"));
}

#[tokio::test]
async fn unrelated_patient_cannot_cancel() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server, false).await;

    let appointment = h
        .service
        .book_appointment(h.booking_request(72), &h.patient_actor())
        .await
        .unwrap();

    let stranger = Actor::new(Uuid::new_v4(), ActorRole::Patient);
    let result = h
        .service
        .cancel_appointment(appointment.id, &stranger, None)
        .await;
    assert_matches!(result, Err(AppointmentError::Unauthorized));

    let reloaded = h
        .service
        .get_appointment(appointment.id, &h.patient_actor())
        .await
        .unwrap();
    assert_eq!(reloaded.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn doctor_confirms_then_completes_with_audit_trail() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server, false).await;

    let appointment = h
        .service
        .book_appointment(h.booking_request(72), &h.patient_actor())
        .await
        .unwrap();

    let confirmed = h
        .service
        .update_status(appointment.id, "confirmed", &h.doctor_actor(), None)
        .await
        .expect("doctor should confirm");
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    let completed = h
        .service
        .update_status(appointment.id, "completed", &h.doctor_actor(), None)
        .await
        .expect("doctor should complete");
    assert_eq!(completed.status, AppointmentStatus::Completed);

    let trail = h
        .service
        .get_audit_trail(appointment.id, &h.doctor_actor())
        .await
        .unwrap();
    let actions: Vec<AuditAction> = trail.iter().map(|entry| entry.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::Create, AuditAction::Confirm, AuditAction::Complete]
    );
}

#[tokio::test]
async fn patient_cannot_confirm_appointment() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server, false).await;

    let appointment = h
        .service
        .book_appointment(h.booking_request(72), &h.patient_actor())
        .await
        .unwrap();

    let result = h
        .service
        .update_status(appointment.id, "confirmed", &h.patient_actor(), None)
        .await;
    assert_matches!(result, Err(AppointmentError::Unauthorized));

    let reloaded = h
        .service
        .get_appointment(appointment.id, &h.patient_actor())
        .await
        .unwrap();
    assert_eq!(reloaded.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn pending_appointment_cannot_be_completed() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server, false).await;

    let appointment = h
        .service
        .book_appointment(h.booking_request(72), &h.patient_actor())
        .await
        .unwrap();

    let result = h
        .service
        .update_status(appointment.id, "completed", &h.doctor_actor(), None)
        .await;
    assert_matches!(result, Err(AppointmentError::InvalidState(_)));
    assert_eq!(h.store.audit_count(), 1);
}

#[tokio::test]
async fn unknown_status_string_is_rejected() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server, false).await;

    let appointment = h
        .service
        .book_appointment(h.booking_request(72), &h.patient_actor())
        .await
        .unwrap();

    let result = h
        .service
        .update_status(appointment.id, "no_show", &h.doctor_actor(), None)
        .await;
    assert_matches!(result, Err(AppointmentError::UnsupportedStatus(ref s)) if s == "no_show");

    let reloaded = h
        .service
        .get_appointment(appointment.id, &h.patient_actor())
        .await
        .unwrap();
    assert_eq!(reloaded.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn missing_appointment_is_not_found() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server, false).await;

    let result = h
        .service
        .cancel_appointment(Uuid::new_v4(), &h.admin_actor(), None)
        .await;
    assert_matches!(result, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn notification_outage_does_not_fail_booking() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/patients/{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockCollaboratorResponses::patient_profile(&patient_id.to_string(), true),
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/doctors/{}/availability", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockCollaboratorResponses::doctor_availability(true, false, "Dr. Test"),
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/notifications"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = collaborator_config(&mock_server);
    let store = Arc::new(MemoryAppointmentStore::new());
    let service = AppointmentBookingService::with_store(&config, store.clone());

    let request = BookAppointmentRequest {
        patient_id,
        doctor_id,
        scheduled_time: Utc::now() + Duration::hours(72),
        duration_minutes: 30,
        notes: None,
    };
    let actor = Actor::new(patient_id, ActorRole::Patient);

    let appointment = service
        .book_appointment(request, &actor)
        .await
        .expect("booking must not depend on notification delivery");
    assert_eq!(appointment.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn patient_listing_is_scoped_to_the_requester() {
    let mock_server = MockServer::start().await;
    let h = harness(&mock_server, false).await;

    h.service
        .book_appointment(h.booking_request(72), &h.patient_actor())
        .await
        .unwrap();

    let own = h
        .service
        .list_for_patient(h.patient_id, &h.patient_actor())
        .await
        .expect("patient should list own appointments");
    assert_eq!(own.len(), 1);

    let stranger = Actor::new(Uuid::new_v4(), ActorRole::Patient);
    let result = h.service.list_for_patient(h.patient_id, &stranger).await;
    assert_matches!(result, Err(AppointmentError::Unauthorized));
}
