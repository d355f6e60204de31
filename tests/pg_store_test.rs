// Runs against a real Postgres only when TEST_DATABASE_URL is set; the
// database is migrated and each test writes rows with fresh unique emails.

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use clinic_booking::db::connect_pg;
use clinic_booking::models::{
    AppointmentDraft, AppointmentStatus, Doctor, DoctorDraft, DoctorFilter, Gender, Patient,
    PatientDraft, Specialization,
};
use clinic_booking::store::{APPOINTMENT_SLOT_KEY, DOCTOR_EMAIL_KEY, PgStore, Store, StoreError};

async fn pg_store() -> Option<PgStore> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        println!("skipping Postgres store tests (set TEST_DATABASE_URL to enable)");
        return None;
    };
    let pool = connect_pg(&url, 2).await.expect("connect to TEST_DATABASE_URL");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("apply migrations");
    Some(PgStore::new(pool))
}

fn doctor_draft(name: &str) -> DoctorDraft {
    DoctorDraft {
        name: name.into(),
        specialization: Specialization::Cardiology,
        phone: "555-0100".into(),
        email: format!("{}@test.example.com", Uuid::new_v4()),
    }
}

async fn seed(store: &PgStore) -> (Doctor, Patient) {
    let doctor = store.insert_doctor(&doctor_draft("Smith")).await.unwrap();
    let patient = store
        .insert_patient(&PatientDraft {
            name: "Jane".into(),
            age: 40,
            gender: Gender::Female,
            phone: "555-0199".into(),
            email: format!("{}@test.example.com", Uuid::new_v4()),
            address: String::new(),
        })
        .await
        .unwrap();
    (doctor, patient)
}

fn slot(doctor: &Doctor, patient: &Patient) -> AppointmentDraft {
    AppointmentDraft {
        doctor_id: doctor.id,
        patient_id: patient.id,
        date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        status: AppointmentStatus::Scheduled,
        notes: String::new(),
    }
}

#[tokio::test]
async fn slot_constraint_surfaces_by_name() {
    let Some(store) = pg_store().await else { return };
    let (doctor, patient) = seed(&store).await;

    let first = store.insert_appointment(&slot(&doctor, &patient)).await.unwrap();
    assert_eq!(first.doctor_name, "Smith");
    assert_eq!(first.patient_name, "Jane");

    let err = store.insert_appointment(&slot(&doctor, &patient)).await.unwrap_err();
    assert_matches!(err, StoreError::UniqueViolation { ref constraint } if constraint == APPOINTMENT_SLOT_KEY);

    let holder = store
        .find_slot_holder(doctor.id, first.date, first.time, None)
        .await
        .unwrap();
    assert_eq!(holder, Some(first.id));
    let excluded = store
        .find_slot_holder(doctor.id, first.date, first.time, Some(first.id))
        .await
        .unwrap();
    assert_eq!(excluded, None);

    assert!(store.delete_doctor(doctor.id).await.unwrap());
    assert_eq!(store.get_appointment(first.id).await.unwrap(), None);
}

#[tokio::test]
async fn missing_references_name_the_entity() {
    let Some(store) = pg_store().await else { return };
    let (doctor, patient) = seed(&store).await;

    let mut draft = slot(&doctor, &patient);
    draft.doctor_id = Uuid::new_v4();
    let err = store.insert_appointment(&draft).await.unwrap_err();
    assert_matches!(err, StoreError::MissingReference { entity: "doctor" });

    let mut draft = slot(&doctor, &patient);
    draft.patient_id = Uuid::new_v4();
    let err = store.insert_appointment(&draft).await.unwrap_err();
    assert_matches!(err, StoreError::MissingReference { entity: "patient" });
}

#[tokio::test]
async fn duplicate_email_and_literal_search() {
    let Some(store) = pg_store().await else { return };
    let draft = doctor_draft("Plain Name");
    store.insert_doctor(&draft).await.unwrap();

    let err = store.insert_doctor(&draft).await.unwrap_err();
    assert_matches!(err, StoreError::UniqueViolation { ref constraint } if constraint == DOCTOR_EMAIL_KEY);

    let hits = store
        .list_doctors(&DoctorFilter {
            // `_` would match the dots as a LIKE wildcard.
            search: Some(draft.email.replace('.', "_")),
            specialization: None,
        })
        .await
        .unwrap();
    assert!(hits.is_empty());

    let hits = store
        .list_doctors(&DoctorFilter {
            search: Some(draft.email.to_uppercase()),
            specialization: None,
        })
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
}
