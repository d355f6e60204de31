//! Persistence seam for the registry.
//!
//! Both backends enforce the same storage rules: unique emails per table, a
//! unique (doctor, date, time) slot for appointments, and cascading removal
//! of appointments when their doctor or patient is deleted.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentDraft, AppointmentFilter, Doctor, DoctorDraft, DoctorFilter, Patient,
    PatientDraft, PatientFilter,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Names of the storage-level unique constraints.
pub const DOCTOR_EMAIL_KEY: &str = "doctor_email_key";
pub const PATIENT_EMAIL_KEY: &str = "patient_email_key";
pub const APPOINTMENT_SLOT_KEY: &str = "appointment_doctor_date_time_key";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint {constraint} violated")]
    UniqueViolation { constraint: String },

    #[error("referenced {entity} does not exist")]
    MissingReference { entity: &'static str },

    #[error("{0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_doctor(&self, draft: &DoctorDraft) -> StoreResult<Doctor>;
    async fn get_doctor(&self, id: Uuid) -> StoreResult<Option<Doctor>>;
    async fn list_doctors(&self, filter: &DoctorFilter) -> StoreResult<Vec<Doctor>>;
    async fn update_doctor(&self, id: Uuid, draft: &DoctorDraft) -> StoreResult<Option<Doctor>>;
    /// Returns false when no row had this id.
    async fn delete_doctor(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_patient(&self, draft: &PatientDraft) -> StoreResult<Patient>;
    async fn get_patient(&self, id: Uuid) -> StoreResult<Option<Patient>>;
    async fn list_patients(&self, filter: &PatientFilter) -> StoreResult<Vec<Patient>>;
    async fn update_patient(&self, id: Uuid, draft: &PatientDraft) -> StoreResult<Option<Patient>>;
    async fn delete_patient(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_appointment(&self, draft: &AppointmentDraft) -> StoreResult<Appointment>;
    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>>;
    async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>>;
    async fn update_appointment(
        &self,
        id: Uuid,
        draft: &AppointmentDraft,
    ) -> StoreResult<Option<Appointment>>;
    async fn delete_appointment(&self, id: Uuid) -> StoreResult<bool>;

    /// Id of an appointment already holding this doctor's slot, ignoring `exclude`.
    async fn find_slot_holder(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> StoreResult<Option<Uuid>>;

    /// Removes every appointment for the doctor and returns the removed ids.
    async fn delete_appointments_for_doctor(&self, doctor_id: Uuid) -> StoreResult<Vec<Uuid>>;
    async fn delete_appointments_for_patient(&self, patient_id: Uuid) -> StoreResult<Vec<Uuid>>;
}
