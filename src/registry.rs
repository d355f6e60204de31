//! Appointment registry: the one place that writes doctors, patients and
//! appointments, and the owner of the double-booking rule.
//!
//! A doctor holds at most one appointment per (date, time). The registry
//! checks this before every write so callers get a `DoubleBooking` naming the
//! slot; the store's unique constraint stays authoritative and turns a lost
//! race into `UniqueViolation`.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{FieldError, RegistryError};
use crate::models::{
    Appointment, AppointmentDraft, AppointmentFilter, Doctor, DoctorFilter, Patient, PatientFilter,
    doctor_title,
};
use crate::store::{
    APPOINTMENT_SLOT_KEY, DOCTOR_EMAIL_KEY, PATIENT_EMAIL_KEY, Store, StoreError,
};
use crate::validation::{
    AppointmentPayload, AppointmentSnapshot, DoctorPayload, PatientPayload, WriteMode,
};

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Whether an update replaces the record (PUT) or merges into it (PATCH).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Replace,
    Partial,
}

/// What a delete removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Removed {
    pub name: String,
    pub appointments: Vec<Uuid>,
}

#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn Store>,
}

fn store_err(e: StoreError) -> RegistryError {
    match e {
        StoreError::UniqueViolation { constraint } => match constraint.as_str() {
            DOCTOR_EMAIL_KEY => RegistryError::UniqueViolation {
                field: Some("email"),
                message: "doctor with this email already exists.".into(),
            },
            PATIENT_EMAIL_KEY => RegistryError::UniqueViolation {
                field: Some("email"),
                message: "patient with this email already exists.".into(),
            },
            APPOINTMENT_SLOT_KEY => RegistryError::UniqueViolation {
                field: None,
                message: "This doctor already has an appointment at this date and time.".into(),
            },
            other => RegistryError::UniqueViolation {
                field: None,
                message: format!("unique constraint {other} violated"),
            },
        },
        StoreError::MissingReference { entity } => RegistryError::Validation(vec![FieldError::new(
            entity,
            format!("{entity} does not exist."),
        )]),
        StoreError::Backend(msg) => RegistryError::Storage(msg),
    }
}

impl Registry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /* ---------- doctors ---------- */

    pub async fn create_doctor(&self, payload: DoctorPayload) -> RegistryResult<Doctor> {
        let draft = payload.resolve(WriteMode::Create)?;
        let doctor = self.store.insert_doctor(&draft).await.map_err(store_err)?;
        info!(doctor_id = %doctor.id, "doctor created");
        Ok(doctor)
    }

    pub async fn get_doctor(&self, id: Uuid) -> RegistryResult<Doctor> {
        self.store
            .get_doctor(id)
            .await
            .map_err(store_err)?
            .ok_or(RegistryError::NotFound { entity: "doctor" })
    }

    pub async fn list_doctors(&self, filter: &DoctorFilter) -> RegistryResult<Vec<Doctor>> {
        self.store.list_doctors(filter).await.map_err(store_err)
    }

    pub async fn update_doctor(
        &self,
        id: Uuid,
        payload: DoctorPayload,
        kind: UpdateKind,
    ) -> RegistryResult<Doctor> {
        let existing = self.get_doctor(id).await?;
        let draft = match kind {
            UpdateKind::Replace => payload.resolve(WriteMode::Replace(&existing))?,
            UpdateKind::Partial => payload.resolve(WriteMode::Patch(&existing))?,
        };
        self.store
            .update_doctor(id, &draft)
            .await
            .map_err(store_err)?
            .ok_or(RegistryError::NotFound { entity: "doctor" })
    }

    /// Removes every appointment booked with the doctor.
    pub async fn cascade_doctor_appointments(&self, doctor_id: Uuid) -> RegistryResult<Vec<Uuid>> {
        let removed = self
            .store
            .delete_appointments_for_doctor(doctor_id)
            .await
            .map_err(store_err)?;
        if !removed.is_empty() {
            info!(%doctor_id, count = removed.len(), "cascaded appointment removal for doctor");
        }
        Ok(removed)
    }

    pub async fn delete_doctor(&self, id: Uuid) -> RegistryResult<Removed> {
        let doctor = self.get_doctor(id).await?;
        let appointments = self.cascade_doctor_appointments(id).await?;
        if !self.store.delete_doctor(id).await.map_err(store_err)? {
            return Err(RegistryError::NotFound { entity: "doctor" });
        }
        info!(doctor_id = %id, "doctor deleted");
        Ok(Removed {
            name: doctor.name,
            appointments,
        })
    }

    /* ---------- patients ---------- */

    pub async fn create_patient(&self, payload: PatientPayload) -> RegistryResult<Patient> {
        let draft = payload.resolve(WriteMode::Create)?;
        let patient = self.store.insert_patient(&draft).await.map_err(store_err)?;
        info!(patient_id = %patient.id, "patient created");
        Ok(patient)
    }

    pub async fn get_patient(&self, id: Uuid) -> RegistryResult<Patient> {
        self.store
            .get_patient(id)
            .await
            .map_err(store_err)?
            .ok_or(RegistryError::NotFound { entity: "patient" })
    }

    pub async fn list_patients(&self, filter: &PatientFilter) -> RegistryResult<Vec<Patient>> {
        self.store.list_patients(filter).await.map_err(store_err)
    }

    pub async fn update_patient(
        &self,
        id: Uuid,
        payload: PatientPayload,
        kind: UpdateKind,
    ) -> RegistryResult<Patient> {
        let existing = self.get_patient(id).await?;
        let draft = match kind {
            UpdateKind::Replace => payload.resolve(WriteMode::Replace(&existing))?,
            UpdateKind::Partial => payload.resolve(WriteMode::Patch(&existing))?,
        };
        self.store
            .update_patient(id, &draft)
            .await
            .map_err(store_err)?
            .ok_or(RegistryError::NotFound { entity: "patient" })
    }

    /// Removes every appointment booked for the patient.
    pub async fn cascade_patient_appointments(&self, patient_id: Uuid) -> RegistryResult<Vec<Uuid>> {
        let removed = self
            .store
            .delete_appointments_for_patient(patient_id)
            .await
            .map_err(store_err)?;
        if !removed.is_empty() {
            info!(%patient_id, count = removed.len(), "cascaded appointment removal for patient");
        }
        Ok(removed)
    }

    pub async fn delete_patient(&self, id: Uuid) -> RegistryResult<Removed> {
        let patient = self.get_patient(id).await?;
        let appointments = self.cascade_patient_appointments(id).await?;
        if !self.store.delete_patient(id).await.map_err(store_err)? {
            return Err(RegistryError::NotFound { entity: "patient" });
        }
        info!(patient_id = %id, "patient deleted");
        Ok(Removed {
            name: patient.name,
            appointments,
        })
    }

    /* ---------- appointments ---------- */

    /// Fails with `DoubleBooking` when another appointment (other than
    /// `exclude`) already holds the doctor's slot.
    pub async fn ensure_slot_free(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> RegistryResult<()> {
        let holder = self
            .store
            .find_slot_holder(doctor.id, date, time, exclude)
            .await
            .map_err(store_err)?;
        if let Some(existing) = holder {
            warn!(doctor_id = %doctor.id, %date, %time, %existing, "double booking rejected");
            return Err(RegistryError::DoubleBooking {
                doctor: doctor_title(&doctor.name),
                date,
                time,
            });
        }
        Ok(())
    }

    /// Resolves the referenced doctor and patient, reporting missing ones as field errors.
    async fn check_references(&self, draft: &AppointmentDraft) -> RegistryResult<Doctor> {
        let doctor = self.store.get_doctor(draft.doctor_id).await.map_err(store_err)?;
        let patient = self.store.get_patient(draft.patient_id).await.map_err(store_err)?;

        let mut errors = Vec::new();
        if patient.is_none() {
            errors.push(FieldError::new(
                "patient",
                format!("Invalid pk \"{}\" - object does not exist.", draft.patient_id),
            ));
        }
        match doctor {
            Some(doctor) if errors.is_empty() => Ok(doctor),
            Some(_) => Err(RegistryError::Validation(errors)),
            None => {
                errors.insert(
                    0,
                    FieldError::new(
                        "doctor",
                        format!("Invalid pk \"{}\" - object does not exist.", draft.doctor_id),
                    ),
                );
                Err(RegistryError::Validation(errors))
            }
        }
    }

    pub async fn create_appointment(&self, payload: AppointmentPayload) -> RegistryResult<Appointment> {
        let draft = payload.resolve(WriteMode::Create)?;
        let doctor = self.check_references(&draft).await?;
        self.ensure_slot_free(&doctor, draft.date, draft.time, None).await?;

        let appointment = self.store.insert_appointment(&draft).await.map_err(|e| {
            if matches!(&e, StoreError::UniqueViolation { constraint } if constraint == APPOINTMENT_SLOT_KEY) {
                warn!(doctor_id = %draft.doctor_id, "slot taken concurrently");
            }
            store_err(e)
        })?;
        info!(appointment_id = %appointment.id, doctor_id = %appointment.doctor_id, "appointment booked");
        Ok(appointment)
    }

    pub async fn get_appointment(&self, id: Uuid) -> RegistryResult<Appointment> {
        self.store
            .get_appointment(id)
            .await
            .map_err(store_err)?
            .ok_or(RegistryError::NotFound { entity: "appointment" })
    }

    pub async fn list_appointments(&self, filter: &AppointmentFilter) -> RegistryResult<Vec<Appointment>> {
        self.store.list_appointments(filter).await.map_err(store_err)
    }

    pub async fn update_appointment(
        &self,
        id: Uuid,
        payload: AppointmentPayload,
        kind: UpdateKind,
    ) -> RegistryResult<Appointment> {
        let existing = self.get_appointment(id).await?;
        let snapshot = AppointmentSnapshot {
            doctor_id: existing.doctor_id,
            patient_id: existing.patient_id,
            date: existing.date,
            time: existing.time,
            status: existing.status,
            notes: existing.notes,
        };
        let draft = match kind {
            UpdateKind::Replace => payload.resolve(WriteMode::Replace(&snapshot))?,
            UpdateKind::Partial => payload.resolve(WriteMode::Patch(&snapshot))?,
        };
        let doctor = self.check_references(&draft).await?;
        self.ensure_slot_free(&doctor, draft.date, draft.time, Some(id)).await?;

        self.store
            .update_appointment(id, &draft)
            .await
            .map_err(store_err)?
            .ok_or(RegistryError::NotFound { entity: "appointment" })
    }

    pub async fn delete_appointment(&self, id: Uuid) -> RegistryResult<()> {
        if !self.store.delete_appointment(id).await.map_err(store_err)? {
            return Err(RegistryError::NotFound { entity: "appointment" });
        }
        info!(appointment_id = %id, "appointment deleted");
        Ok(())
    }
}
