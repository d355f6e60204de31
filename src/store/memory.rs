use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    APPOINTMENT_SLOT_KEY, DOCTOR_EMAIL_KEY, PATIENT_EMAIL_KEY, Store, StoreError, StoreResult,
};
use crate::models::{
    Appointment, AppointmentDraft, AppointmentFilter, AppointmentOrder, AppointmentStatus, Doctor,
    DoctorDraft, DoctorFilter, Patient, PatientDraft, PatientFilter,
};

/// Process-local store. Every write takes the table lock, so the unique
/// checks here are atomic with the insert they guard.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    doctors: HashMap<Uuid, Doctor>,
    patients: HashMap<Uuid, Patient>,
    appointments: HashMap<Uuid, AppointmentRecord>,
}

#[derive(Debug, Clone)]
struct AppointmentRecord {
    id: Uuid,
    doctor_id: Uuid,
    patient_id: Uuid,
    date: NaiveDate,
    time: NaiveTime,
    status: AppointmentStatus,
    notes: String,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unique(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl Tables {
    fn check_references(&self, draft: &AppointmentDraft) -> StoreResult<()> {
        if !self.doctors.contains_key(&draft.doctor_id) {
            return Err(StoreError::MissingReference { entity: "doctor" });
        }
        if !self.patients.contains_key(&draft.patient_id) {
            return Err(StoreError::MissingReference { entity: "patient" });
        }
        Ok(())
    }

    fn slot_holder(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Option<Uuid> {
        self.appointments
            .values()
            .find(|a| {
                a.doctor_id == doctor_id
                    && a.date == date
                    && a.time == time
                    && Some(a.id) != exclude
            })
            .map(|a| a.id)
    }

    fn join(&self, rec: &AppointmentRecord) -> StoreResult<Appointment> {
        let doctor = self
            .doctors
            .get(&rec.doctor_id)
            .ok_or(StoreError::MissingReference { entity: "doctor" })?;
        let patient = self
            .patients
            .get(&rec.patient_id)
            .ok_or(StoreError::MissingReference { entity: "patient" })?;
        Ok(Appointment {
            id: rec.id,
            doctor_id: rec.doctor_id,
            doctor_name: doctor.name.clone(),
            doctor_specialization: doctor.specialization,
            patient_id: rec.patient_id,
            patient_name: patient.name.clone(),
            date: rec.date,
            time: rec.time,
            status: rec.status,
            notes: rec.notes.clone(),
            created_at: rec.created_at,
            updated_at: rec.updated_at,
        })
    }

    fn remove_appointments_where(&mut self, pred: impl Fn(&AppointmentRecord) -> bool) -> Vec<Uuid> {
        let ids: Vec<Uuid> = self
            .appointments
            .values()
            .filter(|a| pred(a))
            .map(|a| a.id)
            .collect();
        for id in &ids {
            self.appointments.remove(id);
        }
        ids
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_doctor(&self, draft: &DoctorDraft) -> StoreResult<Doctor> {
        let mut t = self.tables.write().await;
        if t.doctors.values().any(|d| d.email == draft.email) {
            return Err(unique(DOCTOR_EMAIL_KEY));
        }
        let now = Utc::now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: draft.name.clone(),
            specialization: draft.specialization,
            phone: draft.phone.clone(),
            email: draft.email.clone(),
            created_at: now,
            updated_at: now,
        };
        t.doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    async fn get_doctor(&self, id: Uuid) -> StoreResult<Option<Doctor>> {
        Ok(self.tables.read().await.doctors.get(&id).cloned())
    }

    async fn list_doctors(&self, filter: &DoctorFilter) -> StoreResult<Vec<Doctor>> {
        let t = self.tables.read().await;
        let mut out: Vec<Doctor> = t
            .doctors
            .values()
            .filter(|d| filter.specialization.is_none_or(|s| d.specialization == s))
            .filter(|d| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|q| contains_ci(&d.name, q) || contains_ci(&d.email, q))
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(out)
    }

    async fn update_doctor(&self, id: Uuid, draft: &DoctorDraft) -> StoreResult<Option<Doctor>> {
        let mut t = self.tables.write().await;
        if t.doctors.values().any(|d| d.id != id && d.email == draft.email) {
            return Err(unique(DOCTOR_EMAIL_KEY));
        }
        let Some(doctor) = t.doctors.get_mut(&id) else {
            return Ok(None);
        };
        doctor.name = draft.name.clone();
        doctor.specialization = draft.specialization;
        doctor.phone = draft.phone.clone();
        doctor.email = draft.email.clone();
        doctor.updated_at = Utc::now();
        Ok(Some(doctor.clone()))
    }

    async fn delete_doctor(&self, id: Uuid) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        if t.doctors.remove(&id).is_none() {
            return Ok(false);
        }
        t.remove_appointments_where(|a| a.doctor_id == id);
        Ok(true)
    }

    async fn insert_patient(&self, draft: &PatientDraft) -> StoreResult<Patient> {
        let mut t = self.tables.write().await;
        if t.patients.values().any(|p| p.email == draft.email) {
            return Err(unique(PATIENT_EMAIL_KEY));
        }
        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            name: draft.name.clone(),
            age: draft.age,
            gender: draft.gender,
            phone: draft.phone.clone(),
            email: draft.email.clone(),
            address: draft.address.clone(),
            created_at: now,
            updated_at: now,
        };
        t.patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    async fn get_patient(&self, id: Uuid) -> StoreResult<Option<Patient>> {
        Ok(self.tables.read().await.patients.get(&id).cloned())
    }

    async fn list_patients(&self, filter: &PatientFilter) -> StoreResult<Vec<Patient>> {
        let t = self.tables.read().await;
        let mut out: Vec<Patient> = t
            .patients
            .values()
            .filter(|p| filter.gender.is_none_or(|g| p.gender == g))
            .filter(|p| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|q| contains_ci(&p.name, q) || contains_ci(&p.email, q))
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(out)
    }

    async fn update_patient(&self, id: Uuid, draft: &PatientDraft) -> StoreResult<Option<Patient>> {
        let mut t = self.tables.write().await;
        if t.patients.values().any(|p| p.id != id && p.email == draft.email) {
            return Err(unique(PATIENT_EMAIL_KEY));
        }
        let Some(patient) = t.patients.get_mut(&id) else {
            return Ok(None);
        };
        patient.name = draft.name.clone();
        patient.age = draft.age;
        patient.gender = draft.gender;
        patient.phone = draft.phone.clone();
        patient.email = draft.email.clone();
        patient.address = draft.address.clone();
        patient.updated_at = Utc::now();
        Ok(Some(patient.clone()))
    }

    async fn delete_patient(&self, id: Uuid) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        if t.patients.remove(&id).is_none() {
            return Ok(false);
        }
        t.remove_appointments_where(|a| a.patient_id == id);
        Ok(true)
    }

    async fn insert_appointment(&self, draft: &AppointmentDraft) -> StoreResult<Appointment> {
        let mut t = self.tables.write().await;
        t.check_references(draft)?;
        if t.slot_holder(draft.doctor_id, draft.date, draft.time, None).is_some() {
            return Err(unique(APPOINTMENT_SLOT_KEY));
        }
        let now = Utc::now();
        let rec = AppointmentRecord {
            id: Uuid::new_v4(),
            doctor_id: draft.doctor_id,
            patient_id: draft.patient_id,
            date: draft.date,
            time: draft.time,
            status: draft.status,
            notes: draft.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        let joined = t.join(&rec)?;
        t.appointments.insert(rec.id, rec);
        Ok(joined)
    }

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        let t = self.tables.read().await;
        t.appointments.get(&id).map(|rec| t.join(rec)).transpose()
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        let t = self.tables.read().await;
        let mut out = Vec::new();
        for rec in t.appointments.values() {
            if filter.doctor_id.is_some_and(|d| rec.doctor_id != d)
                || filter.patient_id.is_some_and(|p| rec.patient_id != p)
                || filter.status.is_some_and(|s| rec.status != s)
                || filter.date.is_some_and(|d| rec.date != d)
            {
                continue;
            }
            let a = t.join(rec)?;
            if let Some(q) = filter.search.as_deref() {
                if !contains_ci(&a.doctor_name, q) && !contains_ci(&a.patient_name, q) {
                    continue;
                }
            }
            out.push(a);
        }
        // Slot order follows the filter; ties within a slot stay oldest booking first.
        out.sort_by(|a, b| {
            let slot = (a.date, a.time).cmp(&(b.date, b.time));
            let slot = match filter.order {
                AppointmentOrder::Newest => slot.reverse(),
                AppointmentOrder::Oldest => slot,
            };
            slot.then(a.created_at.cmp(&b.created_at)).then(a.id.cmp(&b.id))
        });
        Ok(out)
    }

    async fn update_appointment(
        &self,
        id: Uuid,
        draft: &AppointmentDraft,
    ) -> StoreResult<Option<Appointment>> {
        let mut t = self.tables.write().await;
        if !t.appointments.contains_key(&id) {
            return Ok(None);
        }
        t.check_references(draft)?;
        if t.slot_holder(draft.doctor_id, draft.date, draft.time, Some(id)).is_some() {
            return Err(unique(APPOINTMENT_SLOT_KEY));
        }
        let Some(rec) = t.appointments.get_mut(&id) else {
            return Ok(None);
        };
        rec.doctor_id = draft.doctor_id;
        rec.patient_id = draft.patient_id;
        rec.date = draft.date;
        rec.time = draft.time;
        rec.status = draft.status;
        rec.notes = draft.notes.clone();
        rec.updated_at = Utc::now();
        let rec = rec.clone();
        t.join(&rec).map(Some)
    }

    async fn delete_appointment(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.appointments.remove(&id).is_some())
    }

    async fn find_slot_holder(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> StoreResult<Option<Uuid>> {
        Ok(self.tables.read().await.slot_holder(doctor_id, date, time, exclude))
    }

    async fn delete_appointments_for_doctor(&self, doctor_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut t = self.tables.write().await;
        Ok(t.remove_appointments_where(|a| a.doctor_id == doctor_id))
    }

    async fn delete_appointments_for_patient(&self, patient_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut t = self.tables.write().await;
        Ok(t.remove_appointments_where(|a| a.patient_id == patient_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, Specialization};
    use assert_matches::assert_matches;

    fn doctor(email: &str) -> DoctorDraft {
        DoctorDraft {
            name: "Ada Lovelace".into(),
            specialization: Specialization::Neurology,
            phone: "555-0100".into(),
            email: email.into(),
        }
    }

    fn patient(email: &str) -> PatientDraft {
        PatientDraft {
            name: "Bob".into(),
            age: 31,
            gender: Gender::Male,
            phone: "555-0101".into(),
            email: email.into(),
            address: String::new(),
        }
    }

    #[tokio::test]
    async fn slot_constraint_rejects_direct_duplicate_insert() {
        let store = MemoryStore::new();
        let d = store.insert_doctor(&doctor("a@x.com")).await.unwrap();
        let p = store.insert_patient(&patient("b@x.com")).await.unwrap();
        let draft = AppointmentDraft {
            doctor_id: d.id,
            patient_id: p.id,
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            status: AppointmentStatus::Scheduled,
            notes: String::new(),
        };
        store.insert_appointment(&draft).await.unwrap();

        let err = store.insert_appointment(&draft).await.unwrap_err();
        assert_matches!(err, StoreError::UniqueViolation { constraint } if constraint == APPOINTMENT_SLOT_KEY);
    }

    #[tokio::test]
    async fn appointment_insert_requires_existing_references() {
        let store = MemoryStore::new();
        let d = store.insert_doctor(&doctor("a@x.com")).await.unwrap();
        let draft = AppointmentDraft {
            doctor_id: d.id,
            patient_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            status: AppointmentStatus::Scheduled,
            notes: String::new(),
        };
        let err = store.insert_appointment(&draft).await.unwrap_err();
        assert_matches!(err, StoreError::MissingReference { entity: "patient" });
    }

    #[tokio::test]
    async fn deleting_patient_cascades_at_storage_level() {
        let store = MemoryStore::new();
        let d = store.insert_doctor(&doctor("a@x.com")).await.unwrap();
        let p = store.insert_patient(&patient("b@x.com")).await.unwrap();
        let appt = store
            .insert_appointment(&AppointmentDraft {
                doctor_id: d.id,
                patient_id: p.id,
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                status: AppointmentStatus::Scheduled,
                notes: String::new(),
            })
            .await
            .unwrap();

        assert!(store.delete_patient(p.id).await.unwrap());
        assert_eq!(store.get_appointment(appt.id).await.unwrap(), None);
        assert!(!store.delete_patient(p.id).await.unwrap());
    }

    #[tokio::test]
    async fn doctor_search_is_case_insensitive_and_sorted_by_name() {
        let store = MemoryStore::new();
        let mut zed = doctor("z@x.com");
        zed.name = "Zed".into();
        store.insert_doctor(&zed).await.unwrap();
        store.insert_doctor(&doctor("ada@x.com")).await.unwrap();

        let all = store.list_doctors(&DoctorFilter::default()).await.unwrap();
        let names: Vec<&str> = all.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Ada Lovelace", "Zed"]);

        let hits = store
            .list_doctors(&DoctorFilter {
                search: Some("LOVE".into()),
                specialization: None,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn search_wildcards_match_literally() {
        let store = MemoryStore::new();
        store.insert_doctor(&doctor("ada@x.com")).await.unwrap();
        store.insert_patient(&patient("bob@x.com")).await.unwrap();

        for q in ["_", "%", "\\"] {
            let doctors = store
                .list_doctors(&DoctorFilter {
                    search: Some(q.into()),
                    specialization: None,
                })
                .await
                .unwrap();
            assert!(doctors.is_empty(), "{q:?} matched a doctor");
            let patients = store
                .list_patients(&PatientFilter {
                    search: Some(q.into()),
                    gender: None,
                })
                .await
                .unwrap();
            assert!(patients.is_empty(), "{q:?} matched a patient");
        }
    }

    #[tokio::test]
    async fn shared_slot_listing_is_stable() {
        let store = MemoryStore::new();
        let p = store.insert_patient(&patient("b@x.com")).await.unwrap();
        let mut ids = Vec::new();
        for i in 0..4 {
            let d = store.insert_doctor(&doctor(&format!("d{i}@x.com"))).await.unwrap();
            let a = store
                .insert_appointment(&AppointmentDraft {
                    doctor_id: d.id,
                    patient_id: p.id,
                    date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                    time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    status: AppointmentStatus::Scheduled,
                    notes: String::new(),
                })
                .await
                .unwrap();
            ids.push(a.id);
        }

        let order = |list: Vec<Appointment>| list.into_iter().map(|a| a.id).collect::<Vec<_>>();
        let first = order(store.list_appointments(&AppointmentFilter::default()).await.unwrap());
        assert_eq!(first.len(), 4);
        for _ in 0..5 {
            let again = order(store.list_appointments(&AppointmentFilter::default()).await.unwrap());
            assert_eq!(again, first);
        }
        let oldest = order(
            store
                .list_appointments(&AppointmentFilter {
                    order: AppointmentOrder::Oldest,
                    ..Default::default()
                })
                .await
                .unwrap(),
        );
        assert_eq!(oldest, first, "ties keep booking order in both directions");
    }
}
