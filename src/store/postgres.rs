use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::{
    Appointment, AppointmentDraft, AppointmentFilter, AppointmentOrder, AppointmentRow, Doctor,
    DoctorDraft, DoctorFilter, DoctorRow, Patient, PatientDraft, PatientFilter, PatientRow,
    UnknownChoice,
};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    if let Some(dbe) = e.as_database_error() {
        let constraint = dbe.constraint().unwrap_or_default().to_string();
        if dbe.is_unique_violation() {
            return StoreError::UniqueViolation { constraint };
        }
        if dbe.is_foreign_key_violation() {
            let entity = if constraint.contains("doctor") { "doctor" } else { "patient" };
            return StoreError::MissingReference { entity };
        }
    }
    StoreError::Backend(format!("db error: {e}"))
}

fn decode_err(e: UnknownChoice) -> StoreError {
    StoreError::Backend(format!("row decode error: {e}"))
}

/// Substring pattern for `ILIKE`, with the search text taken literally.
fn like_pattern(search: &Option<String>) -> Option<String> {
    search.as_deref().map(|q| {
        let escaped = q
            .trim()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        format!("%{escaped}%")
    })
}

const DOCTOR_COLUMNS: &str = "doctor_id, name, specialization, phone, email, created_at, updated_at";
const PATIENT_COLUMNS: &str =
    "patient_id, name, age, gender, phone, email, address, created_at, updated_at";

// `a` may be the appointment table or a CTE over it.
const APPOINTMENT_JOIN: &str = r#"
    SELECT
      a.appointment_id,
      a.doctor_id,
      d.name AS doctor_name,
      d.specialization AS doctor_specialization,
      a.patient_id,
      p.name AS patient_name,
      a.date,
      a.time,
      a.status,
      a.notes,
      a.created_at,
      a.updated_at
    FROM {source} a
    JOIN doctor d ON d.doctor_id = a.doctor_id
    JOIN patient p ON p.patient_id = a.patient_id
"#;

fn appointment_select(source: &str) -> String {
    APPOINTMENT_JOIN.replace("{source}", source)
}

#[async_trait]
impl Store for PgStore {
    async fn insert_doctor(&self, draft: &DoctorDraft) -> StoreResult<Doctor> {
        let sql = format!(
            r#"
            INSERT INTO doctor (name, specialization, phone, email)
            VALUES ($1, $2, $3, $4)
            RETURNING {DOCTOR_COLUMNS}
            "#
        );
        let row: DoctorRow = sqlx::query_as(&sql)
            .bind(&draft.name)
            .bind(draft.specialization.as_str())
            .bind(&draft.phone)
            .bind(&draft.email)
            .fetch_one(&self.db)
            .await
            .map_err(db_err)?;
        row.try_into().map_err(decode_err)
    }

    async fn get_doctor(&self, id: Uuid) -> StoreResult<Option<Doctor>> {
        let sql = format!("SELECT {DOCTOR_COLUMNS} FROM doctor WHERE doctor_id = $1");
        let row: Option<DoctorRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)?;
        row.map(Doctor::try_from).transpose().map_err(decode_err)
    }

    async fn list_doctors(&self, filter: &DoctorFilter) -> StoreResult<Vec<Doctor>> {
        let sql = format!(
            r#"
            SELECT {DOCTOR_COLUMNS}
            FROM doctor
            WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)
              AND ($2::text IS NULL OR specialization = $2)
            ORDER BY name ASC, created_at ASC, doctor_id ASC
            "#
        );
        let rows: Vec<DoctorRow> = sqlx::query_as(&sql)
            .bind(like_pattern(&filter.search))
            .bind(filter.specialization.map(|s| s.as_str()))
            .fetch_all(&self.db)
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(Doctor::try_from)
            .collect::<Result<_, _>>()
            .map_err(decode_err)
    }

    async fn update_doctor(&self, id: Uuid, draft: &DoctorDraft) -> StoreResult<Option<Doctor>> {
        let sql = format!(
            r#"
            UPDATE doctor
            SET name = $1,
                specialization = $2,
                phone = $3,
                email = $4,
                updated_at = now()
            WHERE doctor_id = $5
            RETURNING {DOCTOR_COLUMNS}
            "#
        );
        let row: Option<DoctorRow> = sqlx::query_as(&sql)
            .bind(&draft.name)
            .bind(draft.specialization.as_str())
            .bind(&draft.phone)
            .bind(&draft.email)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)?;
        row.map(Doctor::try_from).transpose().map_err(decode_err)
    }

    async fn delete_doctor(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM doctor WHERE doctor_id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_patient(&self, draft: &PatientDraft) -> StoreResult<Patient> {
        let sql = format!(
            r#"
            INSERT INTO patient (name, age, gender, phone, email, address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PATIENT_COLUMNS}
            "#
        );
        let row: PatientRow = sqlx::query_as(&sql)
            .bind(&draft.name)
            .bind(draft.age)
            .bind(draft.gender.as_str())
            .bind(&draft.phone)
            .bind(&draft.email)
            .bind(&draft.address)
            .fetch_one(&self.db)
            .await
            .map_err(db_err)?;
        row.try_into().map_err(decode_err)
    }

    async fn get_patient(&self, id: Uuid) -> StoreResult<Option<Patient>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patient WHERE patient_id = $1");
        let row: Option<PatientRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)?;
        row.map(Patient::try_from).transpose().map_err(decode_err)
    }

    async fn list_patients(&self, filter: &PatientFilter) -> StoreResult<Vec<Patient>> {
        let sql = format!(
            r#"
            SELECT {PATIENT_COLUMNS}
            FROM patient
            WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)
              AND ($2::text IS NULL OR gender = $2)
            ORDER BY name ASC, created_at ASC, patient_id ASC
            "#
        );
        let rows: Vec<PatientRow> = sqlx::query_as(&sql)
            .bind(like_pattern(&filter.search))
            .bind(filter.gender.map(|g| g.as_str()))
            .fetch_all(&self.db)
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(Patient::try_from)
            .collect::<Result<_, _>>()
            .map_err(decode_err)
    }

    async fn update_patient(&self, id: Uuid, draft: &PatientDraft) -> StoreResult<Option<Patient>> {
        let sql = format!(
            r#"
            UPDATE patient
            SET name = $1,
                age = $2,
                gender = $3,
                phone = $4,
                email = $5,
                address = $6,
                updated_at = now()
            WHERE patient_id = $7
            RETURNING {PATIENT_COLUMNS}
            "#
        );
        let row: Option<PatientRow> = sqlx::query_as(&sql)
            .bind(&draft.name)
            .bind(draft.age)
            .bind(draft.gender.as_str())
            .bind(&draft.phone)
            .bind(&draft.email)
            .bind(&draft.address)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)?;
        row.map(Patient::try_from).transpose().map_err(decode_err)
    }

    async fn delete_patient(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM patient WHERE patient_id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_appointment(&self, draft: &AppointmentDraft) -> StoreResult<Appointment> {
        let sql = format!(
            r#"
            WITH ins AS (
              INSERT INTO appointment (doctor_id, patient_id, date, time, status, notes)
              VALUES ($1, $2, $3, $4, $5, $6)
              RETURNING *
            )
            {}
            "#,
            appointment_select("ins")
        );
        let row: AppointmentRow = sqlx::query_as(&sql)
            .bind(draft.doctor_id)
            .bind(draft.patient_id)
            .bind(draft.date)
            .bind(draft.time)
            .bind(draft.status.as_str())
            .bind(&draft.notes)
            .fetch_one(&self.db)
            .await
            .map_err(db_err)?;
        row.try_into().map_err(decode_err)
    }

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        let sql = format!("{} WHERE a.appointment_id = $1", appointment_select("appointment"));
        let row: Option<AppointmentRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)?;
        row.map(Appointment::try_from).transpose().map_err(decode_err)
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        let direction = match filter.order {
            AppointmentOrder::Newest => "DESC",
            AppointmentOrder::Oldest => "ASC",
        };
        let sql = format!(
            r#"
            {}
            WHERE ($1::uuid IS NULL OR a.doctor_id = $1)
              AND ($2::uuid IS NULL OR a.patient_id = $2)
              AND ($3::text IS NULL OR a.status = $3)
              AND ($4::date IS NULL OR a.date = $4)
              AND ($5::text IS NULL OR d.name ILIKE $5 OR p.name ILIKE $5)
            ORDER BY a.date {direction}, a.time {direction}, a.created_at ASC, a.appointment_id ASC
            "#,
            appointment_select("appointment")
        );
        let rows: Vec<AppointmentRow> = sqlx::query_as(&sql)
            .bind(filter.doctor_id)
            .bind(filter.patient_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.date)
            .bind(like_pattern(&filter.search))
            .fetch_all(&self.db)
            .await
            .map_err(db_err)?;
        rows.into_iter()
            .map(Appointment::try_from)
            .collect::<Result<_, _>>()
            .map_err(decode_err)
    }

    async fn update_appointment(
        &self,
        id: Uuid,
        draft: &AppointmentDraft,
    ) -> StoreResult<Option<Appointment>> {
        let sql = format!(
            r#"
            WITH upd AS (
              UPDATE appointment
              SET doctor_id = $1,
                  patient_id = $2,
                  date = $3,
                  time = $4,
                  status = $5,
                  notes = $6,
                  updated_at = now()
              WHERE appointment_id = $7
              RETURNING *
            )
            {}
            "#,
            appointment_select("upd")
        );
        let row: Option<AppointmentRow> = sqlx::query_as(&sql)
            .bind(draft.doctor_id)
            .bind(draft.patient_id)
            .bind(draft.date)
            .bind(draft.time)
            .bind(draft.status.as_str())
            .bind(&draft.notes)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_err)?;
        row.map(Appointment::try_from).transpose().map_err(decode_err)
    }

    async fn delete_appointment(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM appointment WHERE appointment_id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected() > 0)
    }

    async fn find_slot_holder(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> StoreResult<Option<Uuid>> {
        sqlx::query_scalar(
            r#"
            SELECT appointment_id
            FROM appointment
            WHERE doctor_id = $1
              AND date = $2
              AND time = $3
              AND ($4::uuid IS NULL OR appointment_id <> $4)
            LIMIT 1
            "#,
        )
        .bind(doctor_id)
        .bind(date)
        .bind(time)
        .bind(exclude)
        .fetch_optional(&self.db)
        .await
        .map_err(db_err)
    }

    async fn delete_appointments_for_doctor(&self, doctor_id: Uuid) -> StoreResult<Vec<Uuid>> {
        sqlx::query_scalar("DELETE FROM appointment WHERE doctor_id = $1 RETURNING appointment_id")
            .bind(doctor_id)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn delete_appointments_for_patient(&self, patient_id: Uuid) -> StoreResult<Vec<Uuid>> {
        sqlx::query_scalar("DELETE FROM appointment WHERE patient_id = $1 RETURNING appointment_id")
            .bind(patient_id)
            .fetch_all(&self.db)
            .await
            .map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(&None), None);
        assert_eq!(like_pattern(&Some(" smith ".into())).as_deref(), Some("%smith%"));
        assert_eq!(like_pattern(&Some("_".into())).as_deref(), Some(r"%\_%"));
        assert_eq!(like_pattern(&Some("50%".into())).as_deref(), Some(r"%50\%%"));
        assert_eq!(like_pattern(&Some(r"a\b".into())).as_deref(), Some(r"%a\\b%"));
    }
}
