//! Request payloads and their conversion into validated drafts.
//!
//! Every field is optional at the serde level so that missing or malformed
//! values surface as field errors instead of body rejections.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{FieldError, RegistryError};
use crate::models::{
    AppointmentDraft, AppointmentFilter, AppointmentOrder, AppointmentStatus, Doctor, DoctorDraft,
    DoctorFilter, Gender, Patient, PatientDraft, PatientFilter, Specialization, UnknownChoice,
    wire_time,
};

pub const NAME_MAX: usize = 200;
pub const PHONE_MAX: usize = 20;
pub const EMAIL_MAX: usize = 254;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[^\s@]+@(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$",
    )
    .expect("email pattern compiles")
});

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

/// How a payload relates to the record it writes.
#[derive(Debug, Clone, Copy)]
pub enum WriteMode<'a, T> {
    Create,
    /// PUT: required fields must be present, optional ones keep their stored value.
    Replace(&'a T),
    /// PATCH: anything missing keeps its stored value.
    Patch(&'a T),
}

impl<'a, T> WriteMode<'a, T> {
    fn existing(&self) -> Option<&'a T> {
        match *self {
            WriteMode::Create => None,
            WriteMode::Replace(t) | WriteMode::Patch(t) => Some(t),
        }
    }

    fn is_patch(&self) -> bool {
        matches!(self, WriteMode::Patch(_))
    }
}

#[derive(Default)]
struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Resolves a required field from the submitted value or, on PATCH, the stored one.
    fn required<T>(&mut self, field: &str, value: Option<T>, stored: Option<T>, partial: bool) -> Option<T> {
        match value {
            Some(v) => Some(v),
            None if partial && stored.is_some() => stored,
            None => {
                self.fail(field, REQUIRED);
                None
            }
        }
    }

    fn text(&mut self, field: &str, raw: String, max: usize) -> Option<String> {
        let s = raw.trim();
        if s.is_empty() {
            self.fail(field, BLANK);
            return None;
        }
        if s.chars().count() > max {
            self.fail(field, format!("Ensure this field has no more than {max} characters."));
            return None;
        }
        Some(s.to_string())
    }

    fn email(&mut self, field: &str, raw: String) -> Option<String> {
        let s = self.text(field, raw, EMAIL_MAX)?;
        if !EMAIL_RE.is_match(&s) {
            self.fail(field, "Enter a valid email address.");
            return None;
        }
        Some(s)
    }

    fn choice<T: FromStr<Err = UnknownChoice>>(&mut self, field: &str, raw: String) -> Option<T> {
        match raw.trim().parse() {
            Ok(v) => Some(v),
            Err(e) => {
                self.fail(field, format!("{e}."));
                None
            }
        }
    }

    fn age(&mut self, field: &str, raw: i64) -> Option<i32> {
        if raw < 0 {
            self.fail(field, "Ensure this value is greater than or equal to 0.");
            return None;
        }
        match i32::try_from(raw) {
            Ok(v) => Some(v),
            Err(_) => {
                self.fail(field, "Ensure this value is less than or equal to 2147483647.");
                None
            }
        }
    }

    fn date(&mut self, field: &str, raw: String) -> Option<NaiveDate> {
        let parsed = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok();
        if parsed.is_none() {
            self.fail(field, "Date has wrong format. Use YYYY-MM-DD.");
        }
        parsed
    }

    fn time(&mut self, field: &str, raw: String) -> Option<NaiveTime> {
        let parsed = wire_time::parse(&raw);
        if parsed.is_none() {
            self.fail(field, "Time has wrong format. Use hh:mm or hh:mm:ss.");
        }
        parsed
    }

    fn id(&mut self, field: &str, raw: String) -> Option<Uuid> {
        let parsed = Uuid::parse_str(raw.trim()).ok();
        if parsed.is_none() {
            self.fail(field, format!("Invalid pk \"{}\" - object does not exist.", raw.trim()));
        }
        parsed
    }

    fn into_error(self) -> RegistryError {
        if self.errors.is_empty() {
            RegistryError::invalid("body", "invalid payload")
        } else {
            RegistryError::Validation(self.errors)
        }
    }
}

/* -------------------------
   Write payloads
--------------------------*/

#[derive(Debug, Default, Deserialize)]
pub struct DoctorPayload {
    pub name: Option<String>,
    pub specialization: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl DoctorPayload {
    pub fn resolve(self, mode: WriteMode<'_, Doctor>) -> Result<DoctorDraft, RegistryError> {
        let prev = mode.existing();
        let partial = mode.is_patch();
        let mut v = Validator::default();

        let name = self.name.and_then(|s| v.text("name", s, NAME_MAX));
        let specialization = self
            .specialization
            .and_then(|s| v.choice::<Specialization>("specialization", s));
        let phone = self.phone.and_then(|s| v.text("phone", s, PHONE_MAX));
        let email = self.email.and_then(|s| v.email("email", s));

        // Fields that failed to parse already carry an error; only flag the truly absent ones.
        let failed = |v: &Validator, f: &str| v.errors.iter().any(|e| e.field == f);

        let name = if failed(&v, "name") { None } else { v.required("name", name, prev.map(|d| d.name.clone()), partial) };
        let specialization = if failed(&v, "specialization") {
            None
        } else {
            v.required("specialization", specialization, prev.map(|d| d.specialization), partial)
        };
        let phone = if failed(&v, "phone") { None } else { v.required("phone", phone, prev.map(|d| d.phone.clone()), partial) };
        let email = if failed(&v, "email") { None } else { v.required("email", email, prev.map(|d| d.email.clone()), partial) };

        match (name, specialization, phone, email) {
            (Some(name), Some(specialization), Some(phone), Some(email)) if v.errors.is_empty() => {
                Ok(DoctorDraft {
                    name,
                    specialization,
                    phone,
                    email,
                })
            }
            _ => Err(v.into_error()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PatientPayload {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl PatientPayload {
    pub fn resolve(self, mode: WriteMode<'_, Patient>) -> Result<PatientDraft, RegistryError> {
        let prev = mode.existing();
        let partial = mode.is_patch();
        let mut v = Validator::default();

        let name = self.name.and_then(|s| v.text("name", s, NAME_MAX));
        let age = self.age.and_then(|a| v.age("age", a));
        let gender = self.gender.and_then(|s| v.choice::<Gender>("gender", s));
        let phone = self.phone.and_then(|s| v.text("phone", s, PHONE_MAX));
        let email = self.email.and_then(|s| v.email("email", s));

        let failed = |v: &Validator, f: &str| v.errors.iter().any(|e| e.field == f);

        let name = if failed(&v, "name") { None } else { v.required("name", name, prev.map(|p| p.name.clone()), partial) };
        let age = if failed(&v, "age") { None } else { v.required("age", age, prev.map(|p| p.age), partial) };
        let gender = if failed(&v, "gender") { None } else { v.required("gender", gender, prev.map(|p| p.gender), partial) };
        let phone = if failed(&v, "phone") { None } else { v.required("phone", phone, prev.map(|p| p.phone.clone()), partial) };
        let email = if failed(&v, "email") { None } else { v.required("email", email, prev.map(|p| p.email.clone()), partial) };

        let address = match self.address {
            Some(a) => a.trim().to_string(),
            None => prev.map(|p| p.address.clone()).unwrap_or_default(),
        };

        match (name, age, gender, phone, email) {
            (Some(name), Some(age), Some(gender), Some(phone), Some(email)) if v.errors.is_empty() => {
                Ok(PatientDraft {
                    name,
                    age,
                    gender,
                    phone,
                    email,
                    address,
                })
            }
            _ => Err(v.into_error()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentPayload {
    pub doctor: Option<String>,
    pub patient: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// Stored values an appointment update falls back on.
#[derive(Debug, Clone)]
pub struct AppointmentSnapshot {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: String,
}

impl AppointmentPayload {
    pub fn resolve(
        self,
        mode: WriteMode<'_, AppointmentSnapshot>,
    ) -> Result<AppointmentDraft, RegistryError> {
        let prev = mode.existing();
        let partial = mode.is_patch();
        let mut v = Validator::default();

        let doctor = self.doctor.and_then(|s| v.id("doctor", s));
        let patient = self.patient.and_then(|s| v.id("patient", s));
        let date = self.date.and_then(|s| v.date("date", s));
        let time = self.time.and_then(|s| v.time("time", s));
        let status = self.status.and_then(|s| v.choice::<AppointmentStatus>("status", s));

        let failed = |v: &Validator, f: &str| v.errors.iter().any(|e| e.field == f);

        let doctor = if failed(&v, "doctor") { None } else { v.required("doctor", doctor, prev.map(|a| a.doctor_id), partial) };
        let patient = if failed(&v, "patient") { None } else { v.required("patient", patient, prev.map(|a| a.patient_id), partial) };
        let date = if failed(&v, "date") { None } else { v.required("date", date, prev.map(|a| a.date), partial) };
        let time = if failed(&v, "time") { None } else { v.required("time", time, prev.map(|a| a.time), partial) };

        let status = status
            .or_else(|| prev.map(|a| a.status))
            .unwrap_or_default();
        let notes = match self.notes {
            Some(n) => n.trim().to_string(),
            None => prev.map(|a| a.notes.clone()).unwrap_or_default(),
        };

        match (doctor, patient, date, time) {
            (Some(doctor_id), Some(patient_id), Some(date), Some(time)) if v.errors.is_empty() => {
                Ok(AppointmentDraft {
                    doctor_id,
                    patient_id,
                    date,
                    time,
                    status,
                    notes,
                })
            }
            _ => Err(v.into_error()),
        }
    }
}

/* -------------------------
   List query strings
--------------------------*/

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Default, Deserialize)]
pub struct DoctorListQuery {
    pub search: Option<String>,
    pub specialization: Option<String>,
}

impl DoctorListQuery {
    pub fn into_filter(self) -> Result<DoctorFilter, RegistryError> {
        let mut v = Validator::default();
        let specialization = non_blank(self.specialization)
            .and_then(|s| v.choice::<Specialization>("specialization", s));
        if !v.errors.is_empty() {
            return Err(v.into_error());
        }
        Ok(DoctorFilter {
            search: non_blank(self.search),
            specialization,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PatientListQuery {
    pub search: Option<String>,
    pub gender: Option<String>,
}

impl PatientListQuery {
    pub fn into_filter(self) -> Result<PatientFilter, RegistryError> {
        let mut v = Validator::default();
        let gender = non_blank(self.gender).and_then(|s| v.choice::<Gender>("gender", s));
        if !v.errors.is_empty() {
            return Err(v.into_error());
        }
        Ok(PatientFilter {
            search: non_blank(self.search),
            gender,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub search: Option<String>,
    pub doctor: Option<String>,
    pub patient: Option<String>,
    pub status: Option<String>,
    pub date: Option<String>,
    /// `date` for oldest first, `-date` (default) for newest first.
    pub ordering: Option<String>,
}

impl AppointmentListQuery {
    pub fn into_filter(self) -> Result<AppointmentFilter, RegistryError> {
        let mut v = Validator::default();
        let doctor_id = non_blank(self.doctor).and_then(|s| v.id("doctor", s));
        let patient_id = non_blank(self.patient).and_then(|s| v.id("patient", s));
        let status = non_blank(self.status).and_then(|s| v.choice::<AppointmentStatus>("status", s));
        let date = non_blank(self.date).and_then(|s| v.date("date", s));
        let order = match non_blank(self.ordering).as_deref() {
            None | Some("-date") => AppointmentOrder::Newest,
            Some("date") => AppointmentOrder::Oldest,
            Some(other) => {
                v.fail("ordering", format!("\"{other}\" is not a valid ordering."));
                AppointmentOrder::Newest
            }
        };
        if !v.errors.is_empty() {
            return Err(v.into_error());
        }
        Ok(AppointmentFilter {
            search: non_blank(self.search),
            doctor_id,
            patient_id,
            status,
            date,
            order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn fields(err: RegistryError) -> Vec<String> {
        match err {
            RegistryError::Validation(f) => f.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn doctor_payload() -> DoctorPayload {
        DoctorPayload {
            name: Some("  Smith ".into()),
            specialization: Some("cardiology".into()),
            phone: Some("555-0100".into()),
            email: Some("s@x.com".into()),
        }
    }

    #[test]
    fn doctor_payload_trims_and_parses() {
        let draft = doctor_payload().resolve(WriteMode::Create).unwrap();
        assert_eq!(draft.name, "Smith");
        assert_eq!(draft.specialization, Specialization::Cardiology);
    }

    #[test]
    fn missing_and_malformed_fields_are_reported_together() {
        let payload = DoctorPayload {
            name: None,
            specialization: Some("astrology".into()),
            phone: Some("0".repeat(21)),
            email: Some("not-an-email".into()),
        };
        let got = fields(payload.resolve(WriteMode::Create).unwrap_err());
        assert_eq!(got, ["specialization", "phone", "email", "name"]);
    }

    #[test]
    fn negative_age_is_rejected() {
        let payload = PatientPayload {
            name: Some("Jane".into()),
            age: Some(-1),
            gender: Some("F".into()),
            phone: Some("555".into()),
            email: Some("j@x.com".into()),
            address: None,
        };
        assert_eq!(fields(payload.resolve(WriteMode::Create).unwrap_err()), ["age"]);
    }

    #[test]
    fn patch_keeps_stored_values_but_replace_requires_them() {
        let now = Utc::now();
        let stored = Patient {
            id: Uuid::new_v4(),
            name: "Jane".into(),
            age: 40,
            gender: Gender::Female,
            phone: "555".into(),
            email: "j@x.com".into(),
            address: "1 Main St".into(),
            created_at: now,
            updated_at: now,
        };
        let patch = PatientPayload {
            age: Some(41),
            ..Default::default()
        };
        let draft = patch.resolve(WriteMode::Patch(&stored)).unwrap();
        assert_eq!(draft.age, 41);
        assert_eq!(draft.address, "1 Main St");
        assert_eq!(draft.email, "j@x.com");

        let replace = PatientPayload {
            age: Some(41),
            ..Default::default()
        };
        let got = fields(replace.resolve(WriteMode::Replace(&stored)).unwrap_err());
        assert_eq!(got, ["name", "gender", "phone", "email"]);
    }

    #[test]
    fn appointment_defaults_to_scheduled_with_empty_notes() {
        let payload = AppointmentPayload {
            doctor: Some(Uuid::new_v4().to_string()),
            patient: Some(Uuid::new_v4().to_string()),
            date: Some("2024-05-01".into()),
            time: Some("10:00".into()),
            ..Default::default()
        };
        let draft = payload.resolve(WriteMode::Create).unwrap();
        assert_eq!(draft.status, AppointmentStatus::Scheduled);
        assert_eq!(draft.notes, "");
        assert_eq!(draft.time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
    }

    #[test]
    fn appointment_rejects_bad_date_time_and_id() {
        let payload = AppointmentPayload {
            doctor: Some("42".into()),
            patient: Some(Uuid::new_v4().to_string()),
            date: Some("05/01/2024".into()),
            time: Some("noon".into()),
            ..Default::default()
        };
        let got = fields(payload.resolve(WriteMode::Create).unwrap_err());
        assert_eq!(got, ["doctor", "date", "time"]);
    }

    #[test]
    fn leap_second_time_is_a_field_error() {
        let payload = AppointmentPayload {
            doctor: Some(Uuid::new_v4().to_string()),
            patient: Some(Uuid::new_v4().to_string()),
            date: Some("2024-05-01".into()),
            time: Some("10:00:60".into()),
            ..Default::default()
        };
        assert_eq!(fields(payload.resolve(WriteMode::Create).unwrap_err()), ["time"]);
    }

    #[test]
    fn email_domain_needs_non_empty_labels() {
        for bad in ["a@b..c", "a@.b.com", "a@b.com.", "a@b.c", "a@-b.com", "a b@x.com"] {
            let payload = DoctorPayload {
                email: Some(bad.into()),
                ..doctor_payload()
            };
            assert_eq!(fields(payload.resolve(WriteMode::Create).unwrap_err()), ["email"], "{bad}");
        }
        for good in ["s@x.com", "first.last+tag@mail.example.co.uk", "a@my-clinic.org"] {
            let payload = DoctorPayload {
                email: Some(good.into()),
                ..doctor_payload()
            };
            assert!(payload.resolve(WriteMode::Create).is_ok(), "{good}");
        }
    }

    #[test]
    fn list_queries_validate_choices_and_ordering() {
        let q = AppointmentListQuery {
            ordering: Some("date".into()),
            status: Some("no_show".into()),
            ..Default::default()
        };
        let f = q.into_filter().unwrap();
        assert_eq!(f.order, AppointmentOrder::Oldest);
        assert_eq!(f.status, Some(AppointmentStatus::NoShow));

        let bad = AppointmentListQuery {
            ordering: Some("time".into()),
            ..Default::default()
        };
        assert_matches!(bad.into_filter(), Err(RegistryError::Validation(_)));

        let blank = DoctorListQuery {
            search: Some("   ".into()),
            specialization: Some(String::new()),
        };
        assert_eq!(blank.into_filter().unwrap(), DoctorFilter::default());
    }
}
