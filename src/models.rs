use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
}

/* -------------------------
   Choice fields
--------------------------*/

/// Raised when a stored or submitted choice code is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChoice {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" is not a valid {}", self.value, self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    General,
    Cardiology,
    Dermatology,
    Neurology,
    Orthopedics,
    Pediatrics,
    Psychiatry,
    Surgery,
}

impl Specialization {
    pub const ALL: [Specialization; 8] = [
        Specialization::General,
        Specialization::Cardiology,
        Specialization::Dermatology,
        Specialization::Neurology,
        Specialization::Orthopedics,
        Specialization::Pediatrics,
        Specialization::Psychiatry,
        Specialization::Surgery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Specialization::General => "general",
            Specialization::Cardiology => "cardiology",
            Specialization::Dermatology => "dermatology",
            Specialization::Neurology => "neurology",
            Specialization::Orthopedics => "orthopedics",
            Specialization::Pediatrics => "pediatrics",
            Specialization::Psychiatry => "psychiatry",
            Specialization::Surgery => "surgery",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Specialization::General => "General Practice",
            Specialization::Cardiology => "Cardiology",
            Specialization::Dermatology => "Dermatology",
            Specialization::Neurology => "Neurology",
            Specialization::Orthopedics => "Orthopedics",
            Specialization::Pediatrics => "Pediatrics",
            Specialization::Psychiatry => "Psychiatry",
            Specialization::Surgery => "Surgery",
        }
    }
}

impl FromStr for Specialization {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Specialization::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownChoice {
                kind: "specialization",
                value: s.to_string(),
            })
    }
}

/// Stored and emitted as the single-letter codes `M`, `F`, `O`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M", alias = "male")]
    Male,
    #[serde(rename = "F", alias = "female")]
    Female,
    #[serde(rename = "O", alias = "other")]
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Other => "O",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl FromStr for Gender {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "M" | "male" => Ok(Gender::Male),
            "F" | "female" => Ok(Gender::Female),
            "O" | "other" => Ok(Gender::Other),
            _ => Err(UnknownChoice {
                kind: "gender",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::NoShow => "No Show",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no_show" => Ok(AppointmentStatus::NoShow),
            _ => Err(UnknownChoice {
                kind: "status",
                value: s.to_string(),
            }),
        }
    }
}

/* -------------------------
   Domain entities
--------------------------*/

/// "Dr. Smith" for both "Smith" and "Dr. Smith"; names already carrying a
/// "Dr"/"Dr." prefix are left as entered.
pub fn doctor_title(name: &str) -> String {
    if name.starts_with("Dr. ") || name.starts_with("Dr ") {
        name.to_string()
    } else {
        format!("Dr. {name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: Specialization,
    pub phone: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub gender: Gender,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An appointment as read back from storage, with the doctor and patient
/// names joined in.
#[derive(Debug, Clone, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub doctor_specialization: Specialization,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/* -------------------------
   Validated write payloads
--------------------------*/

#[derive(Debug, Clone, PartialEq)]
pub struct DoctorDraft {
    pub name: String,
    pub specialization: Specialization,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatientDraft {
    pub name: String,
    pub age: i32,
    pub gender: Gender,
    pub phone: String,
    pub email: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentDraft {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: String,
}

/* -------------------------
   List filters
--------------------------*/

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoctorFilter {
    /// Case-insensitive substring over name and email.
    pub search: Option<String>,
    pub specialization: Option<Specialization>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientFilter {
    pub search: Option<String>,
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppointmentOrder {
    /// Most recent first.
    #[default]
    Newest,
    Oldest,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentFilter {
    /// Case-insensitive substring over doctor and patient names.
    pub search: Option<String>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
    pub order: AppointmentOrder,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct CreatedResponse<T> {
    pub message: String,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    /// Number of appointments removed along with a doctor or patient.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_appointments: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DoctorView {
    pub id: Uuid,
    pub name: String,
    pub specialization: Specialization,
    pub specialization_display: String,
    pub phone: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Doctor> for DoctorView {
    fn from(d: Doctor) -> Self {
        Self {
            id: d.id,
            name: d.name,
            specialization: d.specialization,
            specialization_display: d.specialization.label().to_string(),
            phone: d.phone,
            email: d.email,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PatientView {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub gender: Gender,
    pub gender_display: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Patient> for PatientView {
    fn from(p: Patient) -> Self {
        Self {
            id: p.id,
            name: p.name,
            age: p.age,
            gender: p.gender,
            gender_display: p.gender.label().to_string(),
            phone: p.phone,
            email: p.email,
            address: p.address,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AppointmentView {
    pub id: Uuid,
    pub doctor: Uuid,
    pub doctor_name: String,
    pub doctor_specialization: Specialization,
    pub patient: Uuid,
    pub patient_name: String,
    pub date: NaiveDate,
    #[serde(with = "wire_time")]
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub status_display: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Appointment> for AppointmentView {
    fn from(a: Appointment) -> Self {
        Self {
            id: a.id,
            doctor: a.doctor_id,
            doctor_name: a.doctor_name,
            doctor_specialization: a.doctor_specialization,
            patient: a.patient_id,
            patient_name: a.patient_name,
            date: a.date,
            time: a.time,
            status: a.status,
            status_display: a.status.label().to_string(),
            notes: a.notes,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

/// Times go over the wire as `HH:MM:SS`; input also accepts `HH:MM`.
pub mod wire_time {
    use chrono::{NaiveTime, Timelike};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    /// Leap-second input (`10:00:60`) is refused; Postgres folds it into the next minute.
    pub fn parse(s: &str) -> Option<NaiveTime> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .ok()
            .filter(|t| t.nanosecond() < 1_000_000_000)
    }

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M:%S").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid time \"{raw}\"")))
    }
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, FromRow)]
pub struct DoctorRow {
    pub doctor_id: Uuid,
    pub name: String,
    pub specialization: String,
    pub phone: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DoctorRow> for Doctor {
    type Error = UnknownChoice;

    fn try_from(r: DoctorRow) -> Result<Self, Self::Error> {
        Ok(Doctor {
            id: r.doctor_id,
            name: r.name,
            specialization: r.specialization.parse()?,
            phone: r.phone,
            email: r.email,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct PatientRow {
    pub patient_id: Uuid,
    pub name: String,
    pub age: i32,
    pub gender: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PatientRow> for Patient {
    type Error = UnknownChoice;

    fn try_from(r: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            id: r.patient_id,
            name: r.name,
            age: r.age,
            gender: r.gender.parse()?,
            phone: r.phone,
            email: r.email,
            address: r.address,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct AppointmentRow {
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub doctor_specialization: String,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = UnknownChoice;

    fn try_from(r: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: r.appointment_id,
            doctor_id: r.doctor_id,
            doctor_name: r.doctor_name,
            doctor_specialization: r.doctor_specialization.parse()?,
            patient_id: r.patient_id,
            patient_name: r.patient_name,
            date: r.date,
            time: r.time,
            status: r.status.parse()?,
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_codes_round_trip_through_from_str() {
        for s in Specialization::ALL {
            assert_eq!(s.as_str().parse::<Specialization>(), Ok(s));
        }
        assert_eq!("no_show".parse::<AppointmentStatus>(), Ok(AppointmentStatus::NoShow));
        assert_eq!("female".parse::<Gender>(), Ok(Gender::Female));
        assert!("dentistry".parse::<Specialization>().is_err());
    }

    #[test]
    fn labels_match_display_table() {
        assert_eq!(Specialization::General.label(), "General Practice");
        assert_eq!(Gender::Other.label(), "Other");
        assert_eq!(AppointmentStatus::NoShow.label(), "No Show");
        assert_eq!(AppointmentStatus::default(), AppointmentStatus::Scheduled);
    }

    #[test]
    fn gender_serializes_as_single_letter_and_accepts_words() {
        assert_eq!(serde_json::to_string(&Gender::Female).unwrap(), "\"F\"");
        let g: Gender = serde_json::from_str("\"male\"").unwrap();
        assert_eq!(g, Gender::Male);
    }

    #[test]
    fn doctor_title_does_not_double_prefix() {
        assert_eq!(doctor_title("Smith"), "Dr. Smith");
        assert_eq!(doctor_title("Dr. Smith"), "Dr. Smith");
        assert_eq!(doctor_title("Dr Smith"), "Dr Smith");
        assert_eq!(doctor_title("Drake"), "Dr. Drake");
    }

    #[test]
    fn wire_time_accepts_short_form() {
        assert_eq!(wire_time::parse("10:00"), NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(wire_time::parse("09:30:15"), NaiveTime::from_hms_opt(9, 30, 15));
        assert_eq!(wire_time::parse("25:00"), None);
    }

    #[test]
    fn wire_time_refuses_leap_seconds() {
        assert_eq!(wire_time::parse("10:00:60"), None);
        assert_eq!(wire_time::parse("23:59:60"), None);
        assert_eq!(wire_time::parse("10:00:59"), NaiveTime::from_hms_opt(10, 0, 59));
    }
}
