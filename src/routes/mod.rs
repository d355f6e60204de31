use crate::models::AppState;
use axum::{routing::get, Router};

pub mod appointment_routes;
pub mod doctor_routes;
pub mod home_routes;
pub mod patient_routes;

/// Every endpoint the service exposes, listed in one place.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(home_routes::health))
        .route("/api", get(home_routes::api_root))
        // doctors
        .route(
            "/api/doctors",
            get(doctor_routes::list_doctors).post(doctor_routes::create_doctor),
        )
        .route(
            "/api/doctors/{doctor_id}",
            get(doctor_routes::get_doctor)
                .put(doctor_routes::replace_doctor)
                .patch(doctor_routes::patch_doctor)
                .delete(doctor_routes::delete_doctor),
        )
        // patients
        .route(
            "/api/patients",
            get(patient_routes::list_patients).post(patient_routes::create_patient),
        )
        .route(
            "/api/patients/{patient_id}",
            get(patient_routes::get_patient)
                .put(patient_routes::replace_patient)
                .patch(patient_routes::patch_patient)
                .delete(patient_routes::delete_patient),
        )
        // appointments
        .route(
            "/api/appointments",
            get(appointment_routes::list_appointments).post(appointment_routes::create_appointment),
        )
        .route(
            "/api/appointments/{appointment_id}",
            get(appointment_routes::get_appointment)
                .put(appointment_routes::replace_appointment)
                .patch(appointment_routes::patch_appointment)
                .delete(appointment_routes::delete_appointment),
        )
        .with_state(state)
}
