// src/routes/patient_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{AppState, CreatedResponse, MessageResponse, PatientView},
    registry::UpdateKind,
    validation::{PatientListQuery, PatientPayload},
};

/* ============================================================
   GET /patients
   ============================================================ */

pub async fn list_patients(
    State(state): State<AppState>,
    WithRejection(Query(q), _): WithRejection<Query<PatientListQuery>, ApiError>,
) -> Result<Json<Vec<PatientView>>, ApiError> {
    let filter = q.into_filter()?;
    let rows = state.registry.list_patients(&filter).await?;
    Ok(Json(rows.into_iter().map(PatientView::from).collect()))
}

/* ============================================================
   POST /patients
   ============================================================ */

pub async fn create_patient(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<PatientPayload>, ApiError>,
) -> Result<(StatusCode, Json<CreatedResponse<PatientView>>), ApiError> {
    let patient = state.registry.create_patient(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Patient created successfully".into(),
            data: patient.into(),
        }),
    ))
}

/* ============================================================
   GET /patients/{id}
   ============================================================ */

pub async fn get_patient(
    State(state): State<AppState>,
    WithRejection(Path(patient_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<PatientView>, ApiError> {
    Ok(Json(state.registry.get_patient(patient_id).await?.into()))
}

/* ============================================================
   PUT / PATCH /patients/{id}
   ============================================================ */

pub async fn replace_patient(
    State(state): State<AppState>,
    WithRejection(Path(patient_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<PatientPayload>, ApiError>,
) -> Result<Json<PatientView>, ApiError> {
    let patient = state
        .registry
        .update_patient(patient_id, req, UpdateKind::Replace)
        .await?;
    Ok(Json(patient.into()))
}

pub async fn patch_patient(
    State(state): State<AppState>,
    WithRejection(Path(patient_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<PatientPayload>, ApiError>,
) -> Result<Json<PatientView>, ApiError> {
    let patient = state
        .registry
        .update_patient(patient_id, req, UpdateKind::Partial)
        .await?;
    Ok(Json(patient.into()))
}

/* ============================================================
   DELETE /patients/{id}
   ============================================================ */

pub async fn delete_patient(
    State(state): State<AppState>,
    WithRejection(Path(patient_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<MessageResponse>, ApiError> {
    let removed = state.registry.delete_patient(patient_id).await?;
    Ok(Json(MessageResponse {
        message: format!("Patient {} deleted successfully", removed.name),
        removed_appointments: Some(removed.appointments.len()),
    }))
}
