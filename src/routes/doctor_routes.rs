// src/routes/doctor_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{doctor_title, AppState, CreatedResponse, DoctorView, MessageResponse},
    registry::UpdateKind,
    validation::{DoctorListQuery, DoctorPayload},
};

/* ============================================================
   GET /doctors
   ============================================================ */

pub async fn list_doctors(
    State(state): State<AppState>,
    WithRejection(Query(q), _): WithRejection<Query<DoctorListQuery>, ApiError>,
) -> Result<Json<Vec<DoctorView>>, ApiError> {
    let filter = q.into_filter()?;
    let rows = state.registry.list_doctors(&filter).await?;
    Ok(Json(rows.into_iter().map(DoctorView::from).collect()))
}

/* ============================================================
   POST /doctors
   ============================================================ */

pub async fn create_doctor(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<DoctorPayload>, ApiError>,
) -> Result<(StatusCode, Json<CreatedResponse<DoctorView>>), ApiError> {
    let doctor = state.registry.create_doctor(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Doctor created successfully".into(),
            data: doctor.into(),
        }),
    ))
}

/* ============================================================
   GET /doctors/{id}
   ============================================================ */

pub async fn get_doctor(
    State(state): State<AppState>,
    WithRejection(Path(doctor_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<DoctorView>, ApiError> {
    Ok(Json(state.registry.get_doctor(doctor_id).await?.into()))
}

/* ============================================================
   PUT / PATCH /doctors/{id}
   ============================================================ */

pub async fn replace_doctor(
    State(state): State<AppState>,
    WithRejection(Path(doctor_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<DoctorPayload>, ApiError>,
) -> Result<Json<DoctorView>, ApiError> {
    let doctor = state
        .registry
        .update_doctor(doctor_id, req, UpdateKind::Replace)
        .await?;
    Ok(Json(doctor.into()))
}

pub async fn patch_doctor(
    State(state): State<AppState>,
    WithRejection(Path(doctor_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<DoctorPayload>, ApiError>,
) -> Result<Json<DoctorView>, ApiError> {
    let doctor = state
        .registry
        .update_doctor(doctor_id, req, UpdateKind::Partial)
        .await?;
    Ok(Json(doctor.into()))
}

/* ============================================================
   DELETE /doctors/{id}
   ============================================================ */

pub async fn delete_doctor(
    State(state): State<AppState>,
    WithRejection(Path(doctor_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<MessageResponse>, ApiError> {
    let removed = state.registry.delete_doctor(doctor_id).await?;
    Ok(Json(MessageResponse {
        message: format!("{} deleted successfully", doctor_title(&removed.name)),
        removed_appointments: Some(removed.appointments.len()),
    }))
}
