// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{AppState, AppointmentView, CreatedResponse, MessageResponse},
    registry::UpdateKind,
    validation::{AppointmentListQuery, AppointmentPayload},
};

/* ============================================================
   GET /appointments
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
    WithRejection(Query(q), _): WithRejection<Query<AppointmentListQuery>, ApiError>,
) -> Result<Json<Vec<AppointmentView>>, ApiError> {
    let filter = q.into_filter()?;
    let rows = state.registry.list_appointments(&filter).await?;
    Ok(Json(rows.into_iter().map(AppointmentView::from).collect()))
}

/* ============================================================
   POST /appointments
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<AppointmentPayload>, ApiError>,
) -> Result<(StatusCode, Json<CreatedResponse<AppointmentView>>), ApiError> {
    let appointment = state.registry.create_appointment(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            message: "Appointment booked successfully".into(),
            data: appointment.into(),
        }),
    ))
}

/* ============================================================
   GET /appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    WithRejection(Path(appointment_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<AppointmentView>, ApiError> {
    let appointment = state.registry.get_appointment(appointment_id).await?;
    Ok(Json(appointment.into()))
}

/* ============================================================
   PUT / PATCH /appointments/{id}
   ============================================================ */

pub async fn replace_appointment(
    State(state): State<AppState>,
    WithRejection(Path(appointment_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<AppointmentPayload>, ApiError>,
) -> Result<Json<AppointmentView>, ApiError> {
    update(&state, appointment_id, req, UpdateKind::Replace).await
}

pub async fn patch_appointment(
    State(state): State<AppState>,
    WithRejection(Path(appointment_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<AppointmentPayload>, ApiError>,
) -> Result<Json<AppointmentView>, ApiError> {
    update(&state, appointment_id, req, UpdateKind::Partial).await
}

async fn update(
    state: &AppState,
    appointment_id: Uuid,
    req: AppointmentPayload,
    kind: UpdateKind,
) -> Result<Json<AppointmentView>, ApiError> {
    let appointment = state
        .registry
        .update_appointment(appointment_id, req, kind)
        .await?;
    Ok(Json(appointment.into()))
}

/* ============================================================
   DELETE /appointments/{id}
   ============================================================ */

pub async fn delete_appointment(
    State(state): State<AppState>,
    WithRejection(Path(appointment_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.registry.delete_appointment(appointment_id).await?;
    Ok(Json(MessageResponse {
        message: "Appointment deleted successfully".into(),
        removed_appointments: None,
    }))
}
