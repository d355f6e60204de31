use axum::Json;

#[derive(serde::Serialize)]
pub struct ApiRootResponse {
    pub doctors: &'static str,
    pub patients: &'static str,
    pub appointments: &'static str,
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn api_root() -> Json<ApiRootResponse> {
    Json(ApiRootResponse {
        doctors: "/api/doctors",
        patients: "/api/patients",
        appointments: "/api/appointments",
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
