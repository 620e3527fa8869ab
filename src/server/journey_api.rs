use axum::{response::IntoResponse, Json};

/// `GET /api/journey` — the static step catalog the UI renders the journey
/// from.
pub(crate) async fn get_journey() -> impl IntoResponse {
    Json(crate::journey::STEPS)
}
