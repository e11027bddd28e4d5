use crate::api::AppState;
use crate::error::{ApiError, Result};
use crate::validation::parse_new_inquiry;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use tracing::info;

/// POST /api/inquiries - Store a contact-form submission
pub async fn create_inquiry(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload.map_err(|e| ApiError::MalformedBody {
        message: e.body_text(),
    })?;

    let inquiry = parse_new_inquiry(payload)?;
    let created = state.storage.create_inquiry(inquiry).await?;

    info!(
        "Received inquiry {} (service of interest: {})",
        created.id,
        created.service_of_interest.as_deref().unwrap_or("none")
    );

    Ok((StatusCode::CREATED, Json(created)))
}
