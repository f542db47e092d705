use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    services::recommend::{self, RecommendInput, RecommendOutput},
    state::AppState,
};

/// Handler for the recommendation endpoint
pub async fn recommend(
    State(state): State<AppState>,
    Json(input): Json<RecommendInput>,
) -> AppResult<Json<RecommendOutput>> {
    let output = recommend::recommend(&state, input).await?;
    Ok(Json(output))
}
