use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::config::BatchUpdateConfig;
use crate::persistence::sql::DomainSelectorPairEntity;
use crate::server::app_state::AppState;
use crate::server::http_error::HttpResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateResponse {
    /// The selected pairs, as they were before the refresh.
    pub updated_records: Vec<DomainSelectorPairEntity>,
}

/// Refresh the stale pairs. Only reachable through the bearer token check.
pub async fn batch_update(
    State(state): State<AppState>,
    Extension(config): Extension<BatchUpdateConfig>,
) -> HttpResult<Json<BatchUpdateResponse>> {
    let updated_records = state.batch_updater.run(config.batch_limit).await?;
    Ok(Json(BatchUpdateResponse { updated_records }))
}
