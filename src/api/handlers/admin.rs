use axum::{extract::State, Json};

use crate::api::types::{AppError, AppState};
use crate::auth::Admin;
use crate::storage::models::OrphanFile;

/// Pending file reconciliations: paths the server failed to unlink during
/// update/delete compensations.
pub async fn list_orphans(
    State(state): State<AppState>,
    Admin(_identity): Admin,
) -> Result<Json<Vec<OrphanFile>>, AppError> {
    Ok(Json(state.storage.list_orphans().await?))
}
