pub mod admin;
pub mod auth;
pub mod chapter;
pub mod komik;

use axum::body::Bytes;
use axum::extract::multipart::Field;

use crate::api::types::{AppError, AppState};
use crate::upload::Category;

const DEFAULT_PAGE_LIMIT: u32 = 10;
const MAX_PAGE_LIMIT: u32 = 100;

/// One uploaded file pulled out of a multipart request.
pub(crate) struct FilePart {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

pub(crate) async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|_| AppError::Validation("malformed multipart request".to_string()))
}

pub(crate) async fn read_file(field: Field<'_>) -> Result<FilePart, AppError> {
    let file_name = field.file_name().unwrap_or("file").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field
        .bytes()
        .await
        .map_err(|_| AppError::Validation("failed to read uploaded file".to_string()))?;
    Ok(FilePart {
        file_name,
        content_type,
        data,
    })
}

pub(crate) fn clamp_page(page: Option<u32>) -> u32 {
    page.unwrap_or(1).max(1)
}

pub(crate) fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
}

/// Genre arrives either as a JSON array string or comma-separated.
pub(crate) fn parse_genre(raw: &str) -> Vec<String> {
    if let Ok(parsed) = serde_json::from_str::<Vec<String>>(raw) {
        return parsed;
    }
    raw.split(',')
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect()
}

/// Compensating file deletion: a failed unlink lands in the orphan ledger
/// instead of vanishing into a log line. Never fails the parent operation.
pub(crate) async fn remove_or_record(state: &AppState, public_path: &str) {
    match state.uploads.remove_stored(public_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!("Failed to remove {public_path}: {e}");
            if let Err(db_err) = state.storage.record_orphan(public_path, &e.to_string()).await {
                tracing::error!("Failed to record orphan {public_path}: {db_err}");
            }
        }
    }
}

/// Store and transcode a cover upload; returns the public path of the final
/// webp. The raw original is removed either way.
pub(crate) async fn store_cover(state: &AppState, part: FilePart) -> Result<String, AppError> {
    let raw = state
        .uploads
        .store(
            Category::Covers,
            &part.file_name,
            &part.content_type,
            &part.data,
        )
        .await?;

    let finalized = state.uploads.finalize_cover(&raw).await;
    remove_or_record(state, &raw.public_path).await;
    Ok(finalized?.public_path)
}

/// Store a batch of chapter page uploads. All-or-nothing: the first failure
/// rolls back everything stored so far and fails the request.
pub(crate) async fn store_pages(
    state: &AppState,
    parts: Vec<FilePart>,
) -> Result<Vec<String>, AppError> {
    let mut stored = Vec::with_capacity(parts.len());
    for part in parts {
        match state
            .uploads
            .store(
                Category::Chapter,
                &part.file_name,
                &part.content_type,
                &part.data,
            )
            .await
        {
            Ok(file) => stored.push(file.public_path),
            Err(e) => {
                for path in &stored {
                    remove_or_record(state, path).await;
                }
                return Err(e.into());
            }
        }
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genre_accepts_json_array_or_comma_list() {
        assert_eq!(
            parse_genre(r#"["action","isekai"]"#),
            vec!["action".to_string(), "isekai".to_string()]
        );
        assert_eq!(
            parse_genre("action, isekai , "),
            vec!["action".to_string(), "isekai".to_string()]
        );
        assert!(parse_genre("").is_empty());
    }

    #[test]
    fn paging_is_clamped() {
        assert_eq!(clamp_page(None), 1);
        assert_eq!(clamp_page(Some(0)), 1);
        assert_eq!(clamp_page(Some(7)), 7);

        assert_eq!(clamp_limit(None), 10);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(250)), 100);
    }
}
