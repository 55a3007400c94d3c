use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{
    clamp_limit, clamp_page, read_file, read_text, remove_or_record, store_pages, FilePart,
};
use crate::api::types::{AppError, AppState};
use crate::auth::{Admin, Identity};
use crate::storage::models::{ChapterWithKomik, Page};
use crate::storage::{
    ChapterFilter, CreateChapterParams, ListParams, UpdateChapterParams,
};

fn sort_column(sort_by: Option<&str>) -> &'static str {
    match sort_by {
        Some("judul") => "judul",
        Some("createdAt" | "created_at") => "created_at",
        Some("updatedAt" | "updated_at") => "updated_at",
        _ => "nomor",
    }
}

#[derive(Default)]
struct ChapterForm {
    komik_id: Option<String>,
    judul: Option<String>,
    nomor: Option<String>,
    pages: Vec<FilePart>,
}

impl ChapterForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = ChapterForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| AppError::Validation("malformed multipart request".to_string()))?
        {
            match field.name().unwrap_or_default() {
                "komikId" => form.komik_id = Some(read_text(field).await?),
                "judul" => form.judul = Some(read_text(field).await?),
                "nomor" => form.nomor = Some(read_text(field).await?),
                "pages" => form.pages.push(read_file(field).await?),
                _ => {}
            }
        }
        Ok(form)
    }

    fn parsed_nomor(&self) -> Result<Option<f64>, AppError> {
        match self.nomor.as_deref() {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| AppError::Validation("nomor must be a number".to_string())),
        }
    }
}

pub async fn create_chapter(
    State(state): State<AppState>,
    _identity: Identity,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let form = ChapterForm::from_multipart(multipart).await?;

    let komik_id = form
        .komik_id
        .clone()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::Validation("komikId is required".to_string()))?;
    let judul = form
        .judul
        .clone()
        .map(|j| j.trim().to_string())
        .filter(|j| !j.is_empty())
        .ok_or_else(|| AppError::Validation("judul is required".to_string()))?;
    let nomor = form
        .parsed_nomor()?
        .ok_or_else(|| AppError::Validation("nomor is required".to_string()))?;
    if form.pages.is_empty() {
        return Err(AppError::Validation(
            "at least one page image must be uploaded".to_string(),
        ));
    }

    // Cheap existence check before any page hits the disk; creation itself
    // re-verifies.
    if state.storage.get_komik(&komik_id).await?.is_none() {
        return Err(AppError::NotFound("komik not found".to_string()));
    }

    let halaman = store_pages(&state, form.pages).await?;
    let params = CreateChapterParams {
        komik_id,
        judul,
        nomor,
        halaman: halaman.clone(),
    };

    let chapter = match state.storage.create_chapter(params).await {
        Ok(chapter) => chapter,
        Err(e) => {
            for path in &halaman {
                remove_or_record(&state, path).await;
            }
            return Err(e.into());
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "chapter uploaded",
            "chapter": chapter
        })),
    ))
}

#[derive(Deserialize)]
pub struct ChapterListQuery {
    page: Option<u32>,
    limit: Option<u32>,
    #[serde(rename = "sortBy")]
    sort_by: Option<String>,
    order: Option<String>,
    keyword: Option<String>,
    #[serde(rename = "komikId")]
    komik_id: Option<String>,
}

pub async fn list_chapters(
    State(state): State<AppState>,
    Admin(_identity): Admin,
    Query(query): Query<ChapterListQuery>,
) -> Result<Json<Page<ChapterWithKomik>>, AppError> {
    let filter = ChapterFilter {
        keyword: query.keyword.as_deref().unwrap_or("").trim().to_string(),
        komik_id: query.komik_id.clone().filter(|k| !k.trim().is_empty()),
    };
    let params = ListParams {
        page: clamp_page(query.page),
        limit: clamp_limit(query.limit),
        sort_column: sort_column(query.sort_by.as_deref()),
        descending: query.order.as_deref() == Some("desc"),
    };
    Ok(Json(state.storage.list_chapters(&filter, &params).await?))
}

pub async fn get_chapter(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChapterWithKomik>, AppError> {
    state
        .storage
        .get_chapter(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("chapter not found".to_string()))
}

#[derive(Deserialize)]
pub struct ChaptersByKomikQuery {
    page: Option<u32>,
    limit: Option<u32>,
    sort: Option<String>,
}

pub async fn list_chapters_by_komik(
    State(state): State<AppState>,
    Path(komik_id): Path<String>,
    Query(query): Query<ChaptersByKomikQuery>,
) -> Result<Json<Page<ChapterWithKomik>>, AppError> {
    let params = ListParams {
        page: clamp_page(query.page),
        limit: clamp_limit(query.limit),
        sort_column: "nomor",
        descending: query.sort.as_deref() == Some("desc"),
    };

    state
        .storage
        .list_chapters_by_komik(&komik_id, &params)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("komik not found".to_string()))
}

pub async fn update_chapter(
    State(state): State<AppState>,
    _identity: Identity,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let form = ChapterForm::from_multipart(multipart).await?;
    let nomor = form.parsed_nomor()?;

    let new_pages = if form.pages.is_empty() {
        None
    } else {
        Some(store_pages(&state, form.pages).await?)
    };

    let patch = UpdateChapterParams {
        judul: form.judul.map(|j| j.trim().to_string()),
        nomor,
        halaman: new_pages.clone(),
    };

    match state.storage.update_chapter(&id, patch).await {
        Ok((chapter, replaced_pages)) => {
            for path in &replaced_pages {
                remove_or_record(&state, path).await;
            }
            Ok(Json(json!({
                "status": "success",
                "message": "chapter updated",
                "chapter": chapter
            })))
        }
        Err(e) => {
            if let Some(paths) = &new_pages {
                for path in paths {
                    remove_or_record(&state, path).await;
                }
            }
            Err(e.into())
        }
    }
}

pub async fn delete_chapter(
    State(state): State<AppState>,
    _identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let files = state.storage.delete_chapter(&id).await?;
    for path in &files {
        remove_or_record(&state, path).await;
    }

    Ok(Json(json!({
        "status": "success",
        "message": "chapter deleted"
    })))
}
