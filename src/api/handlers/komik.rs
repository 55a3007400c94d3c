use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{
    clamp_limit, clamp_page, parse_genre, read_file, read_text, remove_or_record, store_cover,
    FilePart,
};
use crate::api::types::{AppError, AppState};
use crate::auth::{Admin, Identity};
use crate::storage::models::{Komik, KomikDetail, Page};
use crate::storage::{CreateKomikParams, ListParams, UpdateKomikParams};

#[derive(Deserialize)]
pub struct KomikListQuery {
    page: Option<u32>,
    limit: Option<u32>,
    #[serde(rename = "sortBy")]
    sort_by: Option<String>,
    order: Option<String>,
}

fn sort_column(sort_by: Option<&str>) -> &'static str {
    match sort_by {
        Some("judul") => "judul",
        Some("penulis") => "penulis",
        Some("views") => "views",
        Some("updatedAt" | "updated_at") => "updated_at",
        _ => "created_at",
    }
}

pub async fn list_komik(
    State(state): State<AppState>,
    Query(query): Query<KomikListQuery>,
) -> Result<Json<Page<Komik>>, AppError> {
    let params = ListParams {
        page: clamp_page(query.page),
        limit: clamp_limit(query.limit),
        sort_column: sort_column(query.sort_by.as_deref()),
        descending: query.order.as_deref() == Some("desc"),
    };
    Ok(Json(state.storage.list_komik(&params).await?))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

pub async fn search_komik(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Komik>>, AppError> {
    let q = query.q.as_deref().map(str::trim).unwrap_or("");
    if q.is_empty() {
        return Err(AppError::Validation(
            "query parameter \"q\" is required".to_string(),
        ));
    }
    Ok(Json(state.storage.search_komik(q).await?))
}

pub async fn get_komik_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<KomikDetail>, AppError> {
    state
        .storage
        .get_komik_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("komik not found".to_string()))
}

pub async fn get_komik(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Komik>, AppError> {
    state
        .storage
        .get_komik(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("komik not found".to_string()))
}

#[derive(Default)]
struct KomikForm {
    judul: Option<String>,
    penulis: Option<String>,
    genre: Option<String>,
    tipe: Option<String>,
    cover: Option<FilePart>,
}

impl KomikForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = KomikForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| AppError::Validation("malformed multipart request".to_string()))?
        {
            match field.name().unwrap_or_default() {
                "judul" => form.judul = Some(read_text(field).await?),
                "penulis" => form.penulis = Some(read_text(field).await?),
                "genre" => form.genre = Some(read_text(field).await?),
                "tipe" => form.tipe = Some(read_text(field).await?),
                "cover" => form.cover = Some(read_file(field).await?),
                _ => {}
            }
        }
        Ok(form)
    }
}

pub async fn create_komik(
    State(state): State<AppState>,
    _identity: Identity,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Komik>), AppError> {
    let form = KomikForm::from_multipart(multipart).await?;

    let missing = || AppError::Validation("judul, penulis and tipe are required".to_string());
    let judul = form
        .judul
        .map(|j| j.trim().to_string())
        .filter(|j| !j.is_empty())
        .ok_or_else(missing)?;
    let penulis = form
        .penulis
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(missing)?;
    let tipe = form.tipe.ok_or_else(missing)?;

    if judul.len() < 2 {
        return Err(AppError::Validation(
            "judul must be at least 2 characters".to_string(),
        ));
    }
    if tipe != "covers" {
        return Err(AppError::Validation(
            "tipe must be \"covers\"".to_string(),
        ));
    }

    let genre = form.genre.as_deref().map(parse_genre).unwrap_or_default();
    let cover = match form.cover {
        Some(part) => Some(store_cover(&state, part).await?),
        None => None,
    };

    let params = CreateKomikParams {
        judul,
        penulis,
        genre,
        cover: cover.clone(),
    };
    let komik = match state.storage.create_komik(params).await {
        Ok(komik) => komik,
        Err(e) => {
            if let Some(path) = &cover {
                remove_or_record(&state, path).await;
            }
            return Err(e.into());
        }
    };

    Ok((StatusCode::CREATED, Json(komik)))
}

pub async fn update_komik(
    State(state): State<AppState>,
    _identity: Identity,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Komik>, AppError> {
    let form = KomikForm::from_multipart(multipart).await?;

    if let Some(judul) = form.judul.as_deref() {
        if judul.trim().len() < 2 {
            return Err(AppError::Validation(
                "judul must be at least 2 characters".to_string(),
            ));
        }
    }

    let new_cover = match form.cover {
        Some(part) => Some(store_cover(&state, part).await?),
        None => None,
    };

    let patch = UpdateKomikParams {
        judul: form.judul.map(|j| j.trim().to_string()),
        penulis: form.penulis,
        genre: form.genre.as_deref().map(parse_genre),
        cover: new_cover.clone(),
    };

    match state.storage.update_komik(&id, patch).await {
        Ok((komik, replaced_cover)) => {
            if let Some(old) = replaced_cover {
                remove_or_record(&state, &old).await;
            }
            Ok(Json(komik))
        }
        Err(e) => {
            if let Some(path) = &new_cover {
                remove_or_record(&state, path).await;
            }
            Err(e.into())
        }
    }
}

#[derive(Deserialize)]
pub struct GantiIdBody {
    #[serde(rename = "idBaru")]
    pub id_baru: String,
}

pub async fn ganti_id(
    State(state): State<AppState>,
    _identity: Identity,
    Path(id): Path<String>,
    Json(body): Json<GantiIdBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id_baru = body.id_baru.trim();
    if id_baru.is_empty() {
        return Err(AppError::Validation("idBaru is required".to_string()));
    }

    let komik = state.storage.ganti_id(&id, id_baru).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "komik id replaced",
        "komik": komik
    })))
}

pub async fn soft_delete_komik(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .storage
        .soft_delete_komik(&id, &identity.username)
        .await?;
    Ok(Json(json!({
        "status": "success",
        "message": "komik moved to trash"
    })))
}

pub async fn restore_komik(
    State(state): State<AppState>,
    Admin(_identity): Admin,
    Path(id): Path<String>,
) -> Result<Json<Komik>, AppError> {
    Ok(Json(state.storage.restore_komik(&id).await?))
}

pub async fn purge_komik(
    State(state): State<AppState>,
    Admin(_identity): Admin,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let files = state.storage.purge_komik(&id).await?;
    for path in &files {
        remove_or_record(&state, path).await;
    }

    Ok(Json(json!({
        "status": "success",
        "message": "komik and all its chapters deleted"
    })))
}
