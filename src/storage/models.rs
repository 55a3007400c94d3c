use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A comic title record. `genre` and the chapter page lists are stored as
/// JSON text columns; `deleted_at`/`deleted_by` carry the soft-delete
/// marker.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct Komik {
    pub id: String,
    pub judul: String,
    pub penulis: String,
    #[sqlx(json)]
    pub genre: Vec<String>,
    pub cover: Option<String>,
    pub slug: String,
    pub views: i64,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
}

/// A chapter record. `nomor` is unique within its owning komik.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct Chapter {
    pub id: String,
    pub komik_id: String,
    pub judul: String,
    pub nomor: f64,
    #[sqlx(json)]
    pub halaman: Vec<String>,
    pub tanggal_terbit: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Slim komik reference embedded in chapter listings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct KomikRef {
    pub id: String,
    pub judul: String,
    pub slug: String,
}

/// Chapter joined with its owning komik, the shape returned by the chapter
/// read endpoints.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ChapterWithKomik {
    pub id: String,
    pub komik: KomikRef,
    pub judul: String,
    pub nomor: f64,
    pub halaman: Vec<String>,
    pub tanggal_terbit: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Row shape for the chapter/komik join queries.
#[derive(Debug, FromRow)]
pub(crate) struct ChapterJoinRow {
    pub id: String,
    pub komik_id: String,
    pub judul: String,
    pub nomor: f64,
    #[sqlx(json)]
    pub halaman: Vec<String>,
    pub tanggal_terbit: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub komik_judul: String,
    pub komik_slug: String,
}

impl From<ChapterJoinRow> for ChapterWithKomik {
    fn from(row: ChapterJoinRow) -> Self {
        ChapterWithKomik {
            id: row.id,
            komik: KomikRef {
                id: row.komik_id,
                judul: row.komik_judul,
                slug: row.komik_slug,
            },
            judul: row.judul,
            nomor: row.nomor,
            halaman: row.halaman,
            tanggal_terbit: row.tanggal_terbit,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Abbreviated chapter entry embedded in the komik-by-slug response.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct ChapterSummary {
    pub id: String,
    pub nomor: f64,
    pub judul: String,
    #[sqlx(json)]
    pub halaman: Vec<String>,
}

/// Komik detail with its ordered chapter list.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct KomikDetail {
    #[serde(flatten)]
    pub komik: Komik,
    pub chapters: Vec<ChapterSummary>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: i64,
}

/// A file the server failed to unlink; kept for manual reconciliation.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct OrphanFile {
    pub id: i64,
    pub path: String,
    pub reason: String,
    pub recorded_at: i64,
}

/// One page of a paginated listing, with the metadata the clients render
/// pagers from.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Page<T> {
    pub total: i64,
    pub page: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
    pub count: usize,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total: i64, page: u32, limit: u32, data: Vec<T>) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            (total + i64::from(limit) - 1) / i64::from(limit)
        };
        Page {
            total,
            page,
            total_pages,
            count: data.len(),
            data,
        }
    }
}
