use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;

use super::models::{
    Chapter, ChapterJoinRow, ChapterSummary, ChapterWithKomik, Komik, KomikDetail, OrphanFile,
    Page, User,
};
use crate::slug;

/// Upper bound on slug candidates tried before giving up. Only reachable
/// when this many comics share the same base title.
const MAX_SLUG_ATTEMPTS: usize = 1000;

const CHAPTER_JOIN: &str = "SELECT c.id, c.komik_id, c.judul, c.nomor, c.halaman, \
     c.tanggal_terbit, c.created_at, c.updated_at, \
     k.judul AS komik_judul, k.slug AS komik_slug \
     FROM chapter c JOIN komik k ON k.id = c.komik_id";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to encode field: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

pub struct CreateKomikParams {
    pub judul: String,
    pub penulis: String,
    pub genre: Vec<String>,
    pub cover: Option<String>,
}

#[derive(Default)]
pub struct UpdateKomikParams {
    pub judul: Option<String>,
    pub penulis: Option<String>,
    pub genre: Option<Vec<String>>,
    pub cover: Option<String>,
}

pub struct CreateChapterParams {
    pub komik_id: String,
    pub judul: String,
    pub nomor: f64,
    pub halaman: Vec<String>,
}

#[derive(Default)]
pub struct UpdateChapterParams {
    pub judul: Option<String>,
    pub nomor: Option<f64>,
    pub halaman: Option<Vec<String>>,
}

/// Validated paging/sorting input. `sort_column` must come from a handler
/// whitelist; it is interpolated into SQL.
pub struct ListParams {
    pub page: u32,
    pub limit: u32,
    pub sort_column: &'static str,
    pub descending: bool,
}

impl ListParams {
    fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }

    fn order_dir(&self) -> &'static str {
        if self.descending {
            "DESC"
        } else {
            "ASC"
        }
    }
}

#[derive(Default)]
pub struct ChapterFilter {
    pub keyword: String,
    pub komik_id: Option<String>,
}

#[derive(Clone)]
pub struct Storage {
    pub pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(data_dir: &str) -> StoreResult<Self> {
        let path = PathBuf::from(data_dir);
        if !path.exists() {
            fs::create_dir_all(&path).await?;
        }

        let db_path = path.join("komik.db");
        let db_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory database, used by tests. A single connection keeps every
    /// query on the same `:memory:` instance.
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        init_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

async fn init_schema(pool: &Pool<Sqlite>) -> StoreResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS komik (
            id TEXT PRIMARY KEY,
            judul TEXT NOT NULL,
            penulis TEXT NOT NULL,
            genre TEXT NOT NULL DEFAULT '[]',
            cover TEXT,
            slug TEXT NOT NULL,
            views INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER,
            deleted_by TEXT
        )",
    )
    .execute(pool)
    .await?;

    // Slug uniqueness applies to live rows only; a soft-deleted komik frees
    // its slug until restored.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_komik_slug
         ON komik(slug) WHERE deleted_at IS NULL",
    )
    .execute(pool)
    .await?;

    // The FK is deferred so ganti-id can delete the old row and insert the
    // copy inside one transaction before chapters are repointed.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chapter (
            id TEXT PRIMARY KEY,
            komik_id TEXT NOT NULL REFERENCES komik(id) DEFERRABLE INITIALLY DEFERRED,
            judul TEXT NOT NULL,
            nomor REAL NOT NULL,
            halaman TEXT NOT NULL DEFAULT '[]',
            tanggal_terbit INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_chapter_nomor
         ON chapter(komik_id, nomor)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            created_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS orphan_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL,
            reason TEXT NOT NULL,
            recorded_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

impl Storage {
    /// Insert a new komik, walking slug candidates until the unique index
    /// accepts one. The insert itself is the uniqueness check.
    pub async fn create_komik(&self, params: CreateKomikParams) -> StoreResult<Komik> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_ts();
        let genre = serde_json::to_string(&params.genre)?;

        for candidate in slug::candidates(&params.judul).take(MAX_SLUG_ATTEMPTS) {
            let res = sqlx::query(
                "INSERT INTO komik (id, judul, penulis, genre, cover, slug, views, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)",
            )
            .bind(&id)
            .bind(&params.judul)
            .bind(&params.penulis)
            .bind(&genre)
            .bind(&params.cover)
            .bind(&candidate)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await;

            match res {
                Ok(_) => {
                    return self
                        .get_komik(&id)
                        .await?
                        .ok_or(StoreError::NotFound("komik"))
                }
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Conflict(format!(
            "no free slug for title {:?}",
            params.judul
        )))
    }

    pub async fn get_komik(&self, id: &str) -> StoreResult<Option<Komik>> {
        let komik =
            sqlx::query_as::<_, Komik>("SELECT * FROM komik WHERE id = ? AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(komik)
    }

    /// Slug lookup used by the reader frontend; bumps the view counter and
    /// returns the komik with its chapters ordered by number.
    pub async fn get_komik_by_slug(&self, slug: &str) -> StoreResult<Option<KomikDetail>> {
        let bumped =
            sqlx::query("UPDATE komik SET views = views + 1 WHERE slug = ? AND deleted_at IS NULL")
                .bind(slug)
                .execute(&self.pool)
                .await?;
        if bumped.rows_affected() == 0 {
            return Ok(None);
        }

        let komik =
            sqlx::query_as::<_, Komik>("SELECT * FROM komik WHERE slug = ? AND deleted_at IS NULL")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        let Some(komik) = komik else {
            return Ok(None);
        };

        let chapters = sqlx::query_as::<_, ChapterSummary>(
            "SELECT id, nomor, judul, halaman FROM chapter WHERE komik_id = ? ORDER BY nomor ASC",
        )
        .bind(&komik.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(KomikDetail { komik, chapters }))
    }

    pub async fn search_komik(&self, q: &str) -> StoreResult<Vec<Komik>> {
        let pattern = format!("%{}%", escape_like(q));
        let hits = sqlx::query_as::<_, Komik>(
            "SELECT * FROM komik WHERE deleted_at IS NULL AND judul LIKE ? ESCAPE '\\' \
             ORDER BY judul ASC",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(hits)
    }

    pub async fn list_komik(&self, params: &ListParams) -> StoreResult<Page<Komik>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM komik WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT * FROM komik WHERE deleted_at IS NULL ORDER BY {} {} LIMIT ? OFFSET ?",
            params.sort_column,
            params.order_dir()
        );
        let rows = sqlx::query_as::<_, Komik>(&sql)
            .bind(i64::from(params.limit))
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(total, params.page, params.limit, rows))
    }

    /// Partial update. A changed title recomputes the slug (again by letting
    /// the unique index arbitrate). Returns the updated komik plus the old
    /// cover path when a new one replaced it, so the caller can clean up.
    pub async fn update_komik(
        &self,
        id: &str,
        patch: UpdateKomikParams,
    ) -> StoreResult<(Komik, Option<String>)> {
        let current = self
            .get_komik(id)
            .await?
            .ok_or(StoreError::NotFound("komik"))?;
        let now = now_ts();

        let replaced_cover = match (&patch.cover, &current.cover) {
            (Some(_), Some(old)) => Some(old.clone()),
            _ => None,
        };

        let judul = patch.judul.unwrap_or_else(|| current.judul.clone());
        let penulis = patch.penulis.unwrap_or_else(|| current.penulis.clone());
        let genre = serde_json::to_string(patch.genre.as_ref().unwrap_or(&current.genre))?;
        let cover = patch.cover.or_else(|| current.cover.clone());

        if judul != current.judul {
            for candidate in slug::candidates(&judul).take(MAX_SLUG_ATTEMPTS) {
                let res = sqlx::query(
                    "UPDATE komik SET judul = ?, penulis = ?, genre = ?, cover = ?, slug = ?, \
                     updated_at = ? WHERE id = ? AND deleted_at IS NULL",
                )
                .bind(&judul)
                .bind(&penulis)
                .bind(&genre)
                .bind(&cover)
                .bind(&candidate)
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await;

                match res {
                    Ok(_) => {
                        let komik = self
                            .get_komik(id)
                            .await?
                            .ok_or(StoreError::NotFound("komik"))?;
                        return Ok((komik, replaced_cover));
                    }
                    Err(e) if is_unique_violation(&e) => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            return Err(StoreError::Conflict(format!(
                "no free slug for title {judul:?}"
            )));
        }

        sqlx::query(
            "UPDATE komik SET penulis = ?, genre = ?, cover = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&penulis)
        .bind(&genre)
        .bind(&cover)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let komik = self
            .get_komik(id)
            .await?
            .ok_or(StoreError::NotFound("komik"))?;
        Ok((komik, replaced_cover))
    }

    /// Re-home a komik under a caller-supplied id: copy the record, repoint
    /// its chapters, drop the original. The primary key rejects a taken id;
    /// the deferred chapter FK lets delete-then-insert run in one
    /// transaction.
    pub async fn ganti_id(&self, old_id: &str, new_id: &str) -> StoreResult<Komik> {
        let mut tx = self.pool.begin().await?;

        let current =
            sqlx::query_as::<_, Komik>("SELECT * FROM komik WHERE id = ? AND deleted_at IS NULL")
                .bind(old_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::NotFound("komik"))?;

        sqlx::query("DELETE FROM komik WHERE id = ?")
            .bind(old_id)
            .execute(&mut *tx)
            .await?;

        let genre = serde_json::to_string(&current.genre)?;
        let insert = sqlx::query(
            "INSERT INTO komik (id, judul, penulis, genre, cover, slug, views, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new_id)
        .bind(&current.judul)
        .bind(&current.penulis)
        .bind(&genre)
        .bind(&current.cover)
        .bind(&current.slug)
        .bind(current.views)
        .bind(current.created_at)
        .bind(now_ts())
        .execute(&mut *tx)
        .await;

        if let Err(e) = insert {
            return if is_unique_violation(&e) {
                Err(StoreError::Conflict("idBaru already in use".to_string()))
            } else {
                Err(e.into())
            };
        }

        sqlx::query("UPDATE chapter SET komik_id = ? WHERE komik_id = ?")
            .bind(new_id)
            .bind(old_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_komik(new_id)
            .await?
            .ok_or(StoreError::NotFound("komik"))
    }

    pub async fn soft_delete_komik(&self, id: &str, actor: &str) -> StoreResult<()> {
        let now = now_ts();
        let res = sqlx::query(
            "UPDATE komik SET deleted_at = ?, deleted_by = ?, updated_at = ? \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(actor)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("komik"));
        }
        Ok(())
    }

    pub async fn restore_komik(&self, id: &str) -> StoreResult<Komik> {
        let res = sqlx::query(
            "UPDATE komik SET deleted_at = NULL, deleted_by = NULL, updated_at = ? \
             WHERE id = ? AND deleted_at IS NOT NULL",
        )
        .bind(now_ts())
        .bind(id)
        .execute(&self.pool)
        .await;

        match res {
            Ok(r) if r.rows_affected() == 0 => Err(StoreError::NotFound("komik")),
            Ok(_) => self
                .get_komik(id)
                .await?
                .ok_or(StoreError::NotFound("komik")),
            // Restoring re-enters the row into the partial slug index; a
            // newer komik may own the slug by now.
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(
                "another komik now owns this slug".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Permanent removal with cascade. Returns every stored file path the
    /// deleted records referenced (cover + all chapter pages) for cleanup.
    pub async fn purge_komik(&self, id: &str) -> StoreResult<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        let komik = sqlx::query_as::<_, Komik>("SELECT * FROM komik WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound("komik"))?;

        let page_lists: Vec<String> =
            sqlx::query_scalar("SELECT halaman FROM chapter WHERE komik_id = ?")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM chapter WHERE komik_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM komik WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let mut files = Vec::new();
        for raw in page_lists {
            files.extend(serde_json::from_str::<Vec<String>>(&raw)?);
        }
        if let Some(cover) = komik.cover {
            files.push(cover);
        }
        Ok(files)
    }
}

impl Storage {
    pub async fn create_chapter(
        &self,
        params: CreateChapterParams,
    ) -> StoreResult<ChapterWithKomik> {
        if self.get_komik(&params.komik_id).await?.is_none() {
            return Err(StoreError::NotFound("komik"));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_ts();
        let halaman = serde_json::to_string(&params.halaman)?;

        let res = sqlx::query(
            "INSERT INTO chapter (id, komik_id, judul, nomor, halaman, tanggal_terbit, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&params.komik_id)
        .bind(&params.judul)
        .bind(params.nomor)
        .bind(&halaman)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::Conflict(format!(
                    "chapter number {} already exists for this komik",
                    params.nomor
                )))
            }
            Err(e) => return Err(e.into()),
        }

        self.get_chapter(&id)
            .await?
            .ok_or(StoreError::NotFound("chapter"))
    }

    pub async fn get_chapter(&self, id: &str) -> StoreResult<Option<ChapterWithKomik>> {
        let sql = format!("{CHAPTER_JOIN} WHERE c.id = ?");
        let row = sqlx::query_as::<_, ChapterJoinRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    pub async fn list_chapters(
        &self,
        filter: &ChapterFilter,
        params: &ListParams,
    ) -> StoreResult<Page<ChapterWithKomik>> {
        let pattern = format!("%{}%", escape_like(&filter.keyword));
        let komik_id = filter.komik_id.clone().unwrap_or_default();

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chapter c WHERE c.judul LIKE ? ESCAPE '\\' \
             AND (? = '' OR c.komik_id = ?)",
        )
        .bind(&pattern)
        .bind(&komik_id)
        .bind(&komik_id)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "{CHAPTER_JOIN} WHERE c.judul LIKE ? ESCAPE '\\' AND (? = '' OR c.komik_id = ?) \
             ORDER BY c.{} {} LIMIT ? OFFSET ?",
            params.sort_column,
            params.order_dir()
        );
        let rows = sqlx::query_as::<_, ChapterJoinRow>(&sql)
            .bind(&pattern)
            .bind(&komik_id)
            .bind(&komik_id)
            .bind(i64::from(params.limit))
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(
            total,
            params.page,
            params.limit,
            rows.into_iter().map(Into::into).collect(),
        ))
    }

    /// Chapters of one komik, or `None` when the komik does not exist (an
    /// empty page is not a lookup failure).
    pub async fn list_chapters_by_komik(
        &self,
        komik_id: &str,
        params: &ListParams,
    ) -> StoreResult<Option<Page<ChapterWithKomik>>> {
        if self.get_komik(komik_id).await?.is_none() {
            return Ok(None);
        }

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chapter WHERE komik_id = ?")
            .bind(komik_id)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "{CHAPTER_JOIN} WHERE c.komik_id = ? ORDER BY c.{} {} LIMIT ? OFFSET ?",
            params.sort_column,
            params.order_dir()
        );
        let rows = sqlx::query_as::<_, ChapterJoinRow>(&sql)
            .bind(komik_id)
            .bind(i64::from(params.limit))
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Some(Page::new(
            total,
            params.page,
            params.limit,
            rows.into_iter().map(Into::into).collect(),
        )))
    }

    /// Partial update. Returns the updated chapter plus the old page paths
    /// when a new page set replaced them.
    pub async fn update_chapter(
        &self,
        id: &str,
        patch: UpdateChapterParams,
    ) -> StoreResult<(ChapterWithKomik, Vec<String>)> {
        let current = sqlx::query_as::<_, Chapter>("SELECT * FROM chapter WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("chapter"))?;

        let judul = patch.judul.unwrap_or_else(|| current.judul.clone());
        let nomor = patch.nomor.unwrap_or(current.nomor);
        let replaced_pages = if patch.halaman.is_some() {
            current.halaman.clone()
        } else {
            Vec::new()
        };
        let halaman = serde_json::to_string(patch.halaman.as_ref().unwrap_or(&current.halaman))?;

        let res = sqlx::query(
            "UPDATE chapter SET judul = ?, nomor = ?, halaman = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&judul)
        .bind(nomor)
        .bind(&halaman)
        .bind(now_ts())
        .bind(id)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::Conflict(format!(
                    "chapter number {nomor} already exists for this komik"
                )))
            }
            Err(e) => return Err(e.into()),
        }

        let chapter = self
            .get_chapter(id)
            .await?
            .ok_or(StoreError::NotFound("chapter"))?;
        Ok((chapter, replaced_pages))
    }

    /// Permanent delete. Returns the page paths for file cleanup.
    pub async fn delete_chapter(&self, id: &str) -> StoreResult<Vec<String>> {
        let chapter = sqlx::query_as::<_, Chapter>("SELECT * FROM chapter WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("chapter"))?;

        sqlx::query("DELETE FROM chapter WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(chapter.halaman)
    }
}

impl Storage {
    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> StoreResult<User> {
        let id = uuid::Uuid::new_v4().to_string();

        let res = sqlx::query(
            "INSERT INTO users (id, username, password_hash, role, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .bind(now_ts())
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::Conflict("username already in use".to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        self.get_user_by_username(username)
            .await?
            .ok_or(StoreError::NotFound("user"))
    }

    pub async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

impl Storage {
    /// Ledger entry for a file the server failed to unlink.
    pub async fn record_orphan(&self, path: &str, reason: &str) -> StoreResult<()> {
        sqlx::query("INSERT INTO orphan_files (path, reason, recorded_at) VALUES (?, ?, ?)")
            .bind(path)
            .bind(reason)
            .bind(now_ts())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_orphans(&self) -> StoreResult<Vec<OrphanFile>> {
        let orphans =
            sqlx::query_as::<_, OrphanFile>("SELECT * FROM orphan_files ORDER BY recorded_at ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(orphans)
    }
}
