//! Image upload pipeline.
//!
//! Validates declared MIME type and size before anything touches disk,
//! stores accepted files under a per-category directory with a
//! collision-resistant name, and re-encodes covers to a bounded webp with
//! an optional watermark. Transcoding runs on the blocking pool.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::{codecs::webp::WebPEncoder, imageops::FilterType, ExtendedColorType};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

use crate::config::Config;

/// Covers are bounded to fit inside this box; smaller images are left at
/// their native size.
const COVER_MAX_WIDTH: u32 = 1200;
const COVER_MAX_HEIGHT: u32 = 1800;

/// Offset of the watermark from the bottom-right corner, in pixels.
const WATERMARK_MARGIN: i64 = 16;

/// Maximum length kept from a sanitized original file stem.
const MAX_STEM_LEN: usize = 100;

const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file exceeds the upload limit of {limit} bytes")]
    TooLarge { limit: usize },
    #[error("unsupported file type {0:?}; allowed: image/jpeg, image/png, image/webp")]
    UnsupportedType(String),
    #[error("image processing failed: {0}")]
    Processing(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Logical destination for an upload, selecting the subdirectory and the
/// public URL prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Covers,
    Chapter,
    Profile,
    Default,
}

impl Category {
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Covers => "covers",
            Category::Chapter => "chapter",
            Category::Profile => "profile",
            Category::Default => "uploads",
        }
    }
}

/// A stored upload: the URL path persisted in the database plus where the
/// bytes actually live.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub public_path: String,
    pub disk_path: PathBuf,
}

pub struct UploadPipeline {
    root: PathBuf,
    max_bytes: usize,
    watermark: Option<PathBuf>,
}

impl UploadPipeline {
    pub fn new(root: PathBuf, config: &Config) -> Self {
        Self {
            root,
            max_bytes: config.upload_limit_bytes,
            watermark: config.watermark_path.clone(),
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn dir(&self, category: Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// Map a stored public path (`/covers/x.webp`) back to its disk
    /// location.
    pub fn resolve(&self, public_path: &str) -> PathBuf {
        self.root.join(public_path.trim_start_matches('/'))
    }

    /// Validate and persist one upload. Nothing is written when the size or
    /// type check fails.
    pub async fn store(
        &self,
        category: Category,
        original_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredFile, UploadError> {
        if data.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                limit: self.max_bytes,
            });
        }
        let ext = canonical_ext(content_type)
            .ok_or_else(|| UploadError::UnsupportedType(content_type.to_string()))?;

        let dir = self.dir(category);
        fs::create_dir_all(&dir).await?;

        let stem = sanitize_stem(original_name);
        let filename = format!("{}-{}.{}", Uuid::new_v4(), stem, ext);
        let disk_path = dir.join(&filename);
        fs::write(&disk_path, data).await?;

        Ok(StoredFile {
            public_path: format!("/{}/{}", category.dir_name(), filename),
            disk_path,
        })
    }

    /// Re-encode a stored cover to a bounded webp, compositing the
    /// configured watermark when present. Produces a sibling `<name>.webp`
    /// file; the raw original is left for the caller to clean up. A failed
    /// transcode leaves no partial output behind.
    pub async fn finalize_cover(&self, raw: &StoredFile) -> Result<StoredFile, UploadError> {
        let src = raw.disk_path.clone();
        let dst = appended_webp(&raw.disk_path);
        let out = dst.clone();
        let watermark = self.watermark.clone();

        tokio::task::spawn_blocking(move || transcode_cover(&src, &out, watermark.as_deref()))
            .await
            .map_err(|e| UploadError::Processing(e.to_string()))??;

        Ok(StoredFile {
            public_path: format!("{}.webp", raw.public_path),
            disk_path: dst,
        })
    }

    pub async fn remove_stored(&self, public_path: &str) -> std::io::Result<()> {
        fs::remove_file(self.resolve(public_path)).await
    }
}

fn appended_webp(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".webp");
    PathBuf::from(name)
}

fn canonical_ext(content_type: &str) -> Option<&'static str> {
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, ext)| *ext)
}

/// Lowercase the original file stem and squash anything outside
/// `[a-z0-9.-_]` into single underscores, capped at a fixed length.
fn sanitize_stem(original_name: &str) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");

    let mut out = String::with_capacity(stem.len());
    let mut last_was_underscore = false;
    for c in stem.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
            out.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore {
            out.push('_');
            last_was_underscore = true;
        }
    }

    if out.is_empty() {
        out.push_str("file");
    }
    out.truncate(MAX_STEM_LEN);
    out
}

fn transcode_cover(src: &Path, dst: &Path, watermark: Option<&Path>) -> Result<(), UploadError> {
    let result = (|| -> Result<(), UploadError> {
        let img = image::open(src).map_err(|e| UploadError::Processing(e.to_string()))?;
        let img = if img.width() > COVER_MAX_WIDTH || img.height() > COVER_MAX_HEIGHT {
            img.resize(COVER_MAX_WIDTH, COVER_MAX_HEIGHT, FilterType::Lanczos3)
        } else {
            img
        };

        let mut canvas = img.to_rgba8();
        if let Some(wm_path) = watermark {
            if wm_path.exists() {
                let wm = image::open(wm_path)
                    .map_err(|e| UploadError::Processing(e.to_string()))?
                    .to_rgba8();
                if wm.width() <= canvas.width() && wm.height() <= canvas.height() {
                    let x = (i64::from(canvas.width()) - i64::from(wm.width())
                        - WATERMARK_MARGIN)
                        .max(0);
                    let y = (i64::from(canvas.height()) - i64::from(wm.height())
                        - WATERMARK_MARGIN)
                        .max(0);
                    image::imageops::overlay(&mut canvas, &wm, x, y);
                }
            }
        }

        let file = std::fs::File::create(dst)?;
        let writer = BufWriter::new(file);
        WebPEncoder::new_lossless(writer)
            .encode(
                canvas.as_raw(),
                canvas.width(),
                canvas.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| UploadError::Processing(e.to_string()))?;
        Ok(())
    })();

    if result.is_err() {
        std::fs::remove_file(dst).ok();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(root: &Path) -> UploadPipeline {
        UploadPipeline::new(root.to_path_buf(), &Config::for_tests())
    }

    fn write_test_png(path: &Path, width: u32, height: u32) {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        image::DynamicImage::ImageRgb8(img).save(path).unwrap();
    }

    #[test]
    fn sanitize_stem_squashes_and_lowercases() {
        assert_eq!(sanitize_stem("My Cover (1).PNG"), "my_cover_1_");
        assert_eq!(sanitize_stem("naruto-v01.jpg"), "naruto-v01");
        assert_eq!(sanitize_stem("???.png"), "_");
    }

    #[tokio::test]
    async fn rejects_oversize_before_writing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pipeline = pipeline(tmp.path());
        let data = vec![0u8; pipeline.max_bytes() + 1];

        let err = pipeline
            .store(Category::Covers, "big.jpg", "image/jpeg", &data)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { .. }));

        // The destination directory must not even exist yet.
        assert!(!tmp.path().join("covers").exists());
    }

    #[tokio::test]
    async fn rejects_unsupported_type_before_writing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pipeline = pipeline(tmp.path());

        let err = pipeline
            .store(Category::Covers, "evil.html", "text/html", b"<html>")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType(_)));
        assert!(!tmp.path().join("covers").exists());
    }

    #[tokio::test]
    async fn stores_under_category_with_canonical_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pipeline = pipeline(tmp.path());

        let stored = pipeline
            .store(Category::Chapter, "Page 01.jpeg", "image/jpeg", b"fakejpeg")
            .await
            .unwrap();

        assert!(stored.public_path.starts_with("/chapter/"));
        assert!(stored.public_path.ends_with("-page_01.jpg"));
        assert!(stored.disk_path.exists());
        assert_eq!(pipeline.resolve(&stored.public_path), stored.disk_path);
    }

    #[tokio::test]
    async fn every_category_maps_to_its_own_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pipeline = pipeline(tmp.path());

        for (category, prefix) in [
            (Category::Covers, "/covers/"),
            (Category::Chapter, "/chapter/"),
            (Category::Profile, "/profile/"),
            (Category::Default, "/uploads/"),
        ] {
            let stored = pipeline
                .store(category, "avatar.png", "image/png", b"fakepng")
                .await
                .unwrap();
            assert!(stored.public_path.starts_with(prefix));
            assert!(stored.disk_path.exists());
        }
    }

    #[tokio::test]
    async fn finalize_cover_produces_webp_sibling() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pipeline = pipeline(tmp.path());

        let src = tmp.path().join("source.png");
        write_test_png(&src, 200, 300);
        let data = std::fs::read(&src).unwrap();

        let raw = pipeline
            .store(Category::Covers, "source.png", "image/png", &data)
            .await
            .unwrap();
        let cover = pipeline.finalize_cover(&raw).await.unwrap();

        assert!(cover.public_path.ends_with(".png.webp"));
        assert!(cover.disk_path.exists());
        assert!(std::fs::metadata(&cover.disk_path).unwrap().len() > 0);
        // The raw original is the caller's to clean up.
        assert!(raw.disk_path.exists());
    }

    #[tokio::test]
    async fn finalize_cover_failure_leaves_no_partial_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pipeline = pipeline(tmp.path());

        let raw = pipeline
            .store(Category::Covers, "broken.png", "image/png", b"not a png")
            .await
            .unwrap();

        let err = pipeline.finalize_cover(&raw).await.unwrap_err();
        assert!(matches!(err, UploadError::Processing(_)));
        assert!(!appended_webp(&raw.disk_path).exists());
    }

    #[test]
    fn large_cover_is_bounded_small_cover_untouched() {
        let tmp = tempfile::TempDir::new().unwrap();

        let big = tmp.path().join("big.png");
        write_test_png(&big, 2400, 2400);
        let big_out = tmp.path().join("big.webp");
        transcode_cover(&big, &big_out, None).unwrap();
        let (w, h) = image::image_dimensions(&big_out).unwrap();
        assert!(w <= COVER_MAX_WIDTH && h <= COVER_MAX_HEIGHT);

        let small = tmp.path().join("small.png");
        write_test_png(&small, 300, 450);
        let small_out = tmp.path().join("small.webp");
        transcode_cover(&small, &small_out, None).unwrap();
        assert_eq!(image::image_dimensions(&small_out).unwrap(), (300, 450));
    }

    #[test]
    fn watermark_is_composited_when_configured() {
        let tmp = tempfile::TempDir::new().unwrap();

        let src = tmp.path().join("cover.png");
        write_test_png(&src, 400, 600);
        let wm = tmp.path().join("watermark.png");
        write_test_png(&wm, 50, 20);

        let out = tmp.path().join("cover.webp");
        transcode_cover(&src, &out, Some(&wm)).unwrap();
        assert!(out.exists());
        assert_eq!(image::image_dimensions(&out).unwrap(), (400, 600));
    }
}
