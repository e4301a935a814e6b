/*!
 * Media Store
 * Uploaded files on disk, addressed by generated filename
 */
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::db::models::InvalidValue;
use crate::error::{ApiError, ApiResult};

/// Public URL prefix the upload directory is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "webm"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            _ => Err(InvalidValue::new("media type", s)),
        }
    }
}

impl TryFrom<String> for MediaType {
    type Error = InvalidValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A file received from a multipart form, not yet on disk.
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: String,
    pub bytes: Vec<u8>,
}

/// A file written into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub filename: String,
    pub media_type: MediaType,
    pub size: usize,
}

/// Sniff the container from its leading bytes.
fn detect_media_type(bytes: &[u8]) -> Option<MediaType> {
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some(MediaType::Image),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(MediaType::Image),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some(MediaType::Image),
        // WebP: RIFF ... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some(MediaType::Image),
        // MP4 / MOV: ... ftyp
        [_, _, _, _, 0x66, 0x74, 0x79, 0x70, ..] => Some(MediaType::Video),
        // WebM / Matroska EBML header
        [0x1A, 0x45, 0xDF, 0xA3, ..] => Some(MediaType::Video),
        _ => None,
    }
}

fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

fn media_type_from_extension(name: &str) -> Option<MediaType> {
    let ext = extension_of(name);
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaType::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaType::Video)
    } else {
        None
    }
}

/// Keep only characters that are safe in a filename and a URL path segment.
pub fn sanitize_original_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Random 128-bit hex prefix followed by the sanitized original name.
pub fn generate_filename(original_name: &str) -> String {
    format!(
        "{:032x}-{}",
        rand::random::<u128>(),
        sanitize_original_name(original_name)
    )
}

fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains('\0')
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    pub fn path_of(&self, filename: &str) -> Option<PathBuf> {
        is_safe_filename(filename).then(|| self.root.join(filename))
    }

    pub fn public_url(filename: &str) -> String {
        format!("{}/{}", PUBLIC_PREFIX, filename)
    }

    pub async fn exists(&self, filename: &str) -> bool {
        match self.path_of(filename) {
            Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            None => false,
        }
    }

    /// Validate and write an upload. The returned filename is unique within the store.
    pub async fn store(&self, upload: &Upload) -> ApiResult<StoredMedia> {
        if upload.bytes.is_empty() {
            return Err(ApiError::bad_request("Empty file"));
        }

        let media_type = detect_media_type(&upload.bytes)
            .or_else(|| media_type_from_extension(&upload.original_name))
            .ok_or_else(|| {
                ApiError::bad_request(
                    "Unsupported file type. Allowed: JPEG, PNG, WebP, GIF, MP4, MOV, WebM.",
                )
            })?;

        self.ensure_root().await?;

        let filename = generate_filename(&upload.original_name);
        let path = self.root.join(&filename);
        tokio::fs::write(&path, &upload.bytes).await?;

        tracing::info!(
            filename = %filename,
            media_type = media_type.as_str(),
            size = upload.bytes.len(),
            "media stored"
        );

        Ok(StoredMedia {
            filename,
            media_type,
            size: upload.bytes.len(),
        })
    }

    /// Delete a stored file. A missing file is not an error.
    pub async fn remove(&self, filename: &str) -> std::io::Result<()> {
        let Some(path) = self.path_of(filename) else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("refusing to remove unsafe filename {:?}", filename),
            ));
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(filename = %filename, "media removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Remove a file and only log a failure; used during cleanup.
    pub async fn discard(&self, filename: &str) {
        if let Err(e) = self.remove(filename).await {
            tracing::warn!(filename = %filename, error = %e, "failed to remove media file");
        }
    }

    /// Run the row write that moves a record from `old` to `new`.
    ///
    /// `new` must already be on disk. When the write succeeds `old` is removed;
    /// when it fails `new` is removed and `old` is left untouched.
    pub async fn commit<T, F>(&self, new: Option<&str>, old: Option<&str>, write: F) -> ApiResult<T>
    where
        F: Future<Output = ApiResult<T>>,
    {
        match write.await {
            Ok(value) => {
                if let Some(old) = old.filter(|old| Some(*old) != new) {
                    self.discard(old).await;
                }
                Ok(value)
            }
            Err(e) => {
                if let Some(new) = new {
                    self.discard(new).await;
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const MP4: &[u8] = &[0, 0, 0, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm'];

    fn upload(name: &str, bytes: &[u8]) -> Upload {
        Upload {
            original_name: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_detect_media_type() {
        assert_eq!(detect_media_type(PNG), Some(MediaType::Image));
        assert_eq!(detect_media_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(MediaType::Image));
        assert_eq!(detect_media_type(MP4), Some(MediaType::Video));
        assert_eq!(detect_media_type(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]), Some(MediaType::Video));
        assert_eq!(detect_media_type(b"hello world"), None);
    }

    #[test]
    fn test_sanitize_original_name() {
        assert_eq!(sanitize_original_name("logo.png"), "logo.png");
        assert_eq!(sanitize_original_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_original_name("my photo (1).jpg"), "my_photo__1_.jpg");
        assert_eq!(sanitize_original_name(".hidden"), "hidden");
        assert_eq!(sanitize_original_name(""), "upload");
    }

    #[test]
    fn test_generated_filenames_have_hex_prefix_and_differ() {
        let a = generate_filename("logo.png");
        let b = generate_filename("logo.png");
        assert_ne!(a, b);
        let (prefix, rest) = a.split_once('-').unwrap();
        assert_eq!(prefix.len(), 32);
        assert!(prefix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(rest, "logo.png");
    }

    #[test]
    fn test_media_type_parse() {
        assert_eq!("IMAGE".parse::<MediaType>(), Ok(MediaType::Image));
        assert_eq!("video".parse::<MediaType>(), Ok(MediaType::Video));
        assert!("audio".parse::<MediaType>().is_err());
    }

    #[tokio::test]
    async fn test_store_writes_file_into_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().join("uploads"));

        let stored = store.store(&upload("Logo.png", PNG)).await.unwrap();
        assert_eq!(stored.media_type, MediaType::Image);
        assert_eq!(stored.size, PNG.len());
        assert!(stored.filename.ends_with("-Logo.png"));
        assert!(store.exists(&stored.filename).await);

        let on_disk = std::fs::read(dir.path().join("uploads").join(&stored.filename)).unwrap();
        assert_eq!(on_disk, PNG);
    }

    #[tokio::test]
    async fn test_store_rejects_empty_and_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());

        let err = store.store(&upload("a.png", &[])).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = store.store(&upload("notes.txt", b"plain text")).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_store_falls_back_to_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());

        let stored = store.store(&upload("clip.webm", b"not-sniffable")).await.unwrap();
        assert_eq!(stored.media_type, MediaType::Video);
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());
        assert!(store.remove("does-not-exist.png").await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());
        let stored = store.store(&upload("logo.png", PNG)).await.unwrap();

        store.remove(&stored.filename).await.unwrap();
        assert!(!store.exists(&stored.filename).await);
    }

    #[tokio::test]
    async fn test_remove_refuses_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());
        assert!(store.remove("../secret").await.is_err());
        assert!(store.path_of("a/b.png").is_none());
    }

    #[tokio::test]
    async fn test_commit_replacement_removes_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());
        let old = store.store(&upload("old.png", PNG)).await.unwrap();
        let new = store.store(&upload("new.png", PNG)).await.unwrap();

        let row = store
            .commit(Some(&new.filename), Some(&old.filename), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(row, 7);
        assert!(store.exists(&new.filename).await);
        assert!(!store.exists(&old.filename).await);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());
        let old = store.store(&upload("old.png", PNG)).await.unwrap();
        let new = store.store(&upload("new.png", PNG)).await.unwrap();

        let err = store
            .commit(Some(&new.filename), Some(&old.filename), async {
                Err::<(), _>(ApiError::not_found("gone"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(store.exists(&old.filename).await);
        assert!(!store.exists(&new.filename).await);
    }

    #[tokio::test]
    async fn test_commit_without_replacement_keeps_current_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());
        let current = store.store(&upload("logo.png", PNG)).await.unwrap();

        store
            .commit(Some(&current.filename), Some(&current.filename), async { Ok(()) })
            .await
            .unwrap();
        store.commit(None, None, async { Ok(()) }).await.unwrap();
        assert!(store.exists(&current.filename).await);
    }

    #[tokio::test]
    async fn test_logo_png_create_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());

        let stored = store.store(&upload("Logo.png", PNG)).await.unwrap();
        let url = store
            .commit(Some(&stored.filename), None, async {
                Ok(MediaStore::public_url(&stored.filename))
            })
            .await
            .unwrap();
        assert!(url.starts_with("/uploads/") && url.ends_with("-Logo.png"));
        assert_eq!(stored.media_type, MediaType::Image);
        assert!(store.exists(&stored.filename).await);

        store.commit(None, Some(&stored.filename), async { Ok(()) }).await.unwrap();
        assert!(!store.exists(&stored.filename).await);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_insert_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path());

        let stored = store.store(&upload("Logo.png", PNG)).await.unwrap();
        let result = store
            .commit(Some(&stored.filename), None, async {
                Err::<(), _>(ApiError::conflict("duplicate"))
            })
            .await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_public_url() {
        assert_eq!(MediaStore::public_url("abc-logo.png"), "/uploads/abc-logo.png");
    }
}
