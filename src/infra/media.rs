//! Filesystem storage for post images served under `/media/`.

use std::error::Error as StdError;
use std::fmt::Write as FmtWrite;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut, stream};
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

/// Stored images live below this directory of the media root.
const POST_IMAGE_DIR: &str = "posts";
/// Longest slugged stem kept from an upload's name. Keeps the stored path
/// within the 255 characters of `posts.image` and a single path component
/// within filesystem name limits.
const MAX_STEM_LEN: usize = 100;
/// Longest stored path the posts table accepts.
pub const MAX_STORED_PATH_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error("`{filename}` is not an image")]
    NotAnImage { filename: String },
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file is larger than {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("uploaded file stream failed")]
    PayloadStream {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    /// Path relative to the media root, as saved on the post.
    pub stored_path: String,
    /// Lowercase hex SHA-256 of the payload.
    pub checksum: String,
    pub size_bytes: u64,
}

#[derive(Debug)]
pub struct MediaStorage {
    root: PathBuf,
    max_bytes: u64,
}

impl MediaStorage {
    /// Root the storage at `root`, creating the directory if needed.
    pub fn new(root: PathBuf, max_bytes: u64) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, max_bytes })
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Whether `filename` names an image type we accept.
    pub fn is_image_name(filename: &str) -> bool {
        mime_guess::from_path(filename)
            .first()
            .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE)
    }

    /// Stream an uploaded image to disk. Partial files are removed on failure.
    pub async fn store_image_stream<S>(
        &self,
        original_name: &str,
        stream: S,
    ) -> Result<StoredMedia, MediaError>
    where
        S: Stream<Item = Result<Bytes, MediaError>>,
    {
        if !Self::is_image_name(original_name) {
            return Err(MediaError::NotAnImage {
                filename: original_name.to_string(),
            });
        }

        let stored_path = build_stored_path(original_name);
        let absolute = self.resolve(&stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        match self.write_payload(&absolute, stream).await {
            Ok((checksum, size_bytes)) => Ok(StoredMedia {
                stored_path,
                checksum,
                size_bytes,
            }),
            Err(err) => {
                let _ = fs::remove_file(&absolute).await;
                Err(err)
            }
        }
    }

    /// Store a fully buffered image.
    pub async fn store_image(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredMedia, MediaError> {
        let stream = stream::once(async move { Ok::<_, MediaError>(data) });
        self.store_image_stream(original_name, stream).await
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, MediaError> {
        let absolute = self.resolve(stored_path)?;
        Ok(Bytes::from(fs::read(absolute).await?))
    }

    /// Remove a stored file; a missing file is not an error.
    pub async fn delete(&self, stored_path: &str) -> Result<(), MediaError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(MediaError::Io(err)),
        }
    }

    async fn write_payload<S>(&self, absolute: &Path, stream: S) -> Result<(String, u64), MediaError>
    where
        S: Stream<Item = Result<Bytes, MediaError>>,
    {
        let mut file = fs::File::create(absolute).await?;
        let mut hasher = Sha256::new();
        let mut total: u64 = 0;

        pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            total = total.saturating_add(chunk.len() as u64);
            if total > self.max_bytes {
                return Err(MediaError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            file.write_all(&chunk).await?;
            hasher.update(&chunk);
        }
        file.flush().await?;

        if total == 0 {
            return Err(MediaError::EmptyPayload);
        }

        Ok((hex_from_bytes(&hasher.finalize()), total))
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, MediaError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(MediaError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

fn build_stored_path(original_name: &str) -> String {
    let (year, month, day) = time::OffsetDateTime::now_utc().to_calendar_date();
    let identifier = Uuid::new_v4().simple();
    let filename = sanitize_filename(original_name);
    format!(
        "{POST_IMAGE_DIR}/{year}/{:02}/{day:02}/{identifier}-{filename}",
        month as u8
    )
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .map(slugify)
        .map(|value| truncate_slug(value, MAX_STEM_LEN))
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "image".to_string());

    match path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|value| !value.is_empty())
    {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

/// Cut a slug to at most `max` bytes without leaving a trailing separator.
fn truncate_slug(mut slug: String, max: usize) -> String {
    if slug.len() > max {
        let mut end = max;
        while !slug.is_char_boundary(end) {
            end -= 1;
        }
        slug.truncate(end);
        let trimmed = slug.trim_end_matches('-').len();
        slug.truncate(trimmed);
    }
    slug
}

fn hex_from_bytes(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(output, "{byte:02x}");
    }
    output
}
