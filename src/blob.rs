use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use axum::async_trait;
use image::ImageFormat;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Covers,
    Photos,
    Celebrities,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Covers, Bucket::Photos, Bucket::Celebrities];

    pub fn name(self) -> &'static str {
        match self {
            Bucket::Covers => "covers",
            Bucket::Photos => "photos",
            Bucket::Celebrities => "celebrities",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BlobError {
    #[error("Could not access the blob storage")]
    Io(#[from] std::io::Error),
    #[error("File should be an image")]
    NotAnImage(#[from] image::ImageError),
    #[error("Invalid file name '{0}'")]
    InvalidName(String),
    #[error("No file named '{0}'")]
    NotFound(String),
}

/// Storage for user supplied binary files.
///
/// Only the returned file name is meant to be persisted, URLs are derived
/// from it whenever they are displayed.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload_file(&self, bucket: Bucket, data: Vec<u8>) -> Result<String, BlobError>;

    fn file_url(&self, bucket: Bucket, file_name: &str) -> String;

    async fn delete_file(&self, bucket: Bucket, file_name: &str) -> Result<(), BlobError>;
}

/// Blob store backed by one directory per bucket, served under `public_url`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_url: String,
}

impl LocalBlobStore {
    /// Creates the bucket directories. Must complete before any request is
    /// served.
    pub async fn provision(
        root: impl Into<PathBuf>,
        public_url: impl Into<String>,
    ) -> Result<Self, BlobError> {
        let root = root.into();

        for bucket in Bucket::ALL {
            tokio::fs::create_dir_all(root.join(bucket.name())).await?;
        }

        tracing::info!("Provisioned blob buckets in {}", root.display());

        Ok(Self {
            root,
            public_url: public_url.into(),
        })
    }

    fn path(&self, bucket: Bucket, file_name: &str) -> Result<PathBuf, BlobError> {
        let valid = !file_name.is_empty()
            && Path::new(file_name).file_name().and_then(|n| n.to_str()) == Some(file_name)
            && file_name != ".."
            && file_name != ".";

        match valid {
            true => Ok(self.root.join(bucket.name()).join(file_name)),
            false => Err(BlobError::InvalidName(file_name.to_string())),
        }
    }

    pub async fn read_file(&self, bucket: Bucket, file_name: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path(bucket, file_name)?;

        match tokio::fs::read(path).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(file_name.to_string()))
            }
            r => Ok(r?),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload_file(&self, bucket: Bucket, data: Vec<u8>) -> Result<String, BlobError> {
        let file_name = format!("{}.jpg", Uuid::new_v4());
        let path = self.path(bucket, &file_name)?;

        let encoded = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, BlobError> {
            let img = image::load_from_memory(&data)?;
            let mut encoded = Cursor::new(Vec::new());
            img.to_rgb8().write_to(&mut encoded, ImageFormat::Jpeg)?;
            Ok(encoded.into_inner())
        })
        .await
        .map_err(std::io::Error::other)??;

        tokio::fs::write(path, encoded).await?;

        tracing::debug!(bucket = bucket.name(), file_name, "stored upload");

        Ok(file_name)
    }

    fn file_url(&self, bucket: Bucket, file_name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_url.trim_end_matches('/'),
            bucket.name(),
            file_name
        )
    }

    async fn delete_file(&self, bucket: Bucket, file_name: &str) -> Result<(), BlobError> {
        let path = self.path(bucket, file_name)?;

        match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            r => Ok(r?),
        }
    }
}
