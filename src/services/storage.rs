use s3::creds::Credentials;
use s3::{Bucket, Region};

/// Client for the S3-compatible bucket holding uploaded originals.
pub struct StorageClient {
    bucket: Box<Bucket>,
}

impl StorageClient {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }

    /// Upload image bytes.
    pub async fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(StorageError::S3)?;
        Ok(())
    }

    /// Presign a time-limited GET URL so Replicate can fetch the image.
    pub async fn presign_download(
        &self,
        key: &str,
        expiry_secs: u32,
    ) -> Result<String, StorageError> {
        self.bucket
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(StorageError::S3)
    }
}

/// Extract the object key from a public image URL.
///
/// Falls back to the last path segment when the URL does not carry the
/// expected public prefix.
pub fn object_key_from_url<'a>(image_url: &'a str, public_base_url: &str) -> &'a str {
    let base = public_base_url.trim_end_matches('/');
    if let Some(rest) = image_url.strip_prefix(base) {
        let key = rest.trim_start_matches('/');
        if !key.is_empty() {
            return key;
        }
    }
    image_url.rsplit('/').next().unwrap_or(image_url)
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://cdn.example.com/restorations";

    #[test]
    fn test_key_from_public_url() {
        let url = "https://cdn.example.com/restorations/uploads/abc_photo.jpg";
        assert_eq!(object_key_from_url(url, BASE), "uploads/abc_photo.jpg");
    }

    #[test]
    fn test_key_with_trailing_slash_base() {
        let url = "https://cdn.example.com/restorations/uploads/abc_photo.jpg";
        assert_eq!(
            object_key_from_url(url, "https://cdn.example.com/restorations/"),
            "uploads/abc_photo.jpg"
        );
    }

    #[test]
    fn test_foreign_url_falls_back_to_filename() {
        let url = "https://elsewhere.example.com/some/path/photo.jpg";
        assert_eq!(object_key_from_url(url, BASE), "photo.jpg");
    }
}
