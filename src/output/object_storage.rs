//! Image re-hosting into object storage
//!
//! Each image is downloaded from the marketplace and uploaded under
//! `{bucket}/{identifier}/{hash}.{ext}`. A failed image is logged and left
//! out of the result; it never fails the whole call.

use crate::model::Identifier;
use crate::output::{check_status, SinkResult};
use async_trait::async_trait;
use reqwest::header::{self, HeaderValue};
use reqwest::Client;
use sha2::{Digest, Sha256};
use url::Url;

/// Object-storage collaborator
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Copies the images and returns the public URLs of those that succeeded
    async fn rehost(&self, image_urls: &[String], identifier: &Identifier) -> Vec<String>;
}

/// Drops thumbnails and keeps at most `max_images`
pub fn select_images(image_urls: &[String], max_images: usize) -> Vec<String> {
    image_urls
        .iter()
        .filter(|url| !url.contains("/thumbnail/"))
        .take(max_images)
        .cloned()
        .collect()
}

/// Object storage speaking the Supabase storage API
pub struct HttpObjectStorage {
    client: Client,
    base_url: String,
    bucket: String,
    api_key: Option<String>,
}

impl HttpObjectStorage {
    pub fn new(client: Client, base_url: &str, bucket: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            api_key,
        }
    }

    /// Object path for one image, derived from the identifier and the source URL
    pub fn object_path(identifier: &Identifier, image_url: &str) -> String {
        let digest = hex::encode(Sha256::digest(image_url.as_bytes()));
        format!(
            "{}/{}.{}",
            identifier.as_str(),
            &digest[..16],
            image_extension(image_url)
        )
    }

    pub fn upload_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }

    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    async fn download(&self, image_url: &str) -> SinkResult<Vec<u8>> {
        let response = check_status(self.client.get(image_url).send().await?)?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn upload(&self, path: &str, image_url: &str, body: Vec<u8>) -> SinkResult<()> {
        let mut request = self
            .client
            .post(self.upload_url(path))
            .header(header::CONTENT_TYPE, content_type(image_url))
            .body(body);

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key).header("apikey", key.as_str());
        }

        check_status(request.send().await?)?;
        Ok(())
    }

    async fn rehost_one(&self, image_url: &str, identifier: &Identifier) -> SinkResult<String> {
        let body = self.download(image_url).await?;
        let path = Self::object_path(identifier, image_url);
        self.upload(&path, image_url, body).await?;
        Ok(self.public_url(&path))
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn rehost(&self, image_urls: &[String], identifier: &Identifier) -> Vec<String> {
        let mut public_urls = Vec::with_capacity(image_urls.len());

        for image_url in image_urls {
            match self.rehost_one(image_url, identifier).await {
                Ok(public_url) => public_urls.push(public_url),
                Err(e) => {
                    tracing::warn!(id = %identifier, "Failed to re-host {}: {}", image_url, e);
                }
            }
        }

        tracing::debug!(
            id = %identifier,
            "Re-hosted {}/{} images",
            public_urls.len(),
            image_urls.len()
        );
        public_urls
    }
}

/// Lowercase extension of the URL path, `jpg` unless it is a known image type
fn image_extension(image_url: &str) -> &'static str {
    let path = Url::parse(image_url)
        .map(|url| url.path().to_ascii_lowercase())
        .unwrap_or_else(|_| image_url.to_ascii_lowercase());

    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => "png",
        Some("gif") => "gif",
        Some("webp") => "webp",
        Some("jpeg") => "jpeg",
        _ => "jpg",
    }
}

fn content_type(image_url: &str) -> HeaderValue {
    HeaderValue::from_static(match image_extension(image_url) {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    })
}
