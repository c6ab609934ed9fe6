use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use crate::error::StorageError;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn download(
        &self,
        bucket: &str,
        path: &str,
        access_token: Option<&str>,
    ) -> Result<Vec<u8>, StorageError>;
    async fn download_public(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError>;
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
        access_token: &str,
    ) -> Result<(), StorageError>;
    async fn list(
        &self,
        bucket: &str,
        access_token: Option<&str>,
    ) -> Result<Vec<String>, StorageError>;
}

#[derive(Deserialize)]
struct StorageErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ListedObject {
    name: String,
}

pub struct StorageApiClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl StorageApiClient {
    pub fn new(http: reqwest::Client, base_url: &str, anon_key: &str) -> Self {
        Self {
            http,
            base_url: format!("{}/storage/v1", base_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        }
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/object/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            path.trim_start_matches('/')
        )
    }

    fn authorized(
        &self,
        request: reqwest::RequestBuilder,
        access_token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let bearer = access_token.unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StorageErrorBody>(&text)
            .ok()
            .and_then(|body| body.message.or(body.error))
            .unwrap_or(text);
        Err(StorageError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ObjectStorage for StorageApiClient {
    async fn download(
        &self,
        bucket: &str,
        path: &str,
        access_token: Option<&str>,
    ) -> Result<Vec<u8>, StorageError> {
        let request = self.http.get(self.object_url(bucket, path));
        let response = self.authorized(request, access_token).send().await?;
        let response = Self::check(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn download_public(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let url = format!(
            "{}/object/public/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            path.trim_start_matches('/')
        );
        let response = self.http.get(url).send().await?;
        let response = Self::check(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
        access_token: &str,
    ) -> Result<(), StorageError> {
        let request = self
            .http
            .post(self.object_url(bucket, path))
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(body);
        let response = self.authorized(request, Some(access_token)).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        access_token: Option<&str>,
    ) -> Result<Vec<String>, StorageError> {
        let request = self
            .http
            .post(format!(
                "{}/object/list/{}",
                self.base_url,
                urlencoding::encode(bucket)
            ))
            .json(&serde_json::json!({
                "prefix": "",
                "limit": 100,
                "offset": 0,
                "sortBy": { "column": "name", "order": "asc" },
            }));
        let response = self.authorized(request, access_token).send().await?;
        let response = Self::check(response).await?;
        let objects = response.json::<Vec<ListedObject>>().await?;
        Ok(objects.into_iter().map(|object| object.name).collect())
    }
}
