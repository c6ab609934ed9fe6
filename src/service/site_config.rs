use std::sync::{Arc, RwLock};

use crate::{
    error::ConfigStoreError,
    service::storage::ObjectStorage,
    site_config::{PartialSiteConfig, SiteConfig},
};

pub const CONFIG_BUCKET: &str = "auth-site";
pub const CONFIG_FILE: &str = "config.json";

/// SQL an admin runs once to create the public config bucket and its policies.
pub fn storage_setup_sql() -> String {
    format!(
        r#"-- Create the bucket
insert into storage.buckets (id, name, public)
values ('{bucket}', '{bucket}', true);

-- Allow public access to read config
create policy "Public Access"
  on storage.objects for select
  using ( bucket_id = '{bucket}' );

-- Allow authenticated users to upload config
create policy "Authenticated Insert"
  on storage.objects for insert
  to authenticated
  with check ( bucket_id = '{bucket}' );

create policy "Authenticated Update"
  on storage.objects for update
  to authenticated
  using ( bucket_id = '{bucket}' );"#,
        bucket = CONFIG_BUCKET
    )
}

pub struct ConfigStore {
    storage: Arc<dyn ObjectStorage>,
    cached: RwLock<Arc<SiteConfig>>,
}

impl ConfigStore {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            storage,
            cached: RwLock::new(Arc::new(SiteConfig::default())),
        }
    }

    pub fn current(&self) -> Arc<SiteConfig> {
        match self.cached.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, config: SiteConfig) -> Arc<SiteConfig> {
        let config = Arc::new(config);
        match self.cached.write() {
            Ok(mut guard) => *guard = config.clone(),
            Err(poisoned) => *poisoned.into_inner() = config.clone(),
        }
        config
    }

    pub fn merge(partial: Option<PartialSiteConfig>) -> SiteConfig {
        SiteConfig::merged(partial)
    }

    fn parse(body: &[u8]) -> Option<PartialSiteConfig> {
        let text = String::from_utf8_lossy(body);
        if text.trim().is_empty() {
            tracing::warn!(bucket = CONFIG_BUCKET, file = CONFIG_FILE, "site config is empty");
            return None;
        }
        match serde_json::from_str::<PartialSiteConfig>(&text) {
            Ok(partial) => Some(partial),
            Err(err) => {
                tracing::warn!(error = %err, "site config rejected");
                None
            }
        }
    }

    pub async fn fetch(&self) -> Option<SiteConfig> {
        let body = match self.storage.download(CONFIG_BUCKET, CONFIG_FILE, None).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, "site config download failed, trying public url");
                match self.storage.download_public(CONFIG_BUCKET, CONFIG_FILE).await {
                    Ok(body) => body,
                    Err(err) => {
                        tracing::warn!(error = %err, "site config unavailable");
                        return None;
                    }
                }
            }
        };

        let partial = Self::parse(&body)?;
        let config = Self::merge(Some(partial));
        self.replace(config.clone());
        Some(config)
    }

    pub async fn reload(&self) -> Arc<SiteConfig> {
        match self.fetch().await {
            Some(_) => {
                tracing::debug!("site config reloaded");
                self.current()
            }
            None => self.current(),
        }
    }

    pub async fn upload(
        &self,
        config: &SiteConfig,
        access_token: &str,
    ) -> Result<(), ConfigStoreError> {
        let body = serde_json::to_vec_pretty(config)?;
        self.storage
            .upload(
                CONFIG_BUCKET,
                CONFIG_FILE,
                body,
                "application/json",
                access_token,
            )
            .await
            .map_err(|err| {
                if err.is_bucket_missing() {
                    ConfigStoreError::BucketMissing {
                        bucket: CONFIG_BUCKET,
                    }
                } else {
                    ConfigStoreError::Write(err.to_string())
                }
            })?;

        tracing::info!(bucket = CONFIG_BUCKET, file = CONFIG_FILE, "site config uploaded");
        self.replace(config.clone());
        Ok(())
    }

    pub async fn exists(&self, access_token: Option<&str>) -> bool {
        match self.storage.list(CONFIG_BUCKET, access_token).await {
            Ok(names) => names.iter().any(|name| name == CONFIG_FILE),
            Err(err) => {
                tracing::warn!(error = %err, "site config existence check failed");
                false
            }
        }
    }

    pub async fn initialize(&self, access_token: &str) -> Result<(), ConfigStoreError> {
        self.upload(&SiteConfig::default(), access_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{service::storage::memory::MemoryStorage, site_config::Provider};

    fn store_with(storage: MemoryStorage) -> (Arc<MemoryStorage>, ConfigStore) {
        let storage = Arc::new(storage);
        let store = ConfigStore::new(storage.clone());
        (storage, store)
    }

    #[tokio::test]
    async fn fetch_merges_partial_document() {
        let storage = MemoryStorage::with_bucket(CONFIG_BUCKET);
        storage.put(
            CONFIG_BUCKET,
            CONFIG_FILE,
            r#"{ "site": { "name": "Acme" }, "auth": { "enabledProviders": ["gitlab"] } }"#,
        );
        let (_, store) = store_with(storage);

        let config = store.fetch().await.expect("config should load");
        assert_eq!(config.site.name, "Acme");
        assert_eq!(config.auth.enabled_providers, vec![Provider::Gitlab]);
        assert_eq!(*store.current(), config);
    }

    #[tokio::test]
    async fn missing_bucket_yields_none_and_defaults() {
        let (_, store) = store_with(MemoryStorage::default());
        assert!(store.fetch().await.is_none());
        assert_eq!(*store.reload().await, SiteConfig::default());
    }

    #[tokio::test]
    async fn empty_body_is_not_found() {
        let storage = MemoryStorage::with_bucket(CONFIG_BUCKET);
        storage.put(CONFIG_BUCKET, CONFIG_FILE, "  \n");
        let (_, store) = store_with(storage);
        assert!(store.fetch().await.is_none());
    }

    #[tokio::test]
    async fn malformed_document_is_ignored() {
        let storage = MemoryStorage::with_bucket(CONFIG_BUCKET);
        storage.put(CONFIG_BUCKET, CONFIG_FILE, "{ not json");
        let (_, store) = store_with(storage);
        assert!(store.fetch().await.is_none());
        assert_eq!(*store.current(), SiteConfig::default());
    }

    #[tokio::test]
    async fn reload_failure_keeps_last_good_config() {
        let storage = MemoryStorage::with_bucket(CONFIG_BUCKET);
        storage.put(CONFIG_BUCKET, CONFIG_FILE, r#"{ "site": { "name": "Acme" } }"#);
        let (storage, store) = store_with(storage);
        store.reload().await;

        storage.put(CONFIG_BUCKET, CONFIG_FILE, "");
        assert_eq!(store.reload().await.site.name, "Acme");
    }

    #[tokio::test]
    async fn upload_writes_pretty_json_and_updates_cache() {
        let (storage, store) = store_with(MemoryStorage::with_bucket(CONFIG_BUCKET));
        let mut config = SiteConfig::default();
        config.site.name = "Uploaded".to_string();

        store.upload(&config, "token").await.unwrap();

        let body = storage.get(CONFIG_BUCKET, CONFIG_FILE).unwrap();
        assert!(body.contains("\n  \"site\""));
        assert_eq!(store.current().site.name, "Uploaded");
        assert!(store.exists(Some("token")).await);
    }

    #[tokio::test]
    async fn upload_distinguishes_missing_bucket() {
        let (_, store) = store_with(MemoryStorage::default());
        let err = store
            .upload(&SiteConfig::default(), "token")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigStoreError::BucketMissing {
                bucket: CONFIG_BUCKET
            }
        ));
    }

    #[tokio::test]
    async fn exists_is_false_until_initialized() {
        let (_, store) = store_with(MemoryStorage::with_bucket(CONFIG_BUCKET));
        assert!(!store.exists(None).await);
        store.initialize("token").await.unwrap();
        assert!(store.exists(None).await);
        assert_eq!(store.fetch().await, Some(SiteConfig::default()));
    }

    #[test]
    fn setup_sql_names_the_bucket() {
        let sql = storage_setup_sql();
        assert!(sql.contains("values ('auth-site', 'auth-site', true)"));
        assert!(sql.contains("to authenticated"));
    }
}
