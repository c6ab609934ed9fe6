use axum_extra::extract::cookie::CookieJar;
use std::{sync::Arc, time::Duration};

use crate::{
    config::Config,
    service::{
        auth::{AuthBackend, AuthContext, AuthDeps, HostedAuthClient},
        config::{ConfigService, ConfigServiceImpl},
        consent::ConsentBackend,
        cookies::CookieSessionAdapter,
        redirect::RedirectResolver,
        site_config::ConfigStore,
        storage::{ObjectStorage, StorageApiClient},
    },
};

const BACKEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AppState {
    config: Arc<dyn ConfigService>,
    site_config: Arc<ConfigStore>,
    cookies: Arc<CookieSessionAdapter>,
    redirects: Arc<RedirectResolver>,
    auth_backend: Arc<dyn AuthBackend>,
    consent: Arc<dyn ConsentBackend>,
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Self::with_config(Arc::new(ConfigServiceImpl::new()))
    }

    pub fn with_config(config: Arc<dyn ConfigService>) -> Arc<Self> {
        let values = config.values();
        let http = reqwest::Client::builder()
            .timeout(BACKEND_TIMEOUT)
            .user_agent(concat!("auth-site/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "falling back to default http client");
                reqwest::Client::new()
            });
        let storage = Arc::new(StorageApiClient::new(
            http.clone(),
            &values.auth_backend_url,
            &values.auth_backend_anon_key,
        ));
        let hosted = Arc::new(HostedAuthClient::new(
            http,
            &values.auth_backend_url,
            &values.auth_backend_anon_key,
        ));
        Self::from_parts(config, storage, hosted.clone(), hosted)
    }

    pub fn from_parts(
        config: Arc<dyn ConfigService>,
        storage: Arc<dyn ObjectStorage>,
        auth_backend: Arc<dyn AuthBackend>,
        consent: Arc<dyn ConsentBackend>,
    ) -> Arc<Self> {
        let values = config.values();
        let site_config = Arc::new(ConfigStore::new(storage));
        let cookies = Arc::new(CookieSessionAdapter::new(site_config.clone(), values));
        let redirects = Arc::new(RedirectResolver::new(&values.site_url, cookies.secure()));

        Arc::new(Self {
            config,
            site_config,
            cookies,
            redirects,
            auth_backend,
            consent,
        })
    }

    pub fn port(&self) -> u16 {
        self.config.port()
    }

    pub fn config(&self) -> &Config {
        self.config.values()
    }

    pub fn site_config(&self) -> &ConfigStore {
        self.site_config.as_ref()
    }

    pub fn cookies(&self) -> &CookieSessionAdapter {
        self.cookies.as_ref()
    }

    pub fn redirects(&self) -> &RedirectResolver {
        self.redirects.as_ref()
    }

    pub fn consent(&self) -> &dyn ConsentBackend {
        self.consent.as_ref()
    }

    pub fn auth_deps(&self) -> AuthDeps {
        let config = self.config();
        AuthDeps {
            backend: self.auth_backend.clone(),
            cookies: self.cookies.clone(),
            store: self.site_config.clone(),
            storage_key: config.session_storage_key(),
            site_url: config.site_url.clone(),
        }
    }

    pub async fn auth(&self, jar: CookieJar) -> AuthContext {
        AuthContext::load(self.auth_deps(), jar).await
    }
}

#[cfg(test)]
impl AppState {
    pub fn for_tests(
        backend_url: &str,
    ) -> (Arc<Self>, Arc<crate::service::storage::memory::MemoryStorage>) {
        use crate::service::{site_config::CONFIG_BUCKET, storage::memory::MemoryStorage};

        let config = Config::for_tests(backend_url);
        let hosted = Arc::new(HostedAuthClient::new(
            reqwest::Client::new(),
            backend_url,
            &config.auth_backend_anon_key,
        ));
        let storage = Arc::new(MemoryStorage::with_bucket(CONFIG_BUCKET));
        let state = Self::from_parts(
            Arc::new(ConfigServiceImpl::from_config(config)),
            storage.clone(),
            hosted.clone(),
            hosted,
        );
        (state, storage)
    }
}
