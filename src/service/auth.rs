use async_trait::async_trait;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

use crate::{
    service::{cookies::CookieSessionAdapter, site_config::ConfigStore},
    site_config::Provider,
};

/// Sessions this close to expiry are refreshed on load.
const EXPIRY_MARGIN_SECONDS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AuthError {
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
}

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
        }
    }

    fn transport(err: reqwest::Error) -> Self {
        Self {
            message: err.to_string(),
            code: None,
            status: err.status().map(|status| status.as_u16()),
        }
    }

    fn from_body(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<BackendErrorBody>(body).unwrap_or_default();
        let message = parsed
            .msg
            .or(parsed.message)
            .or(parsed.error_description)
            .or_else(|| parsed.error.clone())
            .unwrap_or_else(|| body.trim().to_string());
        Self {
            message,
            code: parsed.error_code.or(parsed.error),
            status: Some(status),
        }
    }
}

#[derive(Default, Deserialize)]
struct BackendErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    error_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct BackendUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<Value>,
}

impl From<BackendUser> for User {
    fn from(user: BackendUser) -> Self {
        let avatar_url = user
            .user_metadata
            .as_ref()
            .and_then(|metadata| metadata.get("avatar_url"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            id: user.id,
            email: user.email,
            avatar_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: i64,
    pub token_type: String,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at - EXPIRY_MARGIN_SECONDS <= now
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    token_type: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: BackendUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| Utc::now().timestamp() + self.expires_in.unwrap_or(3600));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            user: self.user.into(),
        }
    }
}

pub struct EmailLink<'a> {
    pub redirect_to: &'a str,
    pub code_challenge: Option<&'a str>,
}

pub struct OAuthRequest<'a> {
    pub provider: Provider,
    pub redirect_to: &'a str,
    pub scopes: Option<&'a str>,
    pub code_challenge: &'a str,
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
        captcha: Option<&str>,
    ) -> Result<Session, AuthError>;
    /// `None` when the backend requires email confirmation first.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        captcha: Option<&str>,
        link: &EmailLink<'_>,
    ) -> Result<Option<Session>, AuthError>;
    async fn send_otp(
        &self,
        email: &str,
        captcha: Option<&str>,
        link: &EmailLink<'_>,
    ) -> Result<(), AuthError>;
    async fn verify_otp(
        &self,
        email: &str,
        token: &str,
        captcha: Option<&str>,
    ) -> Result<Session, AuthError>;
    fn authorize_url(&self, request: &OAuthRequest<'_>) -> Result<String, AuthError>;
    async fn exchange_code(&self, auth_code: &str, code_verifier: &str)
        -> Result<Session, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
    async fn get_user(&self, access_token: &str) -> Result<User, AuthError>;
}

pub struct HostedAuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl HostedAuthClient {
    pub fn new(http: reqwest::Client, base_url: &str, anon_key: &str) -> Self {
        Self {
            http,
            base_url: format!("{}/auth/v1", base_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        }
    }

    pub(crate) fn request(
        &self,
        method: Method,
        path: &str,
        access_token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let bearer = access_token.unwrap_or(&self.anon_key);
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    pub(crate) async fn send(
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AuthError> {
        let response = request.send().await.map_err(AuthError::transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AuthError::from_body(status.as_u16(), &body))
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        request: reqwest::RequestBuilder,
    ) -> Result<T, AuthError> {
        Self::send(request)
            .await?
            .json::<T>()
            .await
            .map_err(AuthError::transport)
    }

    fn with_captcha(mut body: Map<String, Value>, captcha: Option<&str>) -> Value {
        if let Some(token) = captcha {
            body.insert(
                "gotrue_meta_security".to_string(),
                json!({ "captcha_token": token }),
            );
        }
        Value::Object(body)
    }

    fn add_challenge(body: &mut Map<String, Value>, link: &EmailLink<'_>) {
        if let Some(challenge) = link.code_challenge {
            body.insert("code_challenge".to_string(), json!(challenge));
            body.insert("code_challenge_method".to_string(), json!("s256"));
        }
    }

    fn credentials(email: &str, password: &str) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("email".to_string(), json!(email));
        body.insert("password".to_string(), json!(password));
        body
    }
}

#[async_trait]
impl AuthBackend for HostedAuthClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
        captcha: Option<&str>,
    ) -> Result<Session, AuthError> {
        let request = self
            .request(Method::POST, "/token?grant_type=password", None)
            .json(&Self::with_captcha(Self::credentials(email, password), captcha));
        let token = Self::send_json::<TokenResponse>(request).await?;
        Ok(token.into_session())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        captcha: Option<&str>,
        link: &EmailLink<'_>,
    ) -> Result<Option<Session>, AuthError> {
        let mut body = Self::credentials(email, password);
        Self::add_challenge(&mut body, link);
        let request = self
            .request(Method::POST, "/signup", None)
            .query(&[("redirect_to", link.redirect_to)])
            .json(&Self::with_captcha(body, captcha));
        let body = Self::send_json::<Value>(request).await?;
        if body.get("access_token").is_none() {
            return Ok(None);
        }
        let token = serde_json::from_value::<TokenResponse>(body)
            .map_err(|err| AuthError::new(err.to_string()))?;
        Ok(Some(token.into_session()))
    }

    async fn send_otp(
        &self,
        email: &str,
        captcha: Option<&str>,
        link: &EmailLink<'_>,
    ) -> Result<(), AuthError> {
        let mut body = Map::new();
        body.insert("email".to_string(), json!(email));
        body.insert("create_user".to_string(), json!(true));
        Self::add_challenge(&mut body, link);
        let request = self
            .request(Method::POST, "/otp", None)
            .query(&[("redirect_to", link.redirect_to)])
            .json(&Self::with_captcha(body, captcha));
        Self::send(request).await?;
        Ok(())
    }

    async fn verify_otp(
        &self,
        email: &str,
        token: &str,
        captcha: Option<&str>,
    ) -> Result<Session, AuthError> {
        let mut body = Map::new();
        body.insert("email".to_string(), json!(email));
        body.insert("token".to_string(), json!(token));
        body.insert("type".to_string(), json!("email"));
        let request = self
            .request(Method::POST, "/verify", None)
            .json(&Self::with_captcha(body, captcha));
        let token = Self::send_json::<TokenResponse>(request).await?;
        Ok(token.into_session())
    }

    fn authorize_url(&self, request: &OAuthRequest<'_>) -> Result<String, AuthError> {
        let mut url = Url::parse(&format!("{}/authorize", self.base_url))
            .map_err(|err| AuthError::new(format!("invalid auth backend url: {}", err)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("provider", request.provider.as_str());
            query.append_pair("redirect_to", request.redirect_to);
            if let Some(scopes) = request.scopes {
                query.append_pair("scopes", scopes);
            }
            query.append_pair("code_challenge", request.code_challenge);
            query.append_pair("code_challenge_method", "s256");
        }
        Ok(url.to_string())
    }

    async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, AuthError> {
        let request = self
            .request(Method::POST, "/token?grant_type=pkce", None)
            .json(&json!({ "auth_code": auth_code, "code_verifier": code_verifier }));
        let token = Self::send_json::<TokenResponse>(request).await?;
        Ok(token.into_session())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let request = self
            .request(Method::POST, "/token?grant_type=refresh_token", None)
            .json(&json!({ "refresh_token": refresh_token }));
        let token = Self::send_json::<TokenResponse>(request).await?;
        Ok(token.into_session())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let request = self.request(Method::POST, "/logout?scope=global", Some(access_token));
        match Self::send(request).await {
            Ok(_) => Ok(()),
            // Session already gone on the backend.
            Err(err) if matches!(err.status, Some(401 | 403 | 404)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn get_user(&self, access_token: &str) -> Result<User, AuthError> {
        let request = self.request(Method::GET, "/user", Some(access_token));
        let user = Self::send_json::<BackendUser>(request).await?;
        Ok(user.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub session: Option<Session>,
    pub last_event: Option<AuthChangeEvent>,
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|session| &session.user)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn,
    ConfirmationSent,
}

#[derive(Clone)]
pub struct AuthDeps {
    pub backend: Arc<dyn AuthBackend>,
    pub cookies: Arc<CookieSessionAdapter>,
    pub store: Arc<ConfigStore>,
    pub storage_key: String,
    pub site_url: Url,
}

pub struct AuthContext {
    deps: AuthDeps,
    jar: CookieJar,
    state: watch::Sender<AuthState>,
}

impl AuthContext {
    pub async fn load(deps: AuthDeps, jar: CookieJar) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        let mut context = Self { deps, jar, state };
        context.restore().await;
        context
    }

    async fn restore(&mut self) {
        let Some(raw) = self.deps.cookies.get(&self.jar, &self.deps.storage_key) else {
            return;
        };
        let session = match serde_json::from_str::<Session>(&raw) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable session cookie");
                self.jar = self
                    .deps
                    .cookies
                    .remove(self.jar.clone(), &self.deps.storage_key);
                return;
            }
        };

        if !session.is_expired(Utc::now().timestamp()) {
            self.state.send_replace(AuthState {
                session: Some(session),
                last_event: None,
            });
            return;
        }

        match self.deps.backend.refresh(&session.refresh_token).await {
            Ok(refreshed) => {
                tracing::debug!(user_id = %refreshed.user.id, "session refreshed");
                self.persist(refreshed, AuthChangeEvent::TokenRefreshed);
            }
            Err(err) => {
                tracing::info!(error = %err, "session refresh failed, signing out");
                self.clear();
            }
        }
    }

    fn persist(&mut self, session: Session, event: AuthChangeEvent) {
        match serde_json::to_string(&session) {
            Ok(value) => {
                self.jar = self
                    .deps
                    .cookies
                    .set(self.jar.clone(), &self.deps.storage_key, &value);
            }
            Err(err) => tracing::error!(error = %err, "failed to encode session"),
        }
        self.state.send_replace(AuthState {
            session: Some(session),
            last_event: Some(event),
        });
    }

    fn clear(&mut self) {
        self.jar = self
            .deps
            .cookies
            .remove(self.jar.clone(), &self.deps.storage_key);
        self.state.send_replace(AuthState {
            session: None,
            last_event: Some(AuthChangeEvent::SignedOut),
        });
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub async fn verified_user(&self) -> Result<Option<User>, AuthError> {
        match self.session() {
            Some(session) => self
                .deps
                .backend
                .get_user(&session.access_token)
                .await
                .map(Some),
            None => Ok(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }

    pub fn into_jar(self) -> CookieJar {
        self.jar
    }

    fn callback_url(&self, redirect: Option<&str>) -> String {
        let mut url = self.deps.site_url.clone();
        url.set_path("/callback");
        url.set_query(None);
        url.set_fragment(None);
        if let Some(redirect) = redirect {
            url.query_pairs_mut().append_pair("redirect", redirect);
        }
        url.to_string()
    }

    pub fn get_enabled_providers(&self) -> Vec<Provider> {
        self.deps.store.current().enabled_providers()
    }

    pub async fn sign_in(
        &mut self,
        email: &str,
        password: &str,
        captcha: Option<&str>,
    ) -> Result<(), AuthError> {
        let session = self
            .deps
            .backend
            .sign_in_with_password(email, password, captcha)
            .await?;
        tracing::info!(user_id = %session.user.id, "signed in with password");
        self.persist(session, AuthChangeEvent::SignedIn);
        Ok(())
    }

    pub async fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        captcha: Option<&str>,
        code_challenge: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError> {
        let redirect_to = self.callback_url(None);
        let link = EmailLink {
            redirect_to: &redirect_to,
            code_challenge,
        };
        match self
            .deps
            .backend
            .sign_up(email, password, captcha, &link)
            .await?
        {
            Some(session) => {
                tracing::info!(user_id = %session.user.id, "signed up");
                self.persist(session, AuthChangeEvent::SignedIn);
                Ok(SignUpOutcome::SignedIn)
            }
            None => Ok(SignUpOutcome::ConfirmationSent),
        }
    }

    pub async fn sign_out(&mut self) -> Result<(), AuthError> {
        let result = match self.session() {
            Some(session) => self.deps.backend.sign_out(&session.access_token).await,
            None => Ok(()),
        };
        self.clear();
        result
    }

    pub fn sign_in_with_oauth(
        &self,
        provider: Provider,
        redirect_to: Option<&str>,
        code_challenge: &str,
    ) -> Result<String, AuthError> {
        if !self.get_enabled_providers().contains(&provider) {
            return Err(AuthError {
                message: "Unsupported provider: provider is not enabled".to_string(),
                code: Some("validation_failed".to_string()),
                status: Some(400),
            });
        }
        let callback = self.callback_url(redirect_to);
        let scopes = self.deps.store.current().provider_scopes(provider);
        self.deps.backend.authorize_url(&OAuthRequest {
            provider,
            redirect_to: &callback,
            scopes: scopes.as_deref(),
            code_challenge,
        })
    }

    pub async fn sign_in_with_otp(
        &self,
        email: &str,
        captcha: Option<&str>,
        code_challenge: Option<&str>,
    ) -> Result<(), AuthError> {
        let redirect_to = self.callback_url(None);
        let link = EmailLink {
            redirect_to: &redirect_to,
            code_challenge,
        };
        self.deps.backend.send_otp(email, captcha, &link).await?;
        tracing::info!("one-time code sent");
        Ok(())
    }

    pub async fn verify_otp(
        &mut self,
        email: &str,
        code: &str,
        captcha: Option<&str>,
    ) -> Result<(), AuthError> {
        let session = self.deps.backend.verify_otp(email, code, captcha).await?;
        tracing::info!(user_id = %session.user.id, "signed in with one-time code");
        self.persist(session, AuthChangeEvent::SignedIn);
        Ok(())
    }

    pub async fn exchange_code(&mut self, code: &str, verifier: &str) -> Result<(), AuthError> {
        let session = self.deps.backend.exchange_code(code, verifier).await?;
        tracing::info!(user_id = %session.user.id, "signed in with oauth");
        self.persist(session, AuthChangeEvent::SignedIn);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::{
        config::Config,
        service::{site_config::CONFIG_BUCKET, storage::memory::MemoryStorage},
    };

    pub fn token_body(access_token: &str, expires_at: i64) -> Value {
        json!({
            "access_token": access_token,
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": expires_at,
            "refresh_token": format!("{}-refresh", access_token),
            "user": {
                "id": "user-1",
                "email": "user@example.com",
                "user_metadata": { "avatar_url": "https://cdn.example.com/a.png" }
            }
        })
    }

    pub fn session(access_token: &str, expires_at: i64) -> Session {
        Session {
            access_token: access_token.to_string(),
            refresh_token: format!("{}-refresh", access_token),
            expires_at,
            token_type: "bearer".to_string(),
            user: User {
                id: "user-1".to_string(),
                email: Some("user@example.com".to_string()),
                avatar_url: Some("https://cdn.example.com/a.png".to_string()),
            },
        }
    }

    pub fn deps(backend_url: &str) -> (AuthDeps, Arc<MemoryStorage>) {
        let config = Config::for_tests(backend_url);
        let storage = Arc::new(MemoryStorage::with_bucket(CONFIG_BUCKET));
        let store = Arc::new(ConfigStore::new(storage.clone()));
        let cookies = Arc::new(CookieSessionAdapter::new(store.clone(), &config));
        let backend = Arc::new(HostedAuthClient::new(
            reqwest::Client::new(),
            backend_url,
            &config.auth_backend_anon_key,
        ));
        (
            AuthDeps {
                backend,
                cookies,
                store,
                storage_key: config.session_storage_key(),
                site_url: config.site_url.clone(),
            },
            storage,
        )
    }
}
