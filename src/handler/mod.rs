use axum::{
    http::{header::LOCATION, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::{
    error::ConfigStoreError,
    pages::{render_with_status, Layout, MessagePage},
    service::auth::{AuthContext, AuthError},
    state::AppState,
};

pub mod auth;
pub mod callback;
pub mod console;
pub mod consent;
pub mod health;
pub mod site;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::routes(state.clone()))
        .merge(site::routes(state.clone()))
        .merge(auth::routes(state.clone()))
        .merge(callback::routes(state.clone()))
        .merge(consent::routes(state.clone()))
        .merge(console::routes(state))
}

pub const CAPTCHA_MISSING: &str = "Please complete the verification";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    ConfigStore(#[from] ConfigStoreError),
    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(err) => err
                .status
                .and_then(|status| StatusCode::from_u16(status).ok())
                .filter(|status| status.is_client_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            AppError::ConfigStore(_) => StatusCode::BAD_GATEWAY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn respond(self, state: &AppState) -> Response {
        tracing::warn!(error = %self, "request failed");
        let page = MessagePage::new(layout(state, "Error"), "Something went wrong", self.to_string())
            .error()
            .action("/signin", "Back to sign in")
            .secondary("/", "Go home");
        render_with_status(self.status(), &page)
    }
}

pub fn layout(state: &AppState, title: &str) -> Layout {
    let config = state.site_config().current();
    Layout::new(&config, title).with_turnstile(
        config.turnstile_site_key(state.config().turnstile_site_key.as_deref()),
    )
}

pub fn captcha_token(state: &AppState, submitted: Option<&str>) -> Result<Option<String>, String> {
    let token = submitted
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);
    let required = state
        .site_config()
        .current()
        .turnstile_site_key(state.config().turnstile_site_key.as_deref())
        .is_some();
    if required && token.is_none() {
        return Err(CAPTCHA_MISSING.to_string());
    }
    Ok(token)
}

pub fn signin_url(redirect_to: &str) -> String {
    format!("/signin?redirect={}", urlencoding::encode(redirect_to))
}

pub async fn require_session(
    state: &Arc<AppState>,
    jar: CookieJar,
    return_to: &str,
) -> Result<AuthContext, Response> {
    let auth = state.auth(jar).await;
    if auth.session().is_some() {
        return Ok(auth);
    }
    let jar = auth.into_jar();
    Err((jar, Redirect::to(&signin_url(return_to))).into_response())
}

pub fn see_other(target: &str) -> Response {
    match HeaderValue::from_str(target) {
        Ok(location) => (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response(),
        Err(_) => {
            tracing::warn!(location = target, "unusable redirect target");
            Redirect::to("/").into_response()
        }
    }
}

pub fn post_login_redirect(state: &AppState, jar: CookieJar) -> Response {
    let default = state.site_config().current().redirects.after_sign_in.clone();
    let (jar, target) = state.redirects().take_post_login_target(jar, &default);
    tracing::debug!(location = %target, "post-login redirect");
    (jar, see_other(&target)).into_response()
}
