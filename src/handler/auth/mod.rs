use axum::{
    extract::{Query, State},
    http::{header::REFERER, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    handler::{layout, post_login_redirect, see_other},
    pages::{render_with_status, ProviderButton, SignInPage},
    state::AppState,
};

pub mod oauth;
pub mod otp;
pub mod password;

#[derive(Deserialize)]
pub struct SignInQuery {
    redirect: Option<String>,
    error: Option<String>,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/signin", get(signin))
        .route("/signout", post(signout))
        .merge(password::routes())
        .merge(otp::routes())
        .merge(oauth::routes())
        .with_state(state)
}

pub(crate) enum Feedback {
    None,
    Error(String),
    Notice(String),
}

pub(crate) fn signin_form(
    state: &AppState,
    jar: CookieJar,
    status: StatusCode,
    email: &str,
    feedback: Feedback,
) -> Response {
    let config = state.site_config().current();
    let redirect = state.redirects().stored(&jar);
    let (error, notice) = match feedback {
        Feedback::None => (None, None),
        Feedback::Error(message) => (Some(message), None),
        Feedback::Notice(message) => (None, Some(message)),
    };
    let page = SignInPage {
        layout: layout(state, "Sign in"),
        providers: ProviderButton::for_config(&config),
        allow_password: config.auth.allow_password,
        allow_signup: config.auth.allow_signup,
        redirect,
        email: email.to_string(),
        error,
        notice,
    };
    (jar, render_with_status(status, &page)).into_response()
}

pub(crate) fn remember_form_redirect(
    state: &AppState,
    jar: CookieJar,
    redirect: Option<&str>,
) -> CookieJar {
    match redirect.map(str::trim).filter(|target| state.redirects().is_valid(target)) {
        Some(target) => state.redirects().remember(jar, target),
        None => jar,
    }
}

async fn signin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SignInQuery>,
    jar: CookieJar,
) -> Response {
    let referer = headers.get(REFERER).and_then(|value| value.to_str().ok());
    let (jar, _) = state
        .redirects()
        .resolve_and_store(jar, query.redirect.as_deref(), referer);

    let auth = state.auth(jar).await;
    if auth.session().is_some() {
        return post_login_redirect(&state, auth.into_jar());
    }

    let feedback = match query.error {
        Some(message) if !message.trim().is_empty() => Feedback::Error(message),
        _ => Feedback::None,
    };
    signin_form(&state, auth.into_jar(), StatusCode::OK, "", feedback)
}

async fn signout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let mut auth = state.auth(jar).await;
    if let Err(err) = auth.sign_out().await {
        tracing::warn!(error = %err, "backend sign-out failed; local session cleared");
    }
    let target = state.site_config().current().redirects.after_sign_out.clone();
    (auth.into_jar(), see_other(&target)).into_response()
}
