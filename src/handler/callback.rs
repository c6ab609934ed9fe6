use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    handler::{layout, post_login_redirect, signin_url},
    pages::{render_with_status, MessagePage},
    service::pkce::take_verifier,
    state::AppState,
};

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    redirect: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/callback", get(callback))
        .with_state(state)
}

fn failure(state: &AppState, jar: CookieJar, status: StatusCode, message: &str) -> Response {
    let retry = state
        .redirects()
        .stored(&jar)
        .map(|target| signin_url(&target))
        .unwrap_or_else(|| "/signin".to_string());
    let page = MessagePage::new(layout(state, "Sign-in failed"), "Authentication Error", message)
        .error()
        .action(retry, "Back to sign in");
    (jar, render_with_status(status, &page)).into_response()
}

async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    if let Some(error) = query.error.as_deref() {
        tracing::info!(error, "provider returned an error");
        let message = query
            .error_description
            .as_deref()
            .filter(|description| !description.trim().is_empty())
            .unwrap_or(error);
        let (jar, _) = take_verifier(jar);
        return failure(&state, jar, StatusCode::BAD_REQUEST, message);
    }

    let jar = match query
        .redirect
        .as_deref()
        .map(str::trim)
        .filter(|target| state.redirects().is_valid(target))
    {
        Some(target) => state.redirects().remember(jar, target),
        None => jar,
    };

    let Some(code) = query.code.as_deref().filter(|code| !code.is_empty()) else {
        let auth = state.auth(jar).await;
        if auth.session().is_some() {
            return post_login_redirect(&state, auth.into_jar());
        }
        return failure(
            &state,
            auth.into_jar(),
            StatusCode::BAD_REQUEST,
            "No session found. Please try signing in again.",
        );
    };

    let (jar, verifier) = take_verifier(jar);
    let Some(verifier) = verifier else {
        tracing::info!("callback without a pending code verifier");
        return failure(
            &state,
            jar,
            StatusCode::BAD_REQUEST,
            "This sign-in link has expired or was opened in a different browser. Please try signing in again.",
        );
    };

    let mut auth = state.auth(jar).await;
    match auth.exchange_code(code, &verifier).await {
        Ok(()) => post_login_redirect(&state, auth.into_jar()),
        Err(err) => {
            tracing::warn!(error = %err, "code exchange failed");
            failure(&state, auth.into_jar(), StatusCode::BAD_REQUEST, &err.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{handler::test_support::*, service::auth::test_support::token_body};
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    #[tokio::test]
    async fn code_is_exchanged_with_stored_verifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "pkce"))
            .and(body_json(json!({ "auth_code": "abc", "code_verifier": "verifier-1" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("at", chrono::Utc::now().timestamp() + 3600)),
            )
            .expect(1)
            .mount(&server)
            .await;
        let (state, _) = AppState::for_tests(&server.uri());
        let key = state.config().session_storage_key();

        let response = send(
            routes(state),
            get_with_cookie(
                "/callback?code=abc&redirect=%2Fprojects",
                "auth_code_verifier=verifier-1",
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response).as_deref(), Some("/projects"));
        let set = cookies(&response);
        assert!(set.iter().any(|cookie| cookie.starts_with(&format!("{}=%7B", key))));
        assert!(set.iter().any(|cookie| cookie == "auth_code_verifier="));
    }

    #[tokio::test]
    async fn provider_error_is_displayed() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let response = send(
            routes(state),
            get_request("/callback?error=access_denied&error_description=User+cancelled"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = body_text(response).await;
        assert!(html.contains("User cancelled"));
        assert!(html.contains("Back to sign in"));
    }

    #[tokio::test]
    async fn missing_code_without_session_fails() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let response = send(routes(state), get_request("/callback")).await;
        assert!(body_text(response)
            .await
            .contains("No session found. Please try signing in again."));
    }

    #[tokio::test]
    async fn missing_code_with_session_redirects() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let cookie = format!(
            "{}; auth_redirect_url=%2Fdocs",
            session_cookie(&state, "user@example.com")
        );
        let response = send(routes(state), get_with_cookie("/callback", &cookie)).await;
        assert_eq!(location(&response).as_deref(), Some("/docs"));
    }

    #[tokio::test]
    async fn missing_verifier_fails_without_backend_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let (state, _) = AppState::for_tests(&server.uri());
        let response = send(routes(state), get_request("/callback?code=abc")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn external_redirect_parameter_is_ignored() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let response = send(
            routes(state),
            get_request("/callback?redirect=https%3A%2F%2Fevil.com"),
        )
        .await;
        assert!(!cookies(&response)
            .iter()
            .any(|cookie| cookie.starts_with("auth_redirect_url=")));
    }
}
