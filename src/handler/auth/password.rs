use axum::{extract::State, http::StatusCode, response::Response, routing::post, Form, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    handler::{
        auth::{remember_form_redirect, signin_form, Feedback},
        captcha_token, post_login_redirect,
    },
    service::{
        auth::SignUpOutcome,
        pkce::{store_verifier, PkcePair},
    },
    state::AppState,
};

#[derive(Deserialize)]
pub struct PasswordForm {
    email: String,
    password: String,
    redirect: Option<String>,
    #[serde(rename = "cf-turnstile-response")]
    captcha: Option<String>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signin/password", post(password_signin))
        .route("/signup", post(signup))
}

async fn password_signin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<PasswordForm>,
) -> Response {
    let jar = remember_form_redirect(&state, jar, form.redirect.as_deref());
    let email = form.email.trim();

    if !state.site_config().current().auth.allow_password {
        let message = "Password sign-in is disabled".to_string();
        return signin_form(&state, jar, StatusCode::FORBIDDEN, email, Feedback::Error(message));
    }
    let captcha = match captcha_token(&state, form.captcha.as_deref()) {
        Ok(token) => token,
        Err(message) => {
            return signin_form(&state, jar, StatusCode::BAD_REQUEST, email, Feedback::Error(message));
        }
    };

    let mut auth = state.auth(jar).await;
    match auth.sign_in(email, &form.password, captcha.as_deref()).await {
        Ok(()) => post_login_redirect(&state, auth.into_jar()),
        Err(err) => {
            tracing::info!(code = ?err.code, "password sign-in rejected");
            signin_form(
                &state,
                auth.into_jar(),
                StatusCode::BAD_REQUEST,
                email,
                Feedback::Error(err.message),
            )
        }
    }
}

async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<PasswordForm>,
) -> Response {
    let jar = remember_form_redirect(&state, jar, form.redirect.as_deref());
    let email = form.email.trim();

    let config = state.site_config().current();
    if !config.auth.allow_signup || !config.auth.allow_password {
        let message = "Sign up is disabled".to_string();
        return signin_form(&state, jar, StatusCode::FORBIDDEN, email, Feedback::Error(message));
    }
    let captcha = match captcha_token(&state, form.captcha.as_deref()) {
        Ok(token) => token,
        Err(message) => {
            return signin_form(&state, jar, StatusCode::BAD_REQUEST, email, Feedback::Error(message));
        }
    };

    let pkce = PkcePair::generate();
    let mut auth = state.auth(jar).await;
    let outcome = auth
        .sign_up(email, &form.password, captcha.as_deref(), Some(&pkce.challenge))
        .await;
    match outcome {
        Ok(SignUpOutcome::SignedIn) => post_login_redirect(&state, auth.into_jar()),
        Ok(SignUpOutcome::ConfirmationSent) => {
            let jar = store_verifier(auth.into_jar(), &pkce.verifier, state.cookies().secure());
            let message = format!(
                "Check {} for a confirmation link to finish signing up.",
                email
            );
            signin_form(&state, jar, StatusCode::OK, email, Feedback::Notice(message))
        }
        Err(err) => signin_form(
            &state,
            auth.into_jar(),
            StatusCode::BAD_REQUEST,
            email,
            Feedback::Error(err.message),
        ),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        handler::{auth::routes, test_support::*, CAPTCHA_MISSING},
        service::auth::test_support::token_body,
        site_config::SiteConfig,
        state::AppState,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    async fn backend_accepting_password() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("at", chrono::Utc::now().timestamp() + 3600)),
            )
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn success_consumes_stored_redirect() {
        let server = backend_accepting_password().await;
        let (state, _) = AppState::for_tests(&server.uri());
        let key = state.config().session_storage_key();

        let response = send(
            routes(state),
            post_form(
                "/signin/password",
                "email=user%40example.com&password=secret",
                Some("auth_redirect_url=%2Fdashboard"),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response).as_deref(), Some("/dashboard"));
        let set = cookies(&response);
        assert!(set.iter().any(|cookie| cookie.starts_with(&format!("{}=", key))
            && cookie.len() > key.len() + 1));
        assert!(set.iter().any(|cookie| cookie == "auth_redirect_url="));
    }

    #[tokio::test]
    async fn success_without_target_uses_after_sign_in() {
        let server = backend_accepting_password().await;
        let (state, _) = AppState::for_tests(&server.uri());
        let mut config = SiteConfig::default();
        config.redirects.after_sign_in = "/welcome".to_string();
        state.site_config().upload(&config, "token").await.unwrap();

        let response = send(
            routes(state),
            post_form("/signin/password", "email=user%40example.com&password=secret", None),
        )
        .await;
        assert_eq!(location(&response).as_deref(), Some("/welcome"));
    }

    #[tokio::test]
    async fn backend_error_is_shown_inline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": 400,
                "error_code": "invalid_credentials",
                "msg": "Invalid login credentials"
            })))
            .mount(&server)
            .await;
        let (state, _) = AppState::for_tests(&server.uri());

        let response = send(
            routes(state),
            post_form("/signin/password", "email=user%40example.com&password=bad", None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = body_text(response).await;
        assert!(html.contains("Invalid login credentials"));
        assert!(html.contains("value=\"user@example.com\""));
    }

    #[tokio::test]
    async fn missing_captcha_is_rejected_before_backend_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let (state, _) = AppState::for_tests(&server.uri());
        let mut config = SiteConfig::default();
        config.auth.turnstile.enabled = true;
        config.auth.turnstile.site_key = Some("site-key".to_string());
        state.site_config().upload(&config, "token").await.unwrap();

        let response = send(
            routes(state),
            post_form("/signin/password", "email=user%40example.com&password=secret", None),
        )
        .await;
        assert!(body_text(response).await.contains(CAPTCHA_MISSING));
    }

    #[tokio::test]
    async fn signup_needing_confirmation_shows_notice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-2",
                "email": "new@example.com"
            })))
            .mount(&server)
            .await;
        let (state, _) = AppState::for_tests(&server.uri());

        let response = send(
            routes(state),
            post_form("/signup", "email=new%40example.com&password=secret123", None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(cookies(&response)
            .iter()
            .any(|cookie| cookie.starts_with("auth_code_verifier=")));
        assert!(body_text(response).await.contains("confirmation link"));
    }

    #[tokio::test]
    async fn signup_respects_allow_signup() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let mut config = SiteConfig::default();
        config.auth.allow_signup = false;
        state.site_config().upload(&config, "token").await.unwrap();

        let response = send(
            routes(state),
            post_form("/signup", "email=new%40example.com&password=secret123", None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
