use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    handler::{
        auth::{remember_form_redirect, signin_form, Feedback},
        captcha_token, layout, post_login_redirect,
    },
    pages::{render_with_status, VerifyOtpPage},
    service::pkce::{store_verifier, PkcePair},
    state::AppState,
};

#[derive(Deserialize)]
pub struct SendCodeForm {
    email: String,
    redirect: Option<String>,
    #[serde(rename = "cf-turnstile-response")]
    captcha: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyQuery {
    email: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyForm {
    email: String,
    token: String,
    #[serde(rename = "cf-turnstile-response")]
    captcha: Option<String>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signin/otp", post(send_code))
        .route("/verify-otp", get(verify_page).post(verify))
}

fn verify_form(
    state: &AppState,
    jar: CookieJar,
    status: StatusCode,
    email: &str,
    error: Option<String>,
) -> Response {
    let page = VerifyOtpPage {
        layout: layout(state, "Verify your email"),
        email: email.to_string(),
        error,
    };
    (jar, render_with_status(status, &page)).into_response()
}

async fn send_code(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<SendCodeForm>,
) -> Response {
    let jar = remember_form_redirect(&state, jar, form.redirect.as_deref());
    let email = form.email.trim();
    if email.is_empty() {
        let message = "Email is required".to_string();
        return signin_form(&state, jar, StatusCode::BAD_REQUEST, email, Feedback::Error(message));
    }
    let captcha = match captcha_token(&state, form.captcha.as_deref()) {
        Ok(token) => token,
        Err(message) => {
            return signin_form(&state, jar, StatusCode::BAD_REQUEST, email, Feedback::Error(message));
        }
    };

    // The email also carries a magic link, which comes back through /callback.
    let pkce = PkcePair::generate();
    let auth = state.auth(jar).await;
    match auth
        .sign_in_with_otp(email, captcha.as_deref(), Some(&pkce.challenge))
        .await
    {
        Ok(()) => {
            let jar = store_verifier(auth.into_jar(), &pkce.verifier, state.cookies().secure());
            let target = format!("/verify-otp?email={}", urlencoding::encode(email));
            (jar, Redirect::to(&target)).into_response()
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

async fn verify_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
    jar: CookieJar,
) -> Response {
    let Some(email) = query
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
    else {
        return (jar, Redirect::to("/signin")).into_response();
    };

    let auth = state.auth(jar).await;
    if auth.session().is_some() {
        return post_login_redirect(&state, auth.into_jar());
    }
    verify_form(&state, auth.into_jar(), StatusCode::OK, email, None)
}

async fn verify(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<VerifyForm>,
) -> Response {
    let email = form.email.trim();
    if email.is_empty() {
        return (jar, Redirect::to("/signin")).into_response();
    }
    let code = form.token.trim();
    if code.is_empty() {
        let message = Some("Enter the code from your email".to_string());
        return verify_form(&state, jar, StatusCode::BAD_REQUEST, email, message);
    }
    let captcha = match captcha_token(&state, form.captcha.as_deref()) {
        Ok(token) => token,
        Err(message) => {
            return verify_form(&state, jar, StatusCode::BAD_REQUEST, email, Some(message));
        }
    };

    let mut auth = state.auth(jar).await;
    match auth.verify_otp(email, code, captcha.as_deref()).await {
        Ok(()) => post_login_redirect(&state, auth.into_jar()),
        Err(err) => verify_form(
            &state,
            auth.into_jar(),
            StatusCode::BAD_REQUEST,
            email,
            Some(err.message),
        ),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        handler::{auth::routes, test_support::*},
        service::auth::test_support::token_body,
        state::AppState,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[tokio::test]
    async fn sending_a_code_moves_to_verification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/otp"))
            .and(body_partial_json(json!({ "email": "user@example.com" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        let (state, _) = AppState::for_tests(&server.uri());

        let response = send(
            routes(state),
            post_form("/signin/otp", "email=user%40example.com&redirect=%2Fdocs", None),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response).as_deref(),
            Some("/verify-otp?email=user%40example.com")
        );
        let set = cookies(&response);
        assert!(set.iter().any(|cookie| cookie == "auth_redirect_url=%2Fdocs"));
        assert!(set.iter().any(|cookie| cookie.starts_with("auth_code_verifier=")));
    }

    #[tokio::test]
    async fn verify_page_without_email_goes_back_to_signin() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let response = send(routes(state), get_request("/verify-otp")).await;
        assert_eq!(location(&response).as_deref(), Some("/signin"));
    }

    #[tokio::test]
    async fn verify_page_shows_email() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let response = send(routes(state), get_request("/verify-otp?email=user%40example.com")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("user@example.com"));
    }

    #[tokio::test]
    async fn correct_code_signs_in_and_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/verify"))
            .and(body_partial_json(json!({ "token": "123456", "type": "email" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("at", chrono::Utc::now().timestamp() + 3600)),
            )
            .mount(&server)
            .await;
        let (state, _) = AppState::for_tests(&server.uri());

        let response = send(
            routes(state),
            post_form(
                "/verify-otp",
                "email=user%40example.com&token=123456",
                Some("auth_redirect_url=%2Fdocs"),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response).as_deref(), Some("/docs"));
    }

    #[tokio::test]
    async fn wrong_code_is_shown_inline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/verify"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "code": 403,
                "error_code": "otp_expired",
                "msg": "Token has expired or is invalid"
            })))
            .mount(&server)
            .await;
        let (state, _) = AppState::for_tests(&server.uri());

        let response = send(
            routes(state),
            post_form("/verify-otp", "email=user%40example.com&token=000000", None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response)
            .await
            .contains("Token has expired or is invalid"));
    }
}
