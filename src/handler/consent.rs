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
    handler::{layout, require_session, AppError},
    pages::{render, render_with_status, ConsentPage, MessagePage},
    service::consent::ConsentAction,
    state::AppState,
};

#[derive(Deserialize)]
pub struct ConsentQuery {
    authorization_id: Option<String>,
}

#[derive(Deserialize)]
pub struct ConsentForm {
    authorization_id: String,
    action: String,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/oauth/consent", get(consent_page).post(decide))
        .route("/oauth/signout", post(signout))
        .route("/oauth/session-ended", get(session_ended))
        .with_state(state)
}

fn consent_url(authorization_id: &str) -> String {
    format!(
        "/oauth/consent?authorization_id={}",
        urlencoding::encode(authorization_id)
    )
}

fn returning(state: &AppState, jar: CookieJar, heading: &str, redirect_url: &str) -> Response {
    let page = MessagePage::new(
        layout(state, heading),
        heading,
        "Redirecting you back to the application...",
    )
    .action(redirect_url, "Continue")
    .refresh_to(redirect_url);
    (jar, render(&page)).into_response()
}

fn missing_id(state: &AppState, jar: CookieJar) -> Response {
    let page = MessagePage::new(
        layout(state, "Invalid request"),
        "Invalid request",
        "Missing authorization_id parameter.",
    )
    .error()
    .secondary("/", "Go home");
    (jar, render_with_status(StatusCode::BAD_REQUEST, &page)).into_response()
}

async fn consent_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConsentQuery>,
    jar: CookieJar,
) -> Response {
    let Some(authorization_id) = query
        .authorization_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
    else {
        return missing_id(&state, jar);
    };

    let auth = match require_session(&state, jar, &consent_url(&authorization_id)).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    let Some(session) = auth.session() else {
        return missing_id(&state, auth.into_jar());
    };

    let details = match state
        .consent()
        .get_authorization_details(&authorization_id, &session.access_token)
        .await
    {
        Ok(details) => details,
        Err(err) => {
            let response = AppError::from(err).respond(&state);
            return (auth.into_jar(), response).into_response();
        }
    };

    if let Some(redirect_url) = details.redirect_url.as_deref() {
        tracing::debug!(authorization_id = %authorization_id, "authorization already granted");
        return returning(&state, auth.into_jar(), "Already authorized", redirect_url);
    }

    let email = session.user.email.clone().unwrap_or_default();
    let page = ConsentPage::new(
        layout(&state, "Authorize access"),
        &authorization_id,
        &details,
        &email,
    );
    (auth.into_jar(), render(&page)).into_response()
}

async fn decide(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<ConsentForm>,
) -> Response {
    let authorization_id = form.authorization_id.trim().to_string();
    if authorization_id.is_empty() {
        return missing_id(&state, jar);
    }
    let Some(action) = ConsentAction::parse(form.action.trim()) else {
        let response = AppError::BadRequest(format!("Unknown action: {}", form.action))
            .respond(&state);
        return (jar, response).into_response();
    };

    let auth = match require_session(&state, jar, &consent_url(&authorization_id)).await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    let Some(session) = auth.session() else {
        return missing_id(&state, auth.into_jar());
    };

    let result = match action {
        ConsentAction::Approve => {
            state
                .consent()
                .approve(&authorization_id, &session.access_token)
                .await
        }
        ConsentAction::Deny => {
            state
                .consent()
                .deny(&authorization_id, &session.access_token)
                .await
        }
    };
    match result {
        Ok(redirect) => {
            let heading = match action {
                ConsentAction::Approve => "Authorization granted",
                ConsentAction::Deny => "Authorization denied",
            };
            returning(&state, auth.into_jar(), heading, &redirect.redirect_url)
        }
        Err(err) => {
            let response = AppError::from(err).respond(&state);
            (auth.into_jar(), response).into_response()
        }
    }
}

async fn signout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let mut auth = state.auth(jar).await;
    if let Err(err) = auth.sign_out().await {
        tracing::warn!(error = %err, "backend sign-out failed; local session cleared");
    }
    (auth.into_jar(), Redirect::to("/oauth/session-ended")).into_response()
}

async fn session_ended(State(state): State<Arc<AppState>>) -> Response {
    let page = MessagePage::new(
        layout(&state, "Signed out"),
        "You have been signed out",
        "Return to the application and start the sign-in again to continue.",
    )
    .secondary("/signin", "Sign in");
    render(&page)
}
