use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    handler::{
        auth::{remember_form_redirect, signin_form, Feedback},
        layout,
    },
    pages::{render_with_status, MessagePage},
    service::pkce::{store_verifier, PkcePair},
    site_config::Provider,
    state::AppState,
};

#[derive(Deserialize)]
pub struct OAuthStartQuery {
    redirect: Option<String>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/signin/oauth/:provider", get(start))
}

async fn start(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthStartQuery>,
    jar: CookieJar,
) -> Response {
    let Ok(provider) = provider.parse::<Provider>() else {
        let page = MessagePage::new(
            layout(&state, "Unknown provider"),
            "Unknown provider",
            format!("\"{}\" is not a supported sign-in provider.", provider),
        )
        .error()
        .action("/signin", "Back to sign in");
        return (jar, render_with_status(StatusCode::NOT_FOUND, &page)).into_response();
    };

    let jar = remember_form_redirect(&state, jar, query.redirect.as_deref());
    let pkce = PkcePair::generate();
    let auth = state.auth(jar).await;
    let redirect = state.redirects().stored(auth.jar());

    match auth.sign_in_with_oauth(provider, redirect.as_deref(), &pkce.challenge) {
        Ok(url) => {
            tracing::info!(provider = %provider, "starting oauth sign-in");
            let jar = store_verifier(auth.into_jar(), &pkce.verifier, state.cookies().secure());
            (jar, Redirect::to(&url)).into_response()
        }
        Err(err) => signin_form(
            &state,
            auth.into_jar(),
            StatusCode::BAD_REQUEST,
            "",
            Feedback::Error(err.message),
        ),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        handler::{auth::routes, test_support::*},
        site_config::{Provider, SiteConfig},
        state::AppState,
    };
    use axum::http::StatusCode;
    use url::Url;

    #[tokio::test]
    async fn redirects_to_backend_authorize_url() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let mut config = SiteConfig::default();
        config.auth.enabled_providers = vec![Provider::Github];
        state.site_config().upload(&config, "token").await.unwrap();

        let response = send(
            routes(state),
            get_request("/signin/oauth/github?redirect=%2Fprojects"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = Url::parse(&location(&response).unwrap()).unwrap();
        assert_eq!(location.path(), "/auth/v1/authorize");
        let pairs: Vec<(String, String)> = location.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("provider".to_string(), "github".to_string())));
        assert!(pairs.contains(&(
            "redirect_to".to_string(),
            "https://auth.example.com/callback?redirect=%2Fprojects".to_string()
        )));
        assert!(pairs.contains(&("code_challenge_method".to_string(), "s256".to_string())));

        let set = cookies(&response);
        assert!(set.iter().any(|cookie| cookie.starts_with("auth_code_verifier=")));
        assert!(set.iter().any(|cookie| cookie == "auth_redirect_url=%2Fprojects"));
    }

    #[tokio::test]
    async fn disabled_provider_is_rejected() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let mut config = SiteConfig::default();
        config.auth.enabled_providers = vec![Provider::Google];
        state.site_config().upload(&config, "token").await.unwrap();

        let response = send(routes(state), get_request("/signin/oauth/github")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("provider is not enabled"));
    }

    #[tokio::test]
    async fn unknown_provider_is_not_found() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let response = send(routes(state), get_request("/signin/oauth/myspace")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
