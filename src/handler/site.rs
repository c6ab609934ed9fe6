use askama::Template;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    handler::layout,
    pages::{render, HomePage},
    site_config::{Provider, ProviderIcon, SiteConfig, Theme},
    state::AppState,
};

#[derive(Serialize, ToSchema)]
pub struct ProviderInfo {
    pub id: Provider,
    pub name: String,
    pub icon: ProviderIcon,
}

#[derive(Template)]
#[template(path = "theme.css", escape = "none")]
struct ThemeCss<'a> {
    brand_color: &'a str,
    accent_color: &'a str,
    gradient_from: &'a str,
    gradient_via: &'a str,
    gradient_to: &'a str,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/theme.css", get(theme_css))
        .route("/api/v1/site-config", get(site_config))
        .route("/api/v1/site-config/providers", get(providers))
        .with_state(state)
}

async fn home(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let auth = state.auth(jar).await;
    let Some(user) = auth.user() else {
        return (auth.into_jar(), Redirect::to("/signin")).into_response();
    };
    let config = state.site_config().current();
    let page = HomePage {
        layout: layout(&state, "Home"),
        email: user.email.unwrap_or_default(),
        avatar_url: user.avatar_url,
        slogan: config.site.slogan.clone(),
    };
    (auth.into_jar(), render(&page)).into_response()
}

/// Colors outside this character set fall back to the default.
fn css_value<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let value = value.trim();
    let safe = !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "#(),.% -".contains(ch));
    if safe {
        value
    } else {
        fallback
    }
}

async fn theme_css(State(state): State<Arc<AppState>>) -> Response {
    let config = state.site_config().current();
    let defaults = SiteConfig::default().theme;
    let Theme {
        brand_color,
        accent_color,
        gradient_from,
        gradient_via,
        gradient_to,
    } = &config.theme;
    let css = ThemeCss {
        brand_color: css_value(brand_color, &defaults.brand_color),
        accent_color: css_value(accent_color, &defaults.accent_color),
        gradient_from: css_value(gradient_from, &defaults.gradient_from),
        gradient_via: css_value(gradient_via, &defaults.gradient_via),
        gradient_to: css_value(gradient_to, &defaults.gradient_to),
    };
    match css.render() {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, "text/css; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to render theme");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/site-config",
    responses(
        (status = 200, description = "Current site configuration, merged over defaults", body = SiteConfig)
    ),
    tag = "site-config"
)]
pub async fn site_config(State(state): State<Arc<AppState>>) -> Json<SiteConfig> {
    Json(state.site_config().current().as_ref().clone())
}

#[utoipa::path(
    get,
    path = "/api/v1/site-config/providers",
    responses(
        (status = 200, description = "Enabled OAuth providers in display order", body = [ProviderInfo])
    ),
    tag = "site-config"
)]
pub async fn providers(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderInfo>> {
    let config = state.site_config().current();
    let providers = config
        .enabled_providers()
        .into_iter()
        .map(|provider| ProviderInfo {
            id: provider,
            name: config.provider_display_name(provider),
            icon: config.provider_icon(provider),
        })
        .collect();
    Json(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::*;

    #[test]
    fn css_values_are_restricted() {
        assert_eq!(css_value("#10b981", "#000"), "#10b981");
        assert_eq!(css_value("rgb(1, 2, 3)", "#000"), "rgb(1, 2, 3)");
        assert_eq!(css_value("red; } body { display:none", "#000"), "#000");
        assert_eq!(css_value("", "#000"), "#000");
    }

    #[tokio::test]
    async fn anonymous_home_redirects_to_signin() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let response = send(routes(state), get_request("/")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response).as_deref(), Some("/signin"));
    }

    #[tokio::test]
    async fn signed_in_home_shows_email() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let cookie = session_cookie(&state, "user@example.com");
        let response = send(routes(state), get_with_cookie("/", &cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("user@example.com"));
    }

    #[tokio::test]
    async fn theme_uses_configured_colors() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let mut config = SiteConfig::default();
        config.theme.brand_color = "#123456".to_string();
        config.theme.accent_color = "url(javascript:x)".to_string();
        state.site_config().upload(&config, "token").await.unwrap();

        let response = send(routes(state), get_request("/theme.css")).await;
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/css; charset=utf-8"
        );
        let css = body_text(response).await;
        assert!(css.contains("--brand: #123456;"));
        assert!(css.contains("--accent: #3b82f6;"));
        assert!(!css.contains("javascript"));
        assert!(css.contains("\"Segoe UI\""));
    }

    #[tokio::test]
    async fn providers_endpoint_reflects_config() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let mut config = SiteConfig::default();
        config.auth.enabled_providers = vec![Provider::Google];
        state.site_config().upload(&config, "token").await.unwrap();

        let response = send(routes(state), get_request("/api/v1/site-config/providers")).await;
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(
            body,
            serde_json::json!([{ "id": "google", "name": "Google", "icon": "chrome" }])
        );
    }
}
