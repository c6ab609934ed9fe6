use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::{any::Any, sync::Arc, time::Duration};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod handler;
mod openapi;
mod pages;
mod service;
mod site_config;
mod state;

use crate::state::AppState;

const PANIC_PAGE: &str = "<!doctype html><html><head><title>Something went wrong</title></head>\
<body><h1>Something went wrong</h1><p>An unexpected error occurred. Please try again.</p>\
<p><a href=\"\">Reload page</a> <a href=\"/\">Go home</a></p></body></html>";

fn panic_page(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "request handler panicked");
    (StatusCode::INTERNAL_SERVER_ERROR, Html(PANIC_PAGE)).into_response()
}

fn spawn_config_refresh(state: Arc<AppState>) {
    let secs = state.config().config_refresh_secs;
    if secs == 0 {
        return;
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(secs));
        // The first tick fires immediately and the startup load already ran.
        interval.tick().await;
        loop {
            interval.tick().await;
            state.site_config().reload().await;
        }
    });
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("auth_site=info,tower_http=info")),
        )
        .init();

    let state = AppState::new();
    let loaded = state.site_config().reload().await;
    tracing::info!(
        site = %loaded.site.name,
        providers = loaded.enabled_providers().len(),
        "site config loaded"
    );
    spawn_config_refresh(state.clone());

    let port = state.port();
    let app = handler::router(state)
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_page));

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, addr = %bind_addr, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %bind_addr, "listening");

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "server error");
        std::process::exit(1);
    }
}
