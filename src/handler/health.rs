use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct Health {
    pub status: &'static str,
    pub site_name: String,
    pub enabled_providers: usize,
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service health", body = Health)
    ),
    tag = "health"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    let config = state.site_config().current();
    Json(Health {
        status: "ok",
        site_name: config.site.name.clone(),
        enabled_providers: config.enabled_providers().len(),
    })
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::*;

    #[tokio::test]
    async fn reports_served_config() {
        let (state, _) = AppState::for_tests("http://backend.test");
        let response = send(routes(state), get_request("/api/v1/health")).await;
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "status": "ok", "site_name": "My Auth App", "enabled_providers": 2 })
        );
    }
}
