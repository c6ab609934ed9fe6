use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::{
    error::ConfigStoreError,
    handler::{layout, require_session, AppError},
    pages::{render, render_with_status, ConsoleInitPage, ConsolePage, MessagePage},
    service::{
        auth::AuthContext,
        site_config::{storage_setup_sql, CONFIG_BUCKET},
    },
    site_config::{CookieSameSite, Provider, SiteConfig},
    state::AppState,
};

const MAX_COOKIE_DAYS: u32 = 3650;

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/console", get(console))
        .route("/console/config", post(save_config))
        .route("/console/initialize", post(initialize))
        .with_state(state)
}

#[derive(Debug, Default)]
struct ConsoleForm {
    site_name: String,
    site_slogan: String,
    site_description: String,
    site_copyright: String,
    logo_url: String,
    logo_text: String,
    logo_icon: String,
    favicon: String,
    brand_color: String,
    accent_color: String,
    gradient_from: String,
    gradient_via: String,
    gradient_to: String,
    providers: Vec<Provider>,
    allow_signup: bool,
    allow_password: bool,
    turnstile_enabled: bool,
    turnstile_site_key: String,
    cookie_expires: String,
    cookie_same_site: String,
    cookie_domain: String,
    after_sign_in: String,
    after_sign_out: String,
}

fn optional(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl ConsoleForm {
    fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, String> {
        let mut form = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "site_name" => form.site_name = value,
                "site_slogan" => form.site_slogan = value,
                "site_description" => form.site_description = value,
                "site_copyright" => form.site_copyright = value,
                "logo_url" => form.logo_url = value,
                "logo_text" => form.logo_text = value,
                "logo_icon" => form.logo_icon = value,
                "favicon" => form.favicon = value,
                "brand_color" => form.brand_color = value,
                "accent_color" => form.accent_color = value,
                "gradient_from" => form.gradient_from = value,
                "gradient_via" => form.gradient_via = value,
                "gradient_to" => form.gradient_to = value,
                "provider" => {
                    let provider = value
                        .parse::<Provider>()
                        .map_err(|_| format!("Unknown provider: {}", value))?;
                    if !form.providers.contains(&provider) {
                        form.providers.push(provider);
                    }
                }
                "allow_signup" => form.allow_signup = true,
                "allow_password" => form.allow_password = true,
                "turnstile_enabled" => form.turnstile_enabled = true,
                "turnstile_site_key" => form.turnstile_site_key = value,
                "cookie_expires" => form.cookie_expires = value,
                "cookie_same_site" => form.cookie_same_site = value,
                "cookie_domain" => form.cookie_domain = value,
                "after_sign_in" => form.after_sign_in = value,
                "after_sign_out" => form.after_sign_out = value,
                _ => {}
            }
        }
        Ok(form)
    }

    fn apply(
        self,
        base: &SiteConfig,
        is_valid_redirect: impl Fn(&str) -> bool,
    ) -> Result<SiteConfig, String> {
        let site_name = self.site_name.trim();
        if site_name.is_empty() {
            return Err("Site name is required".to_string());
        }
        let expires = self
            .cookie_expires
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|days| (1..=MAX_COOKIE_DAYS).contains(days))
            .ok_or_else(|| {
                format!(
                    "Session expiration must be between 1 and {} days",
                    MAX_COOKIE_DAYS
                )
            })?;
        let same_site = CookieSameSite::parse(self.cookie_same_site.trim())
            .ok_or_else(|| "SameSite policy must be Lax, Strict or None".to_string())?;
        let after_sign_in = self.after_sign_in.trim().to_string();
        let after_sign_out = self.after_sign_out.trim().to_string();
        for (label, target) in [("After sign in", &after_sign_in), ("After sign out", &after_sign_out)] {
            if !is_valid_redirect(target.as_str()) {
                return Err(format!(
                    "{} must be a path on this site or a URL with the same origin",
                    label
                ));
            }
        }

        let mut config = base.clone();
        config.site.name = site_name.to_string();
        config.site.slogan = self.site_slogan.trim().to_string();
        config.site.description = self.site_description.trim().to_string();
        config.site.copyright = self.site_copyright.trim().to_string();
        config.branding.logo.url = optional(self.logo_url);
        config.branding.logo.text = optional(self.logo_text);
        config.branding.logo.icon = optional(self.logo_icon);
        config.branding.favicon = self.favicon.trim().to_string();
        config.theme.brand_color = self.brand_color.trim().to_string();
        config.theme.accent_color = self.accent_color.trim().to_string();
        config.theme.gradient_from = self.gradient_from.trim().to_string();
        config.theme.gradient_via = self.gradient_via.trim().to_string();
        config.theme.gradient_to = self.gradient_to.trim().to_string();

        // Existing order first, newly ticked providers after.
        let mut order: Vec<Provider> = base
            .enabled_providers()
            .into_iter()
            .filter(|provider| self.providers.contains(provider))
            .collect();
        for provider in &self.providers {
            if !order.contains(provider) {
                order.push(*provider);
            }
        }
        for provider in Provider::ALL {
            let checked = order.contains(&provider);
            if let Some(settings) = config.auth.providers.get_mut(&provider) {
                settings.enabled = checked;
            }
        }
        config.auth.enabled_providers = order;
        config.auth.allow_signup = self.allow_signup;
        config.auth.allow_password = self.allow_password;
        config.auth.turnstile.enabled = self.turnstile_enabled;
        config.auth.turnstile.site_key = optional(self.turnstile_site_key);
        config.auth.cookie_options.expires = expires;
        config.auth.cookie_options.same_site = same_site;
        config.auth.cookie_domain = optional(self.cookie_domain);
        config.redirects.after_sign_in = after_sign_in;
        config.redirects.after_sign_out = after_sign_out;
        Ok(config)
    }
}

struct Viewer {
    email: String,
    is_admin: bool,
    access_token: String,
}

async fn viewer(state: &AppState, auth: &AuthContext) -> Viewer {
    let session = auth.session();
    let access_token = session
        .as_ref()
        .map(|session| session.access_token.clone())
        .unwrap_or_default();
    let cookie_email = session.and_then(|session| session.user.email);
    match auth.verified_user().await {
        Ok(Some(user)) => Viewer {
            is_admin: state.config().is_admin(user.email.as_deref()),
            email: user.email.unwrap_or_default(),
            access_token,
        },
        Ok(None) => Viewer {
            email: cookie_email.unwrap_or_default(),
            is_admin: false,
            access_token,
        },
        Err(err) => {
            tracing::warn!(error = %err, "could not verify console user");
            Viewer {
                email: cookie_email.unwrap_or_default(),
                is_admin: false,
                access_token,
            }
        }
    }
}

fn console_page(state: &AppState, config: SiteConfig, viewer: &Viewer) -> ConsolePage {
    let mut page = ConsolePage::new(layout(state, "Console"), config, viewer.is_admin, &viewer.email);
    page.issuer_url = format!(
        "{}/auth/v1",
        state.config().auth_backend_url.trim_end_matches('/')
    );
    page.signin_url = format!(
        "{}/signin",
        state.config().site_url.as_str().trim_end_matches('/')
    );
    page
}

fn forbidden(state: &AppState, jar: CookieJar) -> Response {
    let page = MessagePage::new(
        layout(state, "Forbidden"),
        "Access denied",
        "Only administrators can change the site configuration.",
    )
    .error()
    .action("/console", "Back to console");
    (jar, render_with_status(StatusCode::FORBIDDEN, &page)).into_response()
}

async fn console(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let auth = match require_session(&state, jar, "/console").await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    let viewer = viewer(&state, &auth).await;

    let configured = state
        .site_config()
        .exists(Some(viewer.access_token.as_str()))
        .await;
    if !configured {
        if viewer.is_admin {
            let page = ConsoleInitPage {
                layout: layout(&state, "Set up"),
                bucket: CONFIG_BUCKET,
                setup_sql: storage_setup_sql(),
                error: None,
            };
            return (auth.into_jar(), render(&page)).into_response();
        }
        let page = MessagePage::new(
            layout(&state, "Configuration Required"),
            "Configuration Required",
            "The site has not been configured yet. Ask an administrator to initialize it.",
        )
        .secondary("/", "Go home");
        return (auth.into_jar(), render(&page)).into_response();
    }

    let config = state.site_config().reload().await;
    let page = console_page(&state, config.as_ref().clone(), &viewer);
    (auth.into_jar(), render(&page)).into_response()
}

async fn save_config(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let auth = match require_session(&state, jar, "/console").await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    let viewer = viewer(&state, &auth).await;
    if !viewer.is_admin {
        return forbidden(&state, auth.into_jar());
    }

    let current = state.site_config().current();
    let updated = ConsoleForm::from_pairs(pairs)
        .and_then(|form| form.apply(&current, |target| state.redirects().is_valid(target)));
    let updated = match updated {
        Ok(config) => config,
        Err(message) => {
            let mut page = console_page(&state, current.as_ref().clone(), &viewer);
            page.error = Some(message);
            return (auth.into_jar(), render_with_status(StatusCode::BAD_REQUEST, &page))
                .into_response();
        }
    };

    let result = state
        .site_config()
        .upload(&updated, &viewer.access_token)
        .await;
    let mut page = console_page(&state, state.site_config().current().as_ref().clone(), &viewer);
    let status = match result {
        Ok(()) => {
            tracing::info!(admin = %viewer.email, "site config saved from console");
            page.notice = Some("Configuration saved".to_string());
            StatusCode::OK
        }
        Err(err @ ConfigStoreError::BucketMissing { .. }) => {
            page.config = updated;
            page.error = Some(err.to_string());
            page.setup_sql = Some(storage_setup_sql());
            StatusCode::BAD_GATEWAY
        }
        Err(err) => {
            tracing::warn!(error = %err, "saving site config failed");
            page.config = updated;
            page.error = Some(format!("Failed to save configuration: {}", err));
            StatusCode::BAD_GATEWAY
        }
    };
    (auth.into_jar(), render_with_status(status, &page)).into_response()
}

async fn initialize(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let auth = match require_session(&state, jar, "/console").await {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    let viewer = viewer(&state, &auth).await;
    if !viewer.is_admin {
        return forbidden(&state, auth.into_jar());
    }

    match state.site_config().initialize(&viewer.access_token).await {
        Ok(()) => {
            tracing::info!(admin = %viewer.email, "site config initialized");
            (auth.into_jar(), Redirect::to("/console")).into_response()
        }
        Err(err @ ConfigStoreError::BucketMissing { .. }) => {
            let page = ConsoleInitPage {
                layout: layout(&state, "Set up"),
                bucket: CONFIG_BUCKET,
                setup_sql: storage_setup_sql(),
                error: Some(err.to_string()),
            };
            (auth.into_jar(), render_with_status(StatusCode::BAD_GATEWAY, &page)).into_response()
        }
        Err(err) => {
            let response = AppError::from(err).respond(&state);
            (auth.into_jar(), response).into_response()
        }
    }
}
