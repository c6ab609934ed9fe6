use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::{
    service::consent::{scope_display_name, AuthorizationDetails},
    site_config::{CookieSameSite, Provider, SiteConfig},
};

pub struct Layout {
    pub title: String,
    pub site_name: String,
    pub description: String,
    pub copyright: String,
    pub logo_text: String,
    pub logo_icon: String,
    pub logo_url: Option<String>,
    pub favicon: String,
    pub turnstile_site_key: Option<String>,
}

impl Layout {
    pub fn new(config: &SiteConfig, title: &str) -> Self {
        Self {
            title: format!("{} | {}", title, config.site.name),
            site_name: config.site.name.clone(),
            description: config.site.description.clone(),
            copyright: config.site.copyright.clone(),
            logo_text: config.logo_text(),
            logo_icon: config.logo_icon(),
            logo_url: config
                .branding
                .logo
                .url
                .clone()
                .filter(|url| !url.trim().is_empty()),
            favicon: config.branding.favicon.clone(),
            turnstile_site_key: None,
        }
    }

    pub fn with_turnstile(mut self, site_key: Option<String>) -> Self {
        self.turnstile_site_key = site_key;
        self
    }
}

pub fn render<T: Template>(template: &T) -> Response {
    render_with_status(StatusCode::OK, template)
}

pub fn render_with_status<T: Template>(status: StatusCode, template: &T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to render template");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

pub struct ProviderButton {
    pub slug: &'static str,
    pub label: String,
    pub icon_svg: &'static str,
}

impl ProviderButton {
    pub fn for_config(config: &SiteConfig) -> Vec<Self> {
        config
            .enabled_providers()
            .into_iter()
            .map(|provider| Self {
                slug: provider.as_str(),
                label: format!("Continue with {}", config.provider_display_name(provider)),
                icon_svg: config.provider_icon(provider).svg(),
            })
            .collect()
    }
}

#[derive(Template)]
#[template(path = "signin.html")]
pub struct SignInPage {
    pub layout: Layout,
    pub providers: Vec<ProviderButton>,
    pub allow_password: bool,
    pub allow_signup: bool,
    /// Carried through the forms as a hidden field.
    pub redirect: Option<String>,
    pub email: String,
    pub error: Option<String>,
    pub notice: Option<String>,
}

#[derive(Template)]
#[template(path = "verify_otp.html")]
pub struct VerifyOtpPage {
    pub layout: Layout,
    pub email: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomePage {
    pub layout: Layout,
    pub email: String,
    pub avatar_url: Option<String>,
    pub slogan: String,
}

pub struct Link {
    pub href: String,
    pub label: String,
}

#[derive(Template)]
#[template(path = "message.html")]
pub struct MessagePage {
    pub layout: Layout,
    pub heading: String,
    pub message: String,
    pub is_error: bool,
    pub detail: Option<String>,
    pub action: Option<Link>,
    pub secondary: Option<Link>,
    pub refresh_to: Option<String>,
}

impl MessagePage {
    pub fn new(layout: Layout, heading: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            layout,
            heading: heading.into(),
            message: message.into(),
            is_error: false,
            detail: None,
            action: None,
            secondary: None,
            refresh_to: None,
        }
    }

    pub fn error(mut self) -> Self {
        self.is_error = true;
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn action(mut self, href: impl Into<String>, label: impl Into<String>) -> Self {
        self.action = Some(Link {
            href: href.into(),
            label: label.into(),
        });
        self
    }

    pub fn secondary(mut self, href: impl Into<String>, label: impl Into<String>) -> Self {
        self.secondary = Some(Link {
            href: href.into(),
            label: label.into(),
        });
        self
    }

    pub fn refresh_to(mut self, url: impl Into<String>) -> Self {
        self.refresh_to = Some(url.into());
        self
    }
}

pub struct ScopeLine {
    pub scope: String,
    pub label: String,
}

#[derive(Template)]
#[template(path = "consent.html")]
pub struct ConsentPage {
    pub layout: Layout,
    pub authorization_id: String,
    pub client_name: String,
    pub client_uri: Option<String>,
    pub logo_uri: Option<String>,
    pub scopes: Vec<ScopeLine>,
    pub two_columns: bool,
    pub user_email: String,
    pub error: Option<String>,
}

impl ConsentPage {
    pub fn new(
        layout: Layout,
        authorization_id: &str,
        details: &AuthorizationDetails,
        user_email: &str,
    ) -> Self {
        let scopes: Vec<ScopeLine> = details
            .scopes()
            .into_iter()
            .map(|scope| ScopeLine {
                scope: scope.to_string(),
                label: scope_display_name(scope).to_string(),
            })
            .collect();
        let client = details.client.as_ref();
        Self {
            layout,
            authorization_id: authorization_id.to_string(),
            client_name: client
                .map(|client| client.name.clone())
                .unwrap_or_else(|| "An application".to_string()),
            client_uri: client.and_then(|client| client.uri.clone()),
            logo_uri: client.and_then(|client| client.logo_uri.clone()),
            two_columns: scopes.len() >= 6,
            scopes,
            user_email: user_email.to_string(),
            error: None,
        }
    }
}

#[derive(Template)]
#[template(path = "console_init.html")]
pub struct ConsoleInitPage {
    pub layout: Layout,
    pub bucket: &'static str,
    pub setup_sql: String,
    pub error: Option<String>,
}

pub struct ProviderToggle {
    pub slug: &'static str,
    pub name: &'static str,
    pub checked: bool,
}

pub struct SameSiteOption {
    pub value: &'static str,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "console.html")]
pub struct ConsolePage {
    pub layout: Layout,
    pub config: SiteConfig,
    pub providers: Vec<ProviderToggle>,
    pub same_site_options: Vec<SameSiteOption>,
    pub is_admin: bool,
    pub user_email: String,
    pub notice: Option<String>,
    pub error: Option<String>,
    pub setup_sql: Option<String>,
    pub issuer_url: String,
    pub signin_url: String,
}

impl ConsolePage {
    pub fn new(layout: Layout, config: SiteConfig, is_admin: bool, user_email: &str) -> Self {
        let enabled = config.enabled_providers();
        let providers = Provider::ALL
            .iter()
            .map(|provider| ProviderToggle {
                slug: provider.as_str(),
                name: provider.display_name(),
                checked: enabled.contains(provider),
            })
            .collect();
        let current = config.auth.cookie_options.same_site;
        let same_site_options = [
            CookieSameSite::Lax,
            CookieSameSite::Strict,
            CookieSameSite::None,
        ]
        .into_iter()
        .map(|value| SameSiteOption {
            value: value.as_str(),
            selected: value == current,
        })
        .collect();
        Self {
            layout,
            config,
            providers,
            same_site_options,
            is_admin,
            user_email: user_email.to_string(),
            notice: None,
            error: None,
            setup_sql: None,
            issuer_url: String::new(),
            signin_url: String::new(),
        }
    }

    pub fn logo_url(&self) -> &str {
        self.config.branding.logo.url.as_deref().unwrap_or("")
    }

    pub fn logo_text(&self) -> &str {
        self.config.branding.logo.text.as_deref().unwrap_or("")
    }

    pub fn logo_icon(&self) -> &str {
        self.config.branding.logo.icon.as_deref().unwrap_or("")
    }

    pub fn turnstile_site_key(&self) -> &str {
        self.config.auth.turnstile.site_key.as_deref().unwrap_or("")
    }

    pub fn cookie_domain(&self) -> &str {
        self.config.auth.cookie_domain.as_deref().unwrap_or("")
    }
}
