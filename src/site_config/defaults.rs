use std::collections::BTreeMap;

use super::{
    AuthSettings, Branding, CookieOptions, CookieSameSite, Logo, Provider, Redirects, SiteConfig,
    SiteInfo, Theme, Turnstile,
};

pub const DEFAULT_COOKIE_EXPIRES_DAYS: u32 = 365;

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site: SiteInfo {
                name: "My Auth App".to_string(),
                slogan: "Secure Authentication Made Simple".to_string(),
                description: "Sign in to access your account".to_string(),
                copyright: "© 2025 My Auth App".to_string(),
            },
            branding: Branding {
                logo: Logo {
                    url: None,
                    text: Some("My Auth App".to_string()),
                    icon: Some("M".to_string()),
                },
                favicon: "/favicon.ico".to_string(),
            },
            theme: Theme {
                brand_color: "#10b981".to_string(),
                accent_color: "#3b82f6".to_string(),
                gradient_from: "#10b981".to_string(),
                gradient_via: "#059669".to_string(),
                gradient_to: "#3b82f6".to_string(),
            },
            auth: AuthSettings {
                enabled_providers: vec![Provider::Google, Provider::Github],
                providers: BTreeMap::new(),
                allow_signup: true,
                allow_password: true,
                turnstile: Turnstile {
                    enabled: false,
                    site_key: None,
                },
                cookie_options: CookieOptions::default(),
                cookie_domain: None,
            },
            features: serde_json::Map::new(),
            redirects: Redirects {
                after_sign_in: "/".to_string(),
                after_sign_out: "/signin".to_string(),
            },
        }
    }
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            expires: DEFAULT_COOKIE_EXPIRES_DAYS,
            same_site: CookieSameSite::Lax,
        }
    }
}
