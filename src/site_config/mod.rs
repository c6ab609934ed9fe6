mod defaults;
mod partial;
mod provider;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

pub use partial::PartialSiteConfig;
pub use provider::{Provider, ProviderIcon};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub site: SiteInfo,
    pub branding: Branding,
    pub theme: Theme,
    pub auth: AuthSettings,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    #[schema(value_type = Object)]
    pub features: serde_json::Map<String, serde_json::Value>,
    pub redirects: Redirects,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteInfo {
    pub name: String,
    pub slogan: String,
    pub description: String,
    pub copyright: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Branding {
    pub logo: Logo,
    pub favicon: String,
}

/// Image logo when `url` is set, otherwise an icon badge followed by text.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Logo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub brand_color: String,
    pub accent_color: String,
    pub gradient_from: String,
    pub gradient_via: String,
    pub gradient_to: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthSettings {
    pub enabled_providers: Vec<Provider>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[schema(value_type = Object)]
    pub providers: BTreeMap<Provider, ProviderSettings>,
    pub allow_signup: bool,
    pub allow_password: bool,
    pub turnstile: Turnstile,
    pub cookie_options: CookieOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_domain: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<ProviderIcon>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Turnstile {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CookieOptions {
    /// Lifetime in days.
    pub expires: u32,
    pub same_site: CookieSameSite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CookieSameSite {
    Lax,
    Strict,
    None,
}

impl CookieSameSite {
    pub fn as_str(self) -> &'static str {
        match self {
            CookieSameSite::Lax => "Lax",
            CookieSameSite::Strict => "Strict",
            CookieSameSite::None => "None",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lax" => Some(CookieSameSite::Lax),
            "strict" => Some(CookieSameSite::Strict),
            "none" => Some(CookieSameSite::None),
            _ => None,
        }
    }
}

impl From<CookieSameSite> for cookie::SameSite {
    fn from(value: CookieSameSite) -> Self {
        match value {
            CookieSameSite::Lax => cookie::SameSite::Lax,
            CookieSameSite::Strict => cookie::SameSite::Strict,
            CookieSameSite::None => cookie::SameSite::None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Redirects {
    pub after_sign_in: String,
    pub after_sign_out: String,
}

impl SiteConfig {
    pub fn enabled_providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = Vec::new();
        for provider in &self.auth.enabled_providers {
            if !providers.contains(provider) {
                providers.push(*provider);
            }
        }
        for (provider, settings) in &self.auth.providers {
            if settings.enabled {
                if !providers.contains(provider) {
                    providers.push(*provider);
                }
            } else {
                providers.retain(|candidate| candidate != provider);
            }
        }
        providers
    }

    pub fn provider_display_name(&self, provider: Provider) -> String {
        self.auth
            .providers
            .get(&provider)
            .and_then(|settings| settings.display_name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| provider.display_name().to_string())
    }

    pub fn provider_icon(&self, provider: Provider) -> ProviderIcon {
        self.auth
            .providers
            .get(&provider)
            .and_then(|settings| settings.icon)
            .unwrap_or_else(|| provider.icon())
    }

    pub fn provider_scopes(&self, provider: Provider) -> Option<String> {
        self.auth
            .providers
            .get(&provider)
            .and_then(|settings| settings.scopes.clone())
            .filter(|scopes| !scopes.trim().is_empty())
            .or_else(|| provider.default_scopes().map(str::to_string))
    }

    pub fn turnstile_site_key(&self, env_site_key: Option<&str>) -> Option<String> {
        if !self.auth.turnstile.enabled {
            return None;
        }
        self.auth
            .turnstile
            .site_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .or(env_site_key)
            .map(str::to_string)
    }

    /// Logo text, falling back to the site name.
    pub fn logo_text(&self) -> String {
        self.branding
            .logo
            .text
            .clone()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| self.site.name.clone())
    }

    pub fn logo_icon(&self) -> String {
        if let Some(icon) = self
            .branding
            .logo
            .icon
            .as_deref()
            .filter(|icon| !icon.trim().is_empty())
        {
            return icon.to_string();
        }
        self.logo_text()
            .chars()
            .next()
            .map(|ch| ch.to_string())
            .unwrap_or_else(|| "A".to_string())
    }
}
