use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{
    AuthSettings, Branding, CookieOptions, CookieSameSite, Logo, Provider, ProviderSettings,
    Redirects, SiteConfig, SiteInfo, Theme, Turnstile,
};

/// A configuration document as stored: any key may be missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialSiteConfig {
    pub site: Option<PartialSite>,
    pub branding: Option<PartialBranding>,
    pub theme: Option<PartialTheme>,
    pub auth: Option<PartialAuth>,
    pub features: Option<serde_json::Map<String, serde_json::Value>>,
    pub redirects: Option<PartialRedirects>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialSite {
    pub name: Option<String>,
    pub slogan: Option<String>,
    pub description: Option<String>,
    pub copyright: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialBranding {
    pub logo: Option<PartialLogo>,
    pub favicon: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialLogo {
    pub url: Option<String>,
    pub text: Option<String>,
    pub icon: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialTheme {
    pub brand_color: Option<String>,
    pub accent_color: Option<String>,
    pub gradient_from: Option<String>,
    pub gradient_via: Option<String>,
    pub gradient_to: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialAuth {
    pub enabled_providers: Option<Vec<Provider>>,
    pub providers: Option<BTreeMap<Provider, ProviderSettings>>,
    pub allow_signup: Option<bool>,
    pub allow_password: Option<bool>,
    pub turnstile: Option<PartialTurnstile>,
    pub cookie_options: Option<PartialCookieOptions>,
    pub cookie_domain: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialTurnstile {
    pub enabled: Option<bool>,
    pub site_key: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialCookieOptions {
    pub expires: Option<u32>,
    pub same_site: Option<CookieSameSite>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialRedirects {
    pub after_sign_in: Option<String>,
    pub after_sign_out: Option<String>,
}

impl SiteConfig {
    pub fn merged(partial: Option<PartialSiteConfig>) -> SiteConfig {
        match partial {
            Some(partial) => SiteConfig::default().apply(partial),
            None => SiteConfig::default(),
        }
    }

    pub fn apply(self, partial: PartialSiteConfig) -> SiteConfig {
        let PartialSiteConfig {
            site,
            branding,
            theme,
            auth,
            features,
            redirects,
        } = partial;

        let mut merged_features = self.features;
        if let Some(features) = features {
            merged_features.extend(features);
        }

        SiteConfig {
            site: apply_site(self.site, site.unwrap_or_default()),
            branding: apply_branding(self.branding, branding.unwrap_or_default()),
            theme: apply_theme(self.theme, theme.unwrap_or_default()),
            auth: apply_auth(self.auth, auth.unwrap_or_default()),
            features: merged_features,
            redirects: apply_redirects(self.redirects, redirects.unwrap_or_default()),
        }
    }
}

fn apply_site(base: SiteInfo, partial: PartialSite) -> SiteInfo {
    SiteInfo {
        name: partial.name.unwrap_or(base.name),
        slogan: partial.slogan.unwrap_or(base.slogan),
        description: partial.description.unwrap_or(base.description),
        copyright: partial.copyright.unwrap_or(base.copyright),
    }
}

fn apply_branding(base: Branding, partial: PartialBranding) -> Branding {
    let logo = partial.logo.unwrap_or_default();
    Branding {
        logo: Logo {
            url: logo.url.or(base.logo.url),
            text: logo.text.or(base.logo.text),
            icon: logo.icon.or(base.logo.icon),
        },
        favicon: partial.favicon.unwrap_or(base.favicon),
    }
}

fn apply_theme(base: Theme, partial: PartialTheme) -> Theme {
    Theme {
        brand_color: partial.brand_color.unwrap_or(base.brand_color),
        accent_color: partial.accent_color.unwrap_or(base.accent_color),
        gradient_from: partial.gradient_from.unwrap_or(base.gradient_from),
        gradient_via: partial.gradient_via.unwrap_or(base.gradient_via),
        gradient_to: partial.gradient_to.unwrap_or(base.gradient_to),
    }
}

fn apply_auth(base: AuthSettings, partial: PartialAuth) -> AuthSettings {
    let turnstile = partial.turnstile.unwrap_or_default();
    let cookie_options = partial.cookie_options.unwrap_or_default();

    let mut providers = base.providers;
    if let Some(overrides) = partial.providers {
        providers.extend(overrides);
    }

    AuthSettings {
        enabled_providers: partial
            .enabled_providers
            .unwrap_or(base.enabled_providers),
        providers,
        allow_signup: partial.allow_signup.unwrap_or(base.allow_signup),
        allow_password: partial.allow_password.unwrap_or(base.allow_password),
        turnstile: Turnstile {
            enabled: turnstile.enabled.unwrap_or(base.turnstile.enabled),
            site_key: turnstile.site_key.or(base.turnstile.site_key),
        },
        cookie_options: CookieOptions {
            expires: cookie_options
                .expires
                .unwrap_or(base.cookie_options.expires),
            same_site: cookie_options
                .same_site
                .unwrap_or(base.cookie_options.same_site),
        },
        cookie_domain: partial.cookie_domain.or(base.cookie_domain),
    }
}

fn apply_redirects(base: Redirects, partial: PartialRedirects) -> Redirects {
    Redirects {
        after_sign_in: partial.after_sign_in.unwrap_or(base.after_sign_in),
        after_sign_out: partial.after_sign_out.unwrap_or(base.after_sign_out),
    }
}

impl From<SiteConfig> for PartialSiteConfig {
    fn from(config: SiteConfig) -> Self {
        let SiteConfig {
            site,
            branding,
            theme,
            auth,
            features,
            redirects,
        } = config;

        PartialSiteConfig {
            site: Some(PartialSite {
                name: Some(site.name),
                slogan: Some(site.slogan),
                description: Some(site.description),
                copyright: Some(site.copyright),
            }),
            branding: Some(PartialBranding {
                logo: Some(PartialLogo {
                    url: branding.logo.url,
                    text: branding.logo.text,
                    icon: branding.logo.icon,
                }),
                favicon: Some(branding.favicon),
            }),
            theme: Some(PartialTheme {
                brand_color: Some(theme.brand_color),
                accent_color: Some(theme.accent_color),
                gradient_from: Some(theme.gradient_from),
                gradient_via: Some(theme.gradient_via),
                gradient_to: Some(theme.gradient_to),
            }),
            auth: Some(PartialAuth {
                enabled_providers: Some(auth.enabled_providers),
                providers: Some(auth.providers),
                allow_signup: Some(auth.allow_signup),
                allow_password: Some(auth.allow_password),
                turnstile: Some(PartialTurnstile {
                    enabled: Some(auth.turnstile.enabled),
                    site_key: auth.turnstile.site_key,
                }),
                cookie_options: Some(PartialCookieOptions {
                    expires: Some(auth.cookie_options.expires),
                    same_site: Some(auth.cookie_options.same_site),
                }),
                cookie_domain: auth.cookie_domain,
            }),
            features: Some(features),
            redirects: Some(PartialRedirects {
                after_sign_in: Some(redirects.after_sign_in),
                after_sign_out: Some(redirects.after_sign_out),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> PartialSiteConfig {
        serde_json::from_str(json).expect("partial config should decode")
    }

    #[test]
    fn none_yields_defaults() {
        assert_eq!(SiteConfig::merged(None), SiteConfig::default());
    }

    #[test]
    fn empty_document_yields_defaults() {
        assert_eq!(SiteConfig::merged(Some(decode("{}"))), SiteConfig::default());
    }

    #[test]
    fn present_fields_win_and_missing_fields_default() {
        let merged = SiteConfig::merged(Some(decode(
            r#"{
                "site": { "name": "Acme" },
                "branding": { "logo": { "url": "/acme.png" } },
                "auth": {
                    "enabledProviders": ["google"],
                    "turnstile": { "enabled": true },
                    "cookieOptions": { "sameSite": "Strict" },
                    "cookieDomain": ".acme.test"
                },
                "redirects": { "afterSignIn": "/app" }
            }"#,
        )));
        let defaults = SiteConfig::default();

        assert_eq!(merged.site.name, "Acme");
        assert_eq!(merged.site.slogan, defaults.site.slogan);
        assert_eq!(merged.branding.logo.url.as_deref(), Some("/acme.png"));
        assert_eq!(merged.branding.logo.text, defaults.branding.logo.text);
        assert_eq!(merged.branding.favicon, defaults.branding.favicon);
        assert_eq!(merged.theme, defaults.theme);
        assert_eq!(merged.auth.enabled_providers, vec![Provider::Google]);
        assert!(merged.auth.turnstile.enabled);
        assert_eq!(merged.auth.turnstile.site_key, None);
        assert_eq!(merged.auth.cookie_options.same_site, CookieSameSite::Strict);
        assert_eq!(merged.auth.cookie_options.expires, 365);
        assert_eq!(merged.auth.cookie_domain.as_deref(), Some(".acme.test"));
        assert_eq!(merged.redirects.after_sign_in, "/app");
        assert_eq!(merged.redirects.after_sign_out, "/signin");
    }

    #[test]
    fn null_values_are_treated_as_missing() {
        let merged = SiteConfig::merged(Some(decode(
            r#"{ "site": { "name": null }, "auth": { "cookieOptions": null } }"#,
        )));
        assert_eq!(merged, SiteConfig::default());
    }

    #[test]
    fn merge_is_idempotent() {
        let once = SiteConfig::merged(Some(decode(
            r#"{
                "site": { "slogan": "Hello" },
                "auth": {
                    "providers": { "gitlab": { "enabled": true, "displayName": "Corp GitLab" } },
                    "allowPassword": false
                },
                "features": { "beta": true }
            }"#,
        )));
        let twice = SiteConfig::merged(Some(PartialSiteConfig::from(once.clone())));
        assert_eq!(once, twice);
    }

    #[test]
    fn full_config_round_trips_through_partial() {
        let mut config = SiteConfig::default();
        config.branding.logo.url = Some("/logo.svg".to_string());
        config.auth.cookie_domain = Some(".example.com".to_string());
        let merged = SiteConfig::merged(Some(PartialSiteConfig::from(config.clone())));
        assert_eq!(merged, config);
    }

    #[test]
    fn features_and_providers_merge_by_key() {
        let base = SiteConfig::merged(Some(decode(
            r#"{ "features": { "a": 1, "b": 2 },
                 "auth": { "providers": { "google": { "enabled": true } } } }"#,
        )));
        let merged = base.apply(decode(
            r#"{ "features": { "b": 3 },
                 "auth": { "providers": { "github": { "enabled": false } } } }"#,
        ));
        assert_eq!(merged.features["a"], serde_json::json!(1));
        assert_eq!(merged.features["b"], serde_json::json!(3));
        assert!(merged.auth.providers.contains_key(&Provider::Google));
        assert!(merged.auth.providers.contains_key(&Provider::Github));
    }

    #[test]
    fn unknown_provider_rejects_document() {
        let decoded = serde_json::from_str::<PartialSiteConfig>(
            r#"{ "auth": { "enabledProviders": ["google", "friendster"] } }"#,
        );
        assert!(decoded.is_err());
    }
}
