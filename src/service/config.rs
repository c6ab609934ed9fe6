use std::{env, sync::Arc};
use url::Url;

use crate::config::Config;

const DEFAULT_SITE_URL: &str = "http://localhost:3000";
const DEFAULT_AUTH_BACKEND_URL: &str = "http://localhost:54321";
const DEFAULT_CONFIG_REFRESH_SECS: u64 = 60;

pub trait ConfigService: Send + Sync {
    fn port(&self) -> u16;
    fn values(&self) -> &Config;
}

pub struct ConfigServiceImpl {
    config: Arc<Config>,
}

impl ConfigServiceImpl {
    fn strip_wrapping_quotes(value: &str) -> &str {
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            let first = bytes[0];
            let last = bytes[value.len() - 1];
            if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
                return &value[1..value.len() - 1];
            }
        }
        value
    }

    fn env_nonempty(key: &str) -> Option<String> {
        env::var(key).ok().and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            let normalized = Self::strip_wrapping_quotes(trimmed).trim();
            if normalized.is_empty() {
                None
            } else {
                Some(normalized.to_string())
            }
        })
    }

    fn env_u16(key: &str) -> Option<u16> {
        Self::env_nonempty(key).and_then(|value| value.parse::<u16>().ok())
    }

    fn env_u64(key: &str) -> Option<u64> {
        Self::env_nonempty(key).and_then(|value| value.parse::<u64>().ok())
    }

    fn env_url(key: &str) -> Option<Url> {
        let value = Self::env_nonempty(key)?;
        match Url::parse(&value) {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!(key, error = %err, "ignoring malformed url");
                None
            }
        }
    }

    fn env_list(key: &str) -> Vec<String> {
        Self::env_nonempty(key)
            .map(|value| {
                value
                    .split(',')
                    .map(|item| item.trim().to_lowercase())
                    .filter(|item| !item.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn env_production() -> bool {
        match Self::env_nonempty("APP_ENV") {
            Some(value) => value.eq_ignore_ascii_case("production") || value.eq_ignore_ascii_case("prod"),
            None => !cfg!(debug_assertions),
        }
    }

    pub fn new() -> Self {
        let port = Self::env_u16("PORT").unwrap_or(3000);
        let site_url = Self::env_url("SITE_URL").unwrap_or_else(|| {
            Url::parse(DEFAULT_SITE_URL).expect("default site url is valid")
        });
        let auth_backend_url = Self::env_nonempty("AUTH_BACKEND_URL")
            .unwrap_or_else(|| DEFAULT_AUTH_BACKEND_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let auth_backend_anon_key = Self::env_nonempty("AUTH_BACKEND_ANON_KEY").unwrap_or_default();
        let turnstile_site_key = Self::env_nonempty("TURNSTILE_SITE_KEY");
        let admin_emails = Self::env_list("ADMIN_EMAILS");
        let cookie_domain = Self::env_nonempty("COOKIE_DOMAIN");
        let production = Self::env_production();
        let config_refresh_secs =
            Self::env_u64("CONFIG_REFRESH_SECS").unwrap_or(DEFAULT_CONFIG_REFRESH_SECS);

        if auth_backend_anon_key.is_empty() {
            tracing::warn!("AUTH_BACKEND_ANON_KEY is not set; backend calls will be rejected");
        }
        if turnstile_site_key.is_none() {
            tracing::debug!("TURNSTILE_SITE_KEY is not set");
        }

        Self::from_config(Config {
            port,
            site_url,
            auth_backend_url,
            auth_backend_anon_key,
            turnstile_site_key,
            admin_emails,
            cookie_domain,
            production,
            config_refresh_secs,
        })
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl ConfigService for ConfigServiceImpl {
    fn port(&self) -> u16 {
        self.config.port
    }

    fn values(&self) -> &Config {
        &self.config
    }
}
