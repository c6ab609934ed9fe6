use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration;
use std::{net::IpAddr, sync::Arc};

use crate::{config::Config, service::site_config::ConfigStore};

pub struct CookieSessionAdapter {
    store: Arc<ConfigStore>,
    domain_override: Option<String>,
    site_host: Option<String>,
    secure: bool,
}

impl CookieSessionAdapter {
    pub fn new(store: Arc<ConfigStore>, config: &Config) -> Self {
        Self {
            store,
            domain_override: config.cookie_domain.clone(),
            site_host: config.site_url.host_str().map(str::to_string),
            secure: config.production && config.site_url.scheme() == "https",
        }
    }

    /// Effective cookie domain. `None` means a host-only cookie.
    pub fn domain(&self) -> Option<String> {
        if let Some(domain) = &self.domain_override {
            return Some(domain.clone());
        }
        let current = self.store.current();
        if let Some(domain) = current
            .auth
            .cookie_domain
            .as_deref()
            .map(str::trim)
            .filter(|domain| !domain.is_empty())
        {
            return Some(domain.to_string());
        }
        self.site_host
            .as_deref()
            .filter(|host| *host != "localhost" && host.parse::<IpAddr>().is_err())
            .map(str::to_string)
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn get(&self, jar: &CookieJar, key: &str) -> Option<String> {
        Some(jar.get(key)?.value().to_string()).filter(|value| !value.is_empty())
    }

    pub fn set(&self, jar: CookieJar, key: &str, value: &str) -> CookieJar {
        let current = self.store.current();
        let options = &current.auth.cookie_options;

        let mut same_site: SameSite = options.same_site.into();
        if same_site == SameSite::None && !self.secure {
            same_site = SameSite::Lax;
        }

        let mut cookie = Cookie::new(key.to_string(), value.to_string());
        cookie.set_path("/");
        cookie.set_same_site(same_site);
        cookie.set_max_age(Duration::days(i64::from(options.expires)));
        if self.secure {
            cookie.set_secure(true);
        }
        if let Some(domain) = self.domain() {
            cookie.set_domain(domain);
        }
        jar.add(cookie)
    }

    pub fn remove(&self, jar: CookieJar, key: &str) -> CookieJar {
        let mut cleared = Cookie::new(key.to_string(), "");
        cleared.set_path("/");
        cleared.set_max_age(Duration::seconds(0));
        if self.secure {
            cleared.set_secure(true);
        }
        if let Some(domain) = self.domain() {
            cleared.set_domain(domain);
        }
        jar.add(cleared)
    }
}
