use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration;
use url::Url;

pub const AUTH_REDIRECT_KEY: &str = "auth_redirect_url";

const AUTH_PAGES: [&str; 3] = ["/signin", "/verify-otp", "/callback"];

pub fn is_valid_redirect(candidate: &str, origin: &Url) -> bool {
    let candidate = candidate.trim();
    // Browsers drop tab and newline from URLs, so `/\t/evil.com` would
    // become `//evil.com`. The target must also fit in a Location header.
    if candidate.is_empty() || candidate.chars().any(|ch| ch.is_control() || !ch.is_ascii()) {
        return false;
    }
    if candidate.starts_with('/') {
        return !candidate.starts_with("//") && !candidate.starts_with("/\\");
    }
    match Url::parse(candidate) {
        Ok(url) => url.origin() == origin.origin(),
        Err(_) => false,
    }
}

fn is_auth_page(path: &str) -> bool {
    AUTH_PAGES
        .iter()
        .any(|page| path == *page || path.starts_with(&format!("{}/", page)))
}

fn referer_target(referer: &str, origin: &Url) -> Option<String> {
    let url = Url::parse(referer.trim()).ok()?;
    if url.origin() != origin.origin() || is_auth_page(url.path()) {
        return None;
    }
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        target.push('#');
        target.push_str(fragment);
    }
    Some(target)
}

#[derive(Debug, PartialEq, Eq)]
pub struct Resolution {
    pub target: Option<String>,
    pub persist: bool,
}

pub struct RedirectResolver {
    origin: Url,
    secure: bool,
}

impl RedirectResolver {
    pub fn new(site_url: &Url, secure: bool) -> Self {
        Self {
            origin: site_url.clone(),
            secure,
        }
    }

    pub fn is_valid(&self, candidate: &str) -> bool {
        is_valid_redirect(candidate, &self.origin)
    }

    pub fn resolve(
        &self,
        query: Option<&str>,
        referer: Option<&str>,
        stored: Option<&str>,
    ) -> Resolution {
        if let Some(query) = query.map(str::trim).filter(|value| self.is_valid(value)) {
            return Resolution {
                target: Some(query.to_string()),
                persist: true,
            };
        }
        if let Some(target) = referer.and_then(|referer| referer_target(referer, &self.origin)) {
            return Resolution {
                target: Some(target),
                persist: true,
            };
        }
        Resolution {
            target: stored
                .filter(|value| self.is_valid(value))
                .map(str::to_string),
            persist: false,
        }
    }

    pub fn stored(&self, jar: &CookieJar) -> Option<String> {
        Some(jar.get(AUTH_REDIRECT_KEY)?.value().to_string()).filter(|value| !value.is_empty())
    }

    pub fn remember(&self, jar: CookieJar, target: &str) -> CookieJar {
        let mut cookie = Cookie::new(AUTH_REDIRECT_KEY, target.to_string());
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        if self.secure {
            cookie.set_secure(true);
        }
        jar.add(cookie)
    }

    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        let mut cleared = Cookie::new(AUTH_REDIRECT_KEY, "");
        cleared.set_path("/");
        cleared.set_http_only(true);
        cleared.set_max_age(Duration::seconds(0));
        jar.add(cleared)
    }

    pub fn resolve_and_store(
        &self,
        jar: CookieJar,
        query: Option<&str>,
        referer: Option<&str>,
    ) -> (CookieJar, Option<String>) {
        let stored = self.stored(&jar);
        let resolution = self.resolve(query, referer, stored.as_deref());
        let jar = match (&resolution.target, resolution.persist) {
            (Some(target), true) => self.remember(jar, target),
            _ => jar,
        };
        (jar, resolution.target)
    }

    pub fn take_post_login_target(&self, jar: CookieJar, default: &str) -> (CookieJar, String) {
        let target = self
            .stored(&jar)
            .filter(|value| self.is_valid(value))
            .unwrap_or_else(|| default.to_string());
        (self.clear(jar), target)
    }
}
