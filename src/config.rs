use url::Url;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub site_url: Url,
    pub auth_backend_url: String,
    pub auth_backend_anon_key: String,
    pub turnstile_site_key: Option<String>,
    /// Lowercased allowlist for the admin console.
    pub admin_emails: Vec<String>,
    pub cookie_domain: Option<String>,
    pub production: bool,
    /// Seconds between background reloads of the site config; 0 disables them.
    pub config_refresh_secs: u64,
}

impl Config {
    pub fn is_admin(&self, email: Option<&str>) -> bool {
        let Some(email) = email.map(str::trim).filter(|email| !email.is_empty()) else {
            return false;
        };
        let email = email.to_lowercase();
        self.admin_emails.iter().any(|admin| *admin == email)
    }

    pub fn session_storage_key(&self) -> String {
        let project_ref = Url::parse(&self.auth_backend_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .and_then(|host| host.split('.').next().map(str::to_string))
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| "local".to_string());
        format!("sb-{}-auth-token", project_ref)
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests(auth_backend_url: &str) -> Self {
        Self {
            port: 3000,
            site_url: Url::parse("https://auth.example.com").expect("static url"),
            auth_backend_url: auth_backend_url.to_string(),
            auth_backend_anon_key: "anon-key".to_string(),
            turnstile_site_key: None,
            admin_emails: vec!["admin@example.com".to_string()],
            cookie_domain: None,
            production: false,
            config_refresh_secs: 0,
        }
    }
}
