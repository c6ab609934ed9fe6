use utoipa::OpenApi;

use crate::{
    handler,
    handler::{health::Health, site::ProviderInfo},
    site_config::{
        AuthSettings, Branding, CookieOptions, CookieSameSite, Logo, Provider, ProviderIcon,
        ProviderSettings, Redirects, SiteConfig, SiteInfo, Theme, Turnstile,
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handler::health::health,
        handler::site::site_config,
        handler::site::providers
    ),
    components(schemas(
        Health,
        ProviderInfo,
        SiteConfig,
        SiteInfo,
        Branding,
        Logo,
        Theme,
        AuthSettings,
        ProviderSettings,
        Turnstile,
        CookieOptions,
        CookieSameSite,
        Redirects,
        Provider,
        ProviderIcon
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "site-config", description = "Public site configuration")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_public_endpoints() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.contains(&&"/api/v1/health".to_string()));
        assert!(paths.contains(&&"/api/v1/site-config".to_string()));
        assert!(paths.contains(&&"/api/v1/site-config/providers".to_string()));
    }
}
