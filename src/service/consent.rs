use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use crate::service::auth::{AuthError, HostedAuthClient};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthClient {
    #[serde(alias = "client_id")]
    pub id: String,
    #[serde(alias = "client_name")]
    pub name: String,
    #[serde(default, alias = "client_uri")]
    pub uri: Option<String>,
    #[serde(default)]
    pub logo_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorizationDetails {
    #[serde(default)]
    pub authorization_id: Option<String>,
    #[serde(default)]
    pub client: Option<OAuthClient>,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

impl AuthorizationDetails {
    pub fn scopes(&self) -> Vec<&str> {
        self.scope.split_whitespace().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsentRedirect {
    pub redirect_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentAction {
    Approve,
    Deny,
}

impl ConsentAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsentAction::Approve => "approve",
            ConsentAction::Deny => "deny",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "approve" => Some(ConsentAction::Approve),
            "deny" => Some(ConsentAction::Deny),
            _ => None,
        }
    }
}

pub fn scope_display_name(scope: &str) -> &str {
    match scope {
        "openid" => "OpenID Connect",
        "profile" => "Access your profile information",
        "email" => "Access your email address",
        "offline_access" => "Offline access to your data",
        "read" => "Read your data",
        "write" => "Modify your data",
        other => other,
    }
}

#[async_trait]
pub trait ConsentBackend: Send + Sync {
    async fn get_authorization_details(
        &self,
        authorization_id: &str,
        access_token: &str,
    ) -> Result<AuthorizationDetails, AuthError>;
    async fn decide(
        &self,
        authorization_id: &str,
        action: ConsentAction,
        access_token: &str,
    ) -> Result<ConsentRedirect, AuthError>;

    async fn approve(
        &self,
        authorization_id: &str,
        access_token: &str,
    ) -> Result<ConsentRedirect, AuthError> {
        self.decide(authorization_id, ConsentAction::Approve, access_token)
            .await
    }

    async fn deny(
        &self,
        authorization_id: &str,
        access_token: &str,
    ) -> Result<ConsentRedirect, AuthError> {
        self.decide(authorization_id, ConsentAction::Deny, access_token)
            .await
    }
}

#[async_trait]
impl ConsentBackend for HostedAuthClient {
    async fn get_authorization_details(
        &self,
        authorization_id: &str,
        access_token: &str,
    ) -> Result<AuthorizationDetails, AuthError> {
        let path = format!(
            "/oauth/authorizations/{}",
            urlencoding::encode(authorization_id)
        );
        let request = self.request(Method::GET, &path, Some(access_token));
        Self::send_json(request).await
    }

    async fn decide(
        &self,
        authorization_id: &str,
        action: ConsentAction,
        access_token: &str,
    ) -> Result<ConsentRedirect, AuthError> {
        let path = format!(
            "/oauth/authorizations/{}/consent",
            urlencoding::encode(authorization_id)
        );
        let request = self
            .request(Method::POST, &path, Some(access_token))
            .json(&json!({ "action": action.as_str() }));
        let redirect = Self::send_json::<ConsentRedirect>(request).await?;
        tracing::info!(authorization_id, action = action.as_str(), "consent recorded");
        Ok(redirect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn client(server: &MockServer) -> HostedAuthClient {
        HostedAuthClient::new(reqwest::Client::new(), &server.uri(), "anon")
    }

    #[tokio::test]
    async fn details_include_client_and_scopes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/oauth/authorizations/auth-1"))
            .and(header("Authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "authorization_id": "auth-1",
                "redirect_uri": "https://app.example.com/cb",
                "client": { "client_id": "c1", "client_name": "Example App", "client_uri": "https://app.example.com" },
                "user": { "id": "u1", "email": "user@example.com" },
                "scope": "openid email profile"
            })))
            .mount(&server)
            .await;

        let details = client(&server)
            .get_authorization_details("auth-1", "user-token")
            .await
            .unwrap();
        let oauth_client = details.client.clone().unwrap();
        assert_eq!(oauth_client.name, "Example App");
        assert_eq!(oauth_client.uri.as_deref(), Some("https://app.example.com"));
        assert_eq!(details.scopes(), vec!["openid", "email", "profile"]);
        assert_eq!(details.redirect_url, None);
    }

    #[tokio::test]
    async fn already_consented_returns_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/oauth/authorizations/auth-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "redirect_url": "https://app.example.com/cb?code=xyz"
            })))
            .mount(&server)
            .await;

        let details = client(&server)
            .get_authorization_details("auth-2", "user-token")
            .await
            .unwrap();
        assert_eq!(
            details.redirect_url.as_deref(),
            Some("https://app.example.com/cb?code=xyz")
        );
    }

    #[tokio::test]
    async fn approve_and_deny_post_action() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/oauth/authorizations/auth-1/consent"))
            .and(body_json(json!({ "action": "approve" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "redirect_url": "https://app.example.com/cb?code=ok"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/oauth/authorizations/auth-1/consent"))
            .and(body_json(json!({ "action": "deny" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "redirect_url": "https://app.example.com/cb?error=access_denied"
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let approved = client.approve("auth-1", "user-token").await.unwrap();
        assert!(approved.redirect_url.ends_with("code=ok"));
        let denied = client.deny("auth-1", "user-token").await.unwrap();
        assert!(denied.redirect_url.ends_with("error=access_denied"));
    }

    #[tokio::test]
    async fn expired_authorization_error_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/oauth/authorizations/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 404,
                "error_code": "oauth_authorization_not_found",
                "msg": "authorization not found"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .get_authorization_details("gone", "user-token")
            .await
            .unwrap_err();
        assert_eq!(err.message, "authorization not found");
        assert_eq!(err.status, Some(404));
    }

    #[test]
    fn known_scopes_get_readable_names() {
        assert_eq!(scope_display_name("email"), "Access your email address");
        assert_eq!(scope_display_name("custom:scope"), "custom:scope");
    }
}
