use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Apple,
    Azure,
    Bitbucket,
    Discord,
    Facebook,
    Figma,
    Github,
    Gitlab,
    Google,
    Kakao,
    Keycloak,
    LinkedinOidc,
    Notion,
    SlackOidc,
    Spotify,
    Twitch,
    Twitter,
    Workos,
    Zoom,
}

impl Provider {
    pub const ALL: [Provider; 19] = [
        Provider::Apple,
        Provider::Azure,
        Provider::Bitbucket,
        Provider::Discord,
        Provider::Facebook,
        Provider::Figma,
        Provider::Github,
        Provider::Gitlab,
        Provider::Google,
        Provider::Kakao,
        Provider::Keycloak,
        Provider::LinkedinOidc,
        Provider::Notion,
        Provider::SlackOidc,
        Provider::Spotify,
        Provider::Twitch,
        Provider::Twitter,
        Provider::Workos,
        Provider::Zoom,
    ];

    /// Identifier used by the auth backend and in config documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Apple => "apple",
            Provider::Azure => "azure",
            Provider::Bitbucket => "bitbucket",
            Provider::Discord => "discord",
            Provider::Facebook => "facebook",
            Provider::Figma => "figma",
            Provider::Github => "github",
            Provider::Gitlab => "gitlab",
            Provider::Google => "google",
            Provider::Kakao => "kakao",
            Provider::Keycloak => "keycloak",
            Provider::LinkedinOidc => "linkedin_oidc",
            Provider::Notion => "notion",
            Provider::SlackOidc => "slack_oidc",
            Provider::Spotify => "spotify",
            Provider::Twitch => "twitch",
            Provider::Twitter => "twitter",
            Provider::Workos => "workos",
            Provider::Zoom => "zoom",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Apple => "Apple",
            Provider::Azure => "Microsoft",
            Provider::Bitbucket => "Bitbucket",
            Provider::Discord => "Discord",
            Provider::Facebook => "Facebook",
            Provider::Figma => "Figma",
            Provider::Github => "GitHub",
            Provider::Gitlab => "GitLab",
            Provider::Google => "Google",
            Provider::Kakao => "Kakao",
            Provider::Keycloak => "Keycloak",
            Provider::LinkedinOidc => "LinkedIn",
            Provider::Notion => "Notion",
            Provider::SlackOidc => "Slack",
            Provider::Spotify => "Spotify",
            Provider::Twitch => "Twitch",
            Provider::Twitter => "X",
            Provider::Workos => "WorkOS",
            Provider::Zoom => "Zoom",
        }
    }

    pub fn icon(self) -> ProviderIcon {
        match self {
            Provider::Apple => ProviderIcon::Apple,
            Provider::Google => ProviderIcon::Chrome,
            Provider::Github => ProviderIcon::Github,
            Provider::Gitlab => ProviderIcon::Gitlab,
            _ => ProviderIcon::Key,
        }
    }

    /// Scopes requested when the config does not override them.
    pub fn default_scopes(self) -> Option<&'static str> {
        match self {
            Provider::Github => Some("read:user user:email"),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownProvider(pub String);

impl fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown provider: {}", self.0)
    }
}

impl std::error::Error for UnknownProvider {}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Provider::ALL
            .into_iter()
            .find(|provider| provider.as_str() == normalized)
            .ok_or_else(|| UnknownProvider(value.to_string()))
    }
}

/// Icons available for provider buttons. `Key` is the generic fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProviderIcon {
    Apple,
    Chrome,
    Github,
    Gitlab,
    Key,
}

impl ProviderIcon {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderIcon::Apple => "apple",
            ProviderIcon::Chrome => "chrome",
            ProviderIcon::Github => "github",
            ProviderIcon::Gitlab => "gitlab",
            ProviderIcon::Key => "key",
        }
    }

    /// Inline SVG markup, stroke-based so it follows the button text color.
    pub fn svg(self) -> &'static str {
        match self {
            ProviderIcon::Apple => concat!(
                "<svg class=\"icon\" viewBox=\"0 0 24 24\" aria-hidden=\"true\">",
                "<path d=\"M12 20.94c1.5 0 2.75 1.06 4 1.06 3 0 6-8 6-12.22A4.91 4.91 0 0 0 17 5",
                "c-2.22 0-4 1.44-5 2-1-.56-2.78-2-5-2a4.9 4.9 0 0 0-5 4.78C2 14 5 22 8 22",
                "c1.25 0 2.5-1.06 4-1.06Z\"/><path d=\"M10 2c1 .5 2 2 2 5\"/></svg>"
            ),
            ProviderIcon::Chrome => concat!(
                "<svg class=\"icon\" viewBox=\"0 0 24 24\" aria-hidden=\"true\">",
                "<circle cx=\"12\" cy=\"12\" r=\"10\"/><circle cx=\"12\" cy=\"12\" r=\"4\"/>",
                "<line x1=\"21.17\" x2=\"12\" y1=\"8\" y2=\"8\"/>",
                "<line x1=\"3.95\" x2=\"8.54\" y1=\"6.06\" y2=\"14\"/>",
                "<line x1=\"10.88\" x2=\"15.46\" y1=\"21.94\" y2=\"14\"/></svg>"
            ),
            ProviderIcon::Github => concat!(
                "<svg class=\"icon\" viewBox=\"0 0 24 24\" aria-hidden=\"true\">",
                "<path d=\"M15 22v-4a4.8 4.8 0 0 0-1-3.5c3 0 6-2 6-5.5.08-1.25-.27-2.48-1-3.5",
                ".28-1.15.28-2.35 0-3.5 0 0-1 0-3 1.5-2.64-.5-5.36-.5-8 0C6 2 5 2 5 2",
                "c-.3 1.15-.3 2.35 0 3.5A5.403 5.403 0 0 0 4 9c0 3.5 3 5.5 6 5.5",
                "-.39.49-.68 1.05-.85 1.65-.17.6-.22 1.23-.15 1.85v4\"/>",
                "<path d=\"M9 18c-4.51 2-5-2-7-2\"/></svg>"
            ),
            ProviderIcon::Gitlab => concat!(
                "<svg class=\"icon\" viewBox=\"0 0 24 24\" aria-hidden=\"true\">",
                "<path d=\"m22 13.29-3.33-10a.42.42 0 0 0-.14-.18.38.38 0 0 0-.22-.11",
                ".39.39 0 0 0-.23.07.42.42 0 0 0-.14.18l-2.26 6.67H8.32L6.1 3.26",
                "a.42.42 0 0 0-.1-.18.38.38 0 0 0-.26-.08.39.39 0 0 0-.23.07.42.42 0 0 0-.14.18",
                "L2 13.29a.74.74 0 0 0 .27.83L12 21l9.69-6.88a.71.71 0 0 0 .31-.83Z\"/></svg>"
            ),
            ProviderIcon::Key => concat!(
                "<svg class=\"icon\" viewBox=\"0 0 24 24\" aria-hidden=\"true\">",
                "<path d=\"M2.586 17.414A2 2 0 0 0 2 18.828V21a1 1 0 0 0 1 1h3a1 1 0 0 0 1-1v-1",
                "a1 1 0 0 1 1-1h1a1 1 0 0 0 1-1v-1a1 1 0 0 1 1-1h.172a2 2 0 0 0 1.414-.586",
                "l.814-.814a6.5 6.5 0 1 0-4-4z\"/>",
                "<circle cx=\"16.5\" cy=\"7.5\" r=\".5\"/></svg>"
            ),
        }
    }
}
