use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use cookie::time::Duration;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const PKCE_VERIFIER_COOKIE: &str = "auth_code_verifier";
const VERIFIER_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// S256 code challenge.
pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn store_verifier(jar: CookieJar, verifier: &str, secure: bool) -> CookieJar {
    let mut cookie = Cookie::new(PKCE_VERIFIER_COOKIE, verifier.to_string());
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(Duration::minutes(VERIFIER_TTL_MINUTES));
    if secure {
        cookie.set_secure(true);
    }
    jar.add(cookie)
}

pub fn take_verifier(jar: CookieJar) -> (CookieJar, Option<String>) {
    let verifier = jar
        .get(PKCE_VERIFIER_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty());
    let mut cleared = Cookie::new(PKCE_VERIFIER_COOKIE, "");
    cleared.set_path("/");
    cleared.set_max_age(Duration::seconds(0));
    (jar.add(cleared), verifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_rfc7636_example() {
        assert_eq!(
            challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn generated_pair_is_consistent() {
        let pair = PkcePair::generate();
        assert_eq!(pair.verifier.len(), 43);
        assert_eq!(pair.challenge, challenge_for(&pair.verifier));
        assert_ne!(pair.verifier, PkcePair::generate().verifier);
    }

    #[test]
    fn verifier_is_single_use() {
        let jar = store_verifier(CookieJar::new(), "abc", false);
        let (jar, first) = take_verifier(jar);
        assert_eq!(first.as_deref(), Some("abc"));
        let (_, second) = take_verifier(jar);
        assert_eq!(second, None);
    }
}
