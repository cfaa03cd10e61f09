//! Signed, time-limited links
//!
//! A signed link is the original URL with two extra query parameters:
//!
//! ```text
//! http://host/activate?email=a%40b.com&timestamp=1700000000&signature=3q2-7w...
//! └──────────────── signed prefix ─────────────────────────┘
//! ```
//!
//! The signature is an HMAC-SHA256 over the exact bytes of the signed prefix
//! (URL, separator and timestamp parameter), base64url-encoded without padding.
//! Signature validity and expiry are separate checks so that callers can
//! tell a forged link from one that is merely too old.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::config::LinkConfig;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_PARAM: &str = "timestamp";
pub const SIGNATURE_PARAM: &str = "signature";

/// Outcome of checking a signed link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Valid,
    Invalid,
    Expired,
}

impl LinkStatus {
    /// User-facing message for the outcome
    pub fn message(&self) -> &'static str {
        match self {
            LinkStatus::Valid => "Link verified.",
            LinkStatus::Invalid => "Invalid token.",
            LinkStatus::Expired => "Link expired.",
        }
    }
}

/// Signs and verifies activation links with a process-wide secret
#[derive(Clone)]
pub struct LinkSigner {
    key: Vec<u8>,
}

impl std::fmt::Debug for LinkSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSigner").finish_non_exhaustive()
    }
}

impl LinkSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
        }
    }

    /// Signer keyed by `LINK_SECRET`. Without one, links are signed with a
    /// random key and stop verifying when the process restarts.
    pub fn from_config(config: &LinkConfig) -> Self {
        match &config.secret {
            Some(secret) => Self::new(secret.as_bytes()),
            None => {
                warn!("LINK_SECRET is not set; activation links will not survive a restart");
                Self::random()
            }
        }
    }

    /// Signer with a random 32-byte key, for development runs without a secret
    pub fn random() -> Self {
        let key: [u8; 32] = rand::random();
        Self::new(key)
    }

    pub fn sign(&self, url: &str) -> String {
        self.sign_at(url, Utc::now())
    }

    pub fn sign_at(&self, url: &str, issued_at: DateTime<Utc>) -> String {
        let separator = if url.contains('?') { '&' } else { '?' };
        let signed = format!(
            "{url}{separator}{TIMESTAMP_PARAM}={}",
            issued_at.timestamp()
        );
        let signature = URL_SAFE_NO_PAD.encode(self.mac(signed.as_bytes()).finalize().into_bytes());
        format!("{signed}&{SIGNATURE_PARAM}={signature}")
    }

    /// True only if the signature matches the signed prefix exactly.
    /// Malformed tokens verify false.
    pub fn verify(&self, token: &str) -> bool {
        let Some(parts) = TokenParts::parse(token) else {
            return false;
        };
        let Ok(signature) = URL_SAFE_NO_PAD.decode(parts.signature) else {
            return false;
        };
        // verify_slice compares in constant time
        self.mac(parts.signed.as_bytes())
            .verify_slice(&signature)
            .is_ok()
    }

    pub fn is_expired(&self, token: &str, window_minutes: i64) -> bool {
        self.is_expired_at(token, window_minutes, Utc::now())
    }

    /// True iff more than `window_minutes` have passed since the token was
    /// issued. A token without a readable timestamp counts as expired.
    pub fn is_expired_at(&self, token: &str, window_minutes: i64, now: DateTime<Utc>) -> bool {
        match TokenParts::parse(token) {
            Some(parts) => now.timestamp() - parts.issued_at > window_minutes.saturating_mul(60),
            None => true,
        }
    }

    pub fn check(&self, token: &str, window_minutes: i64) -> LinkStatus {
        self.check_at(token, window_minutes, Utc::now())
    }

    pub fn check_at(&self, token: &str, window_minutes: i64, now: DateTime<Utc>) -> LinkStatus {
        if !self.verify(token) {
            LinkStatus::Invalid
        } else if self.is_expired_at(token, window_minutes, now) {
            LinkStatus::Expired
        } else {
            LinkStatus::Valid
        }
    }

    fn mac(&self, data: &[u8]) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC can take key of any size");
        mac.update(data);
        mac
    }
}

/// Borrowed view of the trailing components of a signed link
struct TokenParts<'a> {
    signed: &'a str,
    issued_at: i64,
    signature: &'a str,
}

impl<'a> TokenParts<'a> {
    fn parse(token: &'a str) -> Option<Self> {
        let (signed, signature) = token.rsplit_once(&format!("&{SIGNATURE_PARAM}="))?;
        if signature.is_empty() || signature.contains('&') {
            return None;
        }

        let (base, timestamp) = signed.rsplit_once(&format!("{TIMESTAMP_PARAM}="))?;
        if !(base.ends_with('?') || base.ends_with('&')) {
            return None;
        }
        if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        Some(Self {
            signed,
            issued_at: timestamp.parse().ok()?,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ACTIVATION_URL: &str = "http://host/activate?email=a@b.com";

    fn signer() -> LinkSigner {
        LinkSigner::new("a-test-secret-of-reasonable-length")
    }

    fn flip(token: &str, index: usize) -> String {
        let mut bytes = token.as_bytes().to_vec();
        bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_sign_appends_timestamp_and_signature() {
        let t0 = Utc::now();
        let token = signer().sign_at(ACTIVATION_URL, t0);

        assert!(token.starts_with(ACTIVATION_URL));
        assert!(token.contains(&format!("&timestamp={}&signature=", t0.timestamp())));
        assert!(signer().verify(&token));
    }

    #[test]
    fn test_sign_url_without_query() {
        let token = signer().sign("http://host/activate");
        assert!(token.starts_with("http://host/activate?timestamp="));
        assert!(signer().verify(&token));
    }

    #[test]
    fn test_activation_window_scenario() {
        let t0 = Utc::now();
        let token = signer().sign_at(ACTIVATION_URL, t0);

        assert!(signer().verify(&token));
        assert!(!signer().is_expired_at(&token, 60, t0 + Duration::minutes(59)));
        assert!(!signer().is_expired_at(&token, 60, t0 + Duration::minutes(60)));
        assert!(signer().is_expired_at(&token, 60, t0 + Duration::minutes(61)));
    }

    #[test]
    fn test_expiry_boundary_is_strict() {
        let t0 = Utc::now();
        let token = signer().sign_at(ACTIVATION_URL, t0);

        for window in [1, 5, 30] {
            let edge = t0 + Duration::minutes(window);
            assert!(!signer().is_expired_at(&token, window, edge));
            assert!(signer().is_expired_at(&token, window, edge + Duration::seconds(1)));
        }
    }

    #[test]
    fn test_tampered_signature_fails() {
        let token = signer().sign(ACTIVATION_URL);
        let start = token.rfind("signature=").unwrap() + "signature=".len();

        for index in start..token.len() {
            assert!(!signer().verify(&flip(&token, index)), "flipped index {index}");
        }
    }

    #[test]
    fn test_tampered_timestamp_fails() {
        let token = signer().sign(ACTIVATION_URL);
        let start = token.rfind("timestamp=").unwrap() + "timestamp=".len();
        let end = token.rfind("&signature=").unwrap();

        for index in start..end {
            let mut bytes = token.as_bytes().to_vec();
            bytes[index] = if bytes[index] == b'9' { b'0' } else { bytes[index] + 1 };
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(!signer().verify(&tampered));
        }
    }

    #[test]
    fn test_tampered_url_fails() {
        let token = signer().sign(ACTIVATION_URL);
        let tampered = token.replacen("a@b.com", "x@b.com", 1);
        assert!(!signer().verify(&tampered));
    }

    #[test]
    fn test_different_secret_fails() {
        let token = signer().sign(ACTIVATION_URL);
        assert!(!LinkSigner::new("another-secret").verify(&token));
        assert!(!LinkSigner::random().verify(&token));
    }

    #[test]
    fn test_from_config_with_and_without_secret() {
        let configured = LinkConfig {
            secret: Some("a-test-secret-of-reasonable-length".to_string()),
            expiry_minutes: 60,
        };
        let token = LinkSigner::from_config(&configured).sign(ACTIVATION_URL);
        assert!(signer().verify(&token));

        let unset = LinkConfig {
            secret: None,
            expiry_minutes: 60,
        };
        let ephemeral = LinkSigner::from_config(&unset);
        let token = ephemeral.sign(ACTIVATION_URL);
        assert!(ephemeral.verify(&token));
        assert!(!signer().verify(&token));
    }

    #[test]
    fn test_malformed_tokens_are_invalid() {
        let signer = signer();
        for token in [
            "",
            ACTIVATION_URL,
            "http://host/activate?email=a@b.com&signature=abc",
            "http://host/activate?email=a@b.com&timestamp=abc&signature=abc",
            "http://host/activate?email=a@b.com&timestamp=&signature=abc",
            "http://host/activate?email=a@b.com&timestamp=123&signature=",
        ] {
            assert!(!signer.verify(token), "{token}");
            assert_eq!(signer.check(token, 60), LinkStatus::Invalid);
        }
        assert!(signer.is_expired("http://host/activate?timestamp=x&signature=y", 60));
    }

    #[test]
    fn test_expired_and_invalid_are_distinct() {
        let signer = signer();
        let t0 = Utc::now();
        let token = signer.sign_at(ACTIVATION_URL, t0);

        let expired = signer.check_at(&token, 60, t0 + Duration::minutes(120));
        assert_eq!(expired, LinkStatus::Expired);

        let forged = flip(&token, token.len() - 3);
        let invalid = signer.check_at(&forged, 60, t0 + Duration::seconds(1));
        assert_eq!(invalid, LinkStatus::Invalid);

        assert_eq!(signer.check_at(&token, 60, t0), LinkStatus::Valid);
        assert_ne!(expired.message(), invalid.message());
    }
}
