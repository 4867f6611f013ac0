//! Session credential verification
//!
//! Session tokens are compact HS256 JWTs minted by the identity provider with a
//! shared secret. Only `sub` is required; `email`, `iss`, `nbf` are honoured when
//! present.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;

use super::{AuthError, VerifiedClaims};
use crate::settings::SessionSettings;

type HmacSha256 = Hmac<Sha256>;

/// Validates an opaque session credential into a stable external identity
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns `InvalidCredential` when the credential cannot be trusted
    async fn verify(&self, credential: &str) -> Result<VerifiedClaims, AuthError>;
}

/// HS256 session token verifier
#[derive(Clone)]
pub struct HmacTokenVerifier {
    secret: Vec<u8>,
    issuer: Option<String>,
    leeway_seconds: i64,
}

impl std::fmt::Debug for HmacTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacTokenVerifier")
            .field("issuer", &self.issuer)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish_non_exhaustive()
    }
}

static SHARED_VERIFIER: OnceCell<Arc<HmacTokenVerifier>> = OnceCell::new();

/// Process-wide verifier, constructed on first use and reused until exit
///
/// # Errors
///
/// Returns an error if the signing secret is not configured
pub fn shared_verifier(settings: &SessionSettings) -> anyhow::Result<Arc<HmacTokenVerifier>> {
    SHARED_VERIFIER
        .get_or_try_init(|| HmacTokenVerifier::from_settings(settings).map(Arc::new))
        .cloned()
}

impl HmacTokenVerifier {
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: secret.to_vec(),
            issuer: None,
            leeway_seconds: 30,
        }
    }

    /// # Errors
    ///
    /// Returns an error if `signing_secret` is empty
    pub fn from_settings(settings: &SessionSettings) -> anyhow::Result<Self> {
        if settings.signing_secret.is_empty() {
            anyhow::bail!(
                "session.signing_secret is not configured; set SESSION_SIGNING_SECRET"
            );
        }
        Ok(Self {
            secret: settings.signing_secret.as_bytes().to_vec(),
            issuer: settings.issuer.clone(),
            leeway_seconds: i64::try_from(settings.leeway_seconds).unwrap_or(30),
        })
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::InvalidCredential(format!("bad verifier key: {e}")))
    }

    /// Mint a session token this verifier accepts. A negative `ttl` yields an
    /// already-expired token.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be serialized
    pub fn issue(
        &self,
        subject: &str,
        email: Option<&str>,
        ttl: Duration,
    ) -> anyhow::Result<String> {
        let now = Utc::now();
        let mut payload = json!({
            "sub": subject,
            "iat": now.timestamp(),
            "exp": (now + ttl).timestamp(),
        });
        if let Some(email) = email {
            payload["email"] = json!(email);
        }
        if let Some(issuer) = &self.issuer {
            payload["iss"] = json!(issuer);
        }
        self.sign(&payload)
    }

    /// Sign arbitrary claims
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be serialized
    pub fn sign(&self, payload: &Value) -> anyhow::Result<String> {
        let header = json!({ "alg": "HS256", "typ": "JWT" });
        let header_b64 = general_purpose::URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload)?);
        let message = format!("{header_b64}.{payload_b64}");

        let mut mac = self.mac().map_err(|e| anyhow::anyhow!(e))?;
        mac.update(message.as_bytes());
        let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{message}.{signature_b64}"))
    }

    fn decode_segment(segment: &str) -> Result<Value, AuthError> {
        let bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(segment)
            .map_err(|_| AuthError::InvalidCredential("base64 decode failed".to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| AuthError::InvalidCredential("JSON parse failed".to_string()))
    }

    fn verify_signature(&self, message: &str, signature_b64: &str) -> Result<(), AuthError> {
        let signature = general_purpose::URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::InvalidCredential("bad signature encoding".to_string()))?;
        let mut mac = self.mac()?;
        mac.update(message.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidCredential("signature mismatch".to_string()))
    }

    fn check_time_claims(&self, claims: &Value) -> Result<(), AuthError> {
        let now = Utc::now().timestamp();

        let exp = claims["exp"]
            .as_i64()
            .ok_or_else(|| AuthError::InvalidCredential("missing exp".to_string()))?;
        if now > exp + self.leeway_seconds {
            return Err(AuthError::InvalidCredential("token expired".to_string()));
        }

        if let Some(nbf) = claims["nbf"].as_i64() {
            if now + self.leeway_seconds < nbf {
                return Err(AuthError::InvalidCredential("token not yet valid".to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TokenVerifier for HmacTokenVerifier {
    async fn verify(&self, credential: &str) -> Result<VerifiedClaims, AuthError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let parts: Vec<&str> = credential.split('.').collect();
        let [header_b64, payload_b64, signature_b64] = parts.as_slice() else {
            return Err(AuthError::InvalidCredential("invalid JWT format".to_string()));
        };

        let header = Self::decode_segment(header_b64)?;
        if header["alg"].as_str() != Some("HS256") {
            return Err(AuthError::InvalidCredential("unsupported alg".to_string()));
        }

        self.verify_signature(&format!("{header_b64}.{payload_b64}"), signature_b64)?;

        let claims = Self::decode_segment(payload_b64)?;
        self.check_time_claims(&claims)?;

        if let Some(expected) = &self.issuer {
            if claims["iss"].as_str() != Some(expected.as_str()) {
                return Err(AuthError::InvalidCredential("issuer mismatch".to_string()));
            }
        }

        let external_user_id = claims["sub"]
            .as_str()
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| AuthError::InvalidCredential("missing sub".to_string()))?
            .to_string();
        let email = claims["email"].as_str().map(ToString::to_string);

        Ok(VerifiedClaims {
            external_user_id,
            email,
            raw_claims: claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test_key_32_bytes_long_for_test_";

    fn invalid(result: Result<VerifiedClaims, AuthError>) -> bool {
        matches!(result, Err(AuthError::InvalidCredential(_)))
    }

    #[tokio::test]
    async fn test_issue_then_verify() {
        let verifier = HmacTokenVerifier::new(SECRET);
        let token = verifier
            .issue("user_2abc", Some("dev@example.com"), Duration::hours(1))
            .unwrap();

        let claims = verifier.verify(&token).await.unwrap();
        assert_eq!(claims.external_user_id, "user_2abc");
        assert_eq!(claims.email.as_deref(), Some("dev@example.com"));
        assert_eq!(claims.raw_claims["sub"], "user_2abc");
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let verifier = HmacTokenVerifier::new(SECRET);
        let token = verifier.issue("user_1", None, Duration::hours(-1)).unwrap();
        assert!(invalid(verifier.verify(&token).await));
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let minted = HmacTokenVerifier::new(b"some-other-secret")
            .issue("user_1", None, Duration::hours(1))
            .unwrap();
        let verifier = HmacTokenVerifier::new(SECRET);
        assert!(invalid(verifier.verify(&minted).await));
    }

    #[tokio::test]
    async fn test_tampered_payload_rejected() {
        let verifier = HmacTokenVerifier::new(SECRET);
        let token = verifier.issue("user_1", None, Duration::hours(1)).unwrap();
        let forged_payload =
            general_purpose::URL_SAFE_NO_PAD.encode(br#"{"sub":"admin","exp":9999999999}"#);
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(invalid(verifier.verify(&forged).await));
    }

    #[tokio::test]
    async fn test_malformed_and_empty_credentials() {
        let verifier = HmacTokenVerifier::new(SECRET);
        assert!(invalid(verifier.verify("not-a-jwt").await));
        assert!(invalid(verifier.verify("a.b.c").await));
        assert_eq!(
            verifier.verify("  ").await.unwrap_err(),
            AuthError::MissingCredential
        );
    }

    #[tokio::test]
    async fn test_missing_sub_rejected() {
        let verifier = HmacTokenVerifier::new(SECRET);
        let token = verifier
            .sign(&json!({ "exp": Utc::now().timestamp() + 60 }))
            .unwrap();
        assert!(invalid(verifier.verify(&token).await));
    }

    #[tokio::test]
    async fn test_issuer_enforced_when_configured() {
        let with_issuer = |issuer: &str| {
            HmacTokenVerifier::from_settings(&SessionSettings {
                signing_secret: String::from_utf8_lossy(SECRET).into_owned(),
                issuer: Some(issuer.to_string()),
                ..Default::default()
            })
            .unwrap()
        };
        let verifier = with_issuer("https://clerk.example.com");
        let good = verifier.issue("user_1", None, Duration::hours(1)).unwrap();
        assert!(verifier.verify(&good).await.is_ok());

        let foreign = with_issuer("https://elsewhere.example.com")
            .issue("user_1", None, Duration::hours(1))
            .unwrap();
        assert!(invalid(verifier.verify(&foreign).await));
    }

    #[test]
    fn test_from_settings_requires_secret() {
        assert!(HmacTokenVerifier::from_settings(&SessionSettings::default()).is_err());

        let settings = SessionSettings {
            signing_secret: "s3cret".to_string(),
            ..Default::default()
        };
        assert!(HmacTokenVerifier::from_settings(&settings).is_ok());
    }
}
