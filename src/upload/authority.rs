use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ClipcastError, ClipcastResult};
use crate::logger::{LogLevel, LOGGER};

/// What an upload token vouches for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadClaims {
    pub action: String,
    pub hash: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<i64>,
}

impl UploadClaims {
    pub fn is_expired_at(&self, unix_seconds: i64) -> bool {
        self.expiration.map(|exp| unix_seconds >= exp).unwrap_or(false)
    }
}

/// Opaque header value; only ever forwarded
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationToken(String);

impl AuthorizationToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthorizationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthorizationToken(..)")
    }
}

/// External signer holding the user's identity
pub trait SigningIdentity: Send + Sync {
    fn sign_claims(&self, claims: &UploadClaims) -> ClipcastResult<AuthorizationToken>;
}

/// Mints content-bound upload tokens.
///
/// Purely local: no network access is involved.
#[derive(Clone, Default)]
pub struct UploadAuthority {
    identity: Option<Arc<dyn SigningIdentity>>,
}

impl UploadAuthority {
    pub fn new(identity: Arc<dyn SigningIdentity>) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// An authority with no signer; every request fails
    pub fn without_identity() -> Self {
        Self { identity: None }
    }

    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    pub fn authorize(
        &self,
        hash: &str,
        size: u64,
        mime_type: &str,
        expiry: Option<Duration>,
    ) -> ClipcastResult<AuthorizationToken> {
        let identity = self.identity.as_ref().ok_or_else(|| {
            ClipcastError::AuthorizationFailed("no active signing identity".to_string())
        })?;

        let now = chrono::Utc::now().timestamp();
        let expiration = match expiry {
            None => None,
            Some(lifetime) => Some(
                i64::try_from(lifetime.as_secs())
                    .ok()
                    .and_then(|secs| now.checked_add(secs))
                    .ok_or_else(|| {
                        ClipcastError::AuthorizationFailed(format!(
                            "token lifetime of {}s is out of range",
                            lifetime.as_secs()
                        ))
                    })?,
            ),
        };
        let claims = UploadClaims {
            action: "upload".to_string(),
            hash: hash.to_string(),
            size,
            mime_type: mime_type.to_string(),
            created_at: now,
            expiration,
        };

        let token = identity.sign_claims(&claims).map_err(|e| match e {
            ClipcastError::AuthorizationFailed(_) => e,
            other => ClipcastError::AuthorizationFailed(other.to_string()),
        })?;

        LOGGER.log(
            LogLevel::Debug,
            &format!("Authorized upload of {} ({} bytes)", hash, size),
            "upload::authority",
        );
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoIdentity;

    impl SigningIdentity for EchoIdentity {
        fn sign_claims(&self, claims: &UploadClaims) -> ClipcastResult<AuthorizationToken> {
            Ok(AuthorizationToken::new(serde_json::to_string(claims)?))
        }
    }

    struct BrokenIdentity;

    impl SigningIdentity for BrokenIdentity {
        fn sign_claims(&self, _: &UploadClaims) -> ClipcastResult<AuthorizationToken> {
            Err(ClipcastError::Internal("keychain locked".to_string()))
        }
    }

    #[test]
    fn test_unrepresentable_expiry_is_rejected() {
        let authority = UploadAuthority::new(Arc::new(EchoIdentity));
        for lifetime in [Duration::MAX, Duration::from_secs(i64::MAX as u64)] {
            let err = authority
                .authorize("ab", 1, "video/mp4", Some(lifetime))
                .unwrap_err();
            assert!(matches!(err, ClipcastError::AuthorizationFailed(_)));
        }
    }

    #[test]
    fn test_long_expiry_is_in_the_future() {
        let authority = UploadAuthority::new(Arc::new(EchoIdentity));
        let lifetime = Duration::from_secs(365 * 24 * 3600);
        let token = authority
            .authorize("ab", 1, "video/mp4", Some(lifetime))
            .unwrap();
        let claims: UploadClaims = serde_json::from_str(token.as_str()).unwrap();
        let now = chrono::Utc::now().timestamp();
        assert!(!claims.is_expired_at(now));
        assert_eq!(claims.expiration, Some(claims.created_at + 365 * 24 * 3600));
    }

    #[test]
    fn test_claims_are_bound_to_content() {
        let authority = UploadAuthority::new(Arc::new(EchoIdentity));
        let token = authority
            .authorize("abc123", 42, "video/mp4", Some(Duration::from_secs(600)))
            .unwrap();
        let claims: UploadClaims = serde_json::from_str(token.as_str()).unwrap();

        assert_eq!(claims.action, "upload");
        assert_eq!(claims.hash, "abc123");
        assert_eq!(claims.size, 42);
        assert_eq!(claims.mime_type, "video/mp4");
        assert_eq!(claims.expiration, Some(claims.created_at + 600));
        assert!(!claims.is_expired_at(claims.created_at));
        assert!(claims.is_expired_at(claims.created_at + 600));
    }

    #[test]
    fn test_expiry_is_optional() {
        let authority = UploadAuthority::new(Arc::new(EchoIdentity));
        let token = authority.authorize("abc", 1, "video/mp4", None).unwrap();
        assert!(!token.as_str().contains("expiration"));
    }

    #[test]
    fn test_no_identity() {
        let err = UploadAuthority::without_identity()
            .authorize("abc", 1, "video/mp4", None)
            .unwrap_err();
        assert!(matches!(err, ClipcastError::AuthorizationFailed(_)));
    }

    #[test]
    fn test_signer_errors_become_authorization_failed() {
        let err = UploadAuthority::new(Arc::new(BrokenIdentity))
            .authorize("abc", 1, "video/mp4", None)
            .unwrap_err();
        assert!(matches!(err, ClipcastError::AuthorizationFailed(_)));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AuthorizationToken::new("secret");
        assert!(!format!("{:?}", token).contains("secret"));
    }
}
