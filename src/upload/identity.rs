use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use super::authority::{AuthorizationToken, SigningIdentity, UploadClaims};
use crate::error::{ClipcastError, ClipcastResult};

pub const TOKEN_SCHEME: &str = "Ed25519";

/// Token body: the signed claims plus the key that signed them
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SignedClaims {
    claims: UploadClaims,
    public_key: String,
    signature: String,
}

/// Local Ed25519 signing identity
pub struct KeyManager {
    signing_key: SigningKey,
}

impl KeyManager {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&rand::random::<[u8; 32]>()),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> ClipcastResult<Self> {
        let key_bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            ClipcastError::AuthorizationFailed(format!(
                "Invalid key length: expected 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&key_bytes),
        })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn public_key_b64(&self) -> String {
        general_purpose::STANDARD.encode(self.public_key().as_bytes())
    }

    /// Check a header value minted by any `KeyManager` and return its claims
    pub fn verify_token(header: &str) -> ClipcastResult<UploadClaims> {
        let encoded = header
            .strip_prefix(TOKEN_SCHEME)
            .map(str::trim_start)
            .ok_or_else(|| {
                ClipcastError::AuthorizationFailed("Unknown authorization scheme".to_string())
            })?;
        let body = general_purpose::STANDARD.decode(encoded)?;
        let signed: SignedClaims = serde_json::from_slice(&body)?;

        let key_bytes: [u8; 32] = general_purpose::STANDARD
            .decode(&signed.public_key)?
            .try_into()
            .map_err(|_| ClipcastError::AuthorizationFailed("Invalid public key length".into()))?;
        let sig_bytes: [u8; 64] = general_purpose::STANDARD
            .decode(&signed.signature)?
            .try_into()
            .map_err(|_| ClipcastError::AuthorizationFailed("Invalid signature length".into()))?;

        let public_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| ClipcastError::AuthorizationFailed(format!("Invalid public key: {}", e)))?;
        let message = serde_json::to_vec(&signed.claims)?;
        public_key
            .verify(&message, &Signature::from_bytes(&sig_bytes))
            .map_err(|_| ClipcastError::AuthorizationFailed("Signature mismatch".to_string()))?;

        Ok(signed.claims)
    }
}

impl SigningIdentity for KeyManager {
    fn sign_claims(&self, claims: &UploadClaims) -> ClipcastResult<AuthorizationToken> {
        let message = serde_json::to_vec(claims)?;
        let signature = self.signing_key.sign(&message);
        let signed = SignedClaims {
            claims: claims.clone(),
            public_key: self.public_key_b64(),
            signature: general_purpose::STANDARD.encode(signature.to_bytes()),
        };
        let body = general_purpose::STANDARD.encode(serde_json::to_vec(&signed)?);
        Ok(AuthorizationToken::new(format!("{} {}", TOKEN_SCHEME, body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> UploadClaims {
        UploadClaims {
            action: "upload".to_string(),
            hash: "ab".repeat(32),
            size: 1024,
            mime_type: "video/mp4".to_string(),
            created_at: 1_700_000_000,
            expiration: Some(1_700_000_600),
        }
    }

    #[test]
    fn test_token_verifies() {
        let keys = KeyManager::generate();
        let token = keys.sign_claims(&claims()).unwrap();
        assert!(token.as_str().starts_with("Ed25519 "));

        let verified = KeyManager::verify_token(token.as_str()).unwrap();
        assert_eq!(verified, claims());
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let keys = KeyManager::generate();
        let token = keys.sign_claims(&claims()).unwrap();
        let body = general_purpose::STANDARD
            .decode(token.as_str().trim_start_matches("Ed25519 "))
            .unwrap();
        let mut signed: SignedClaims = serde_json::from_slice(&body).unwrap();
        signed.claims.size = 1;
        let forged = format!(
            "Ed25519 {}",
            general_purpose::STANDARD.encode(serde_json::to_vec(&signed).unwrap())
        );

        assert!(matches!(
            KeyManager::verify_token(&forged),
            Err(ClipcastError::AuthorizationFailed(_))
        ));
        assert!(KeyManager::verify_token("Bearer abc").is_err());
    }

    #[test]
    fn test_key_roundtrip() {
        let keys = KeyManager::generate();
        let restored = KeyManager::from_bytes(&keys.to_bytes()).unwrap();
        assert_eq!(keys.public_key_b64(), restored.public_key_b64());
        assert!(KeyManager::from_bytes(&[0u8; 31]).is_err());
    }
}
