//! JWT auth service.

use std::str::FromStr;

use async_trait::async_trait;
use dbtoolbox_core::JwtAuthConfig;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use crate::AuthService;
use crate::error::{AuthError, Result};

/// Verifies signed JWTs with a shared secret or a PEM public key.
pub struct JwtAuthService {
    name: String,
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtAuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthService")
            .field("name", &self.name)
            .field("algorithms", &self.validation.algorithms)
            .field("issuer", &self.validation.iss)
            .finish()
    }
}

fn is_hmac(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

impl JwtAuthService {
    pub fn new(name: &str, config: &JwtAuthConfig) -> Result<Self> {
        let invalid = |message: String| AuthError::Config {
            name: name.to_string(),
            message,
        };

        let default_alg = if config.secret.is_some() { "HS256" } else { "RS256" };
        let alg_name = config.algorithm.as_deref().unwrap_or(default_alg);
        let alg = Algorithm::from_str(alg_name)
            .map_err(|_| invalid(format!("unsupported algorithm \"{}\"", alg_name)))?;

        let key = match (&config.secret, &config.public_key) {
            (Some(secret), None) if is_hmac(alg) => DecodingKey::from_secret(secret.as_bytes()),
            (Some(_), None) => {
                return Err(invalid(format!("algorithm {:?} needs \"publicKey\", not \"secret\"", alg)));
            }
            (None, Some(pem)) => {
                let pem = pem.as_bytes();
                let decoded = match alg {
                    Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem),
                    Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
                    Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
                    _ => {
                        return Err(invalid(format!(
                            "algorithm {:?} needs \"secret\", not \"publicKey\"",
                            alg
                        )));
                    }
                };
                decoded.map_err(|e| invalid(format!("invalid publicKey: {}", e)))?
            }
            _ => return Err(invalid("exactly one of \"secret\" or \"publicKey\" is required".to_string())),
        };

        let mut validation = Validation::new(alg);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            name: name.to_string(),
            key,
            validation,
        })
    }
}

#[async_trait]
impl AuthService for JwtAuthService {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "jwt"
    }

    async fn verify(&self, token: &str) -> Result<Map<String, Value>> {
        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn current_time() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    fn token(claims: Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn config() -> JwtAuthConfig {
        JwtAuthConfig {
            secret: Some(SECRET.to_string()),
            public_key: None,
            algorithm: None,
            issuer: Some("https://auth.example.com".to_string()),
            audience: None,
        }
    }

    #[tokio::test]
    async fn test_verify_valid_token() {
        let service = JwtAuthService::new("my-auth", &config()).unwrap();
        let jwt = token(
            json!({
                "sub": "user123",
                "iss": "https://auth.example.com",
                "exp": current_time() + 3600,
                "email": "alice@example.com",
            }),
            SECRET,
        );

        let claims = service.verify(&jwt).await.unwrap();
        assert_eq!(claims["email"], "alice@example.com");
        assert_eq!(service.header_name(), "my-auth_token");
    }

    #[tokio::test]
    async fn test_verify_expired_token() {
        let service = JwtAuthService::new("my-auth", &config()).unwrap();
        let jwt = token(
            json!({"sub": "u", "iss": "https://auth.example.com", "exp": current_time() - 3600}),
            SECRET,
        );
        assert!(matches!(service.verify(&jwt).await, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_verify_wrong_secret_and_issuer() {
        let service = JwtAuthService::new("my-auth", &config()).unwrap();

        let forged = token(
            json!({"sub": "u", "iss": "https://auth.example.com", "exp": current_time() + 60}),
            "some-other-secret-that-is-long-enough",
        );
        assert!(matches!(service.verify(&forged).await, Err(AuthError::InvalidSignature)));

        let wrong_issuer = token(
            json!({"sub": "u", "iss": "https://evil.example.com", "exp": current_time() + 60}),
            SECRET,
        );
        assert!(matches!(service.verify(&wrong_issuer).await, Err(AuthError::InvalidIssuer)));
    }

    #[tokio::test]
    async fn test_verify_garbage() {
        let service = JwtAuthService::new("my-auth", &config()).unwrap();
        assert!(service.verify("not-a-jwt").await.is_err());
    }

    #[test]
    fn test_config_errors() {
        let mut cfg = config();
        cfg.algorithm = Some("RS256".to_string());
        assert!(matches!(JwtAuthService::new("a", &cfg), Err(AuthError::Config { .. })));

        let mut cfg = config();
        cfg.algorithm = Some("XX999".to_string());
        assert!(JwtAuthService::new("a", &cfg).is_err());

        let cfg = JwtAuthConfig {
            secret: None,
            public_key: Some("not a pem".to_string()),
            algorithm: None,
            issuer: None,
            audience: None,
        };
        let err = JwtAuthService::new("a", &cfg).unwrap_err();
        assert!(err.to_string().contains("invalid publicKey"));
    }
}
