//! # dbtoolbox-auth
//!
//! Auth services verify bearer tokens sent by the caller and expose their
//! claims. A tool can require a verified token (`authRequired`) and a
//! parameter can take its value from a claim instead of the request body.
//!
//! Each service reads its token from the `<serviceName>_token` header, so a
//! single request can carry tokens for several services at once.

pub mod error;
pub mod jwt;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dbtoolbox_core::{AuthServiceConfig, ClaimsMap};
use serde_json::{Map, Value};

pub use error::AuthError;
pub use jwt::JwtAuthService;

/// A configured token verifier.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Name of the service in the tools file.
    fn name(&self) -> &str;

    fn kind(&self) -> &'static str;

    /// Header that carries this service's token.
    fn header_name(&self) -> String {
        format!("{}_token", self.name())
    }

    /// Verify `token` and return its claims.
    async fn verify(&self, token: &str) -> error::Result<Map<String, Value>>;
}

/// Build the verifier for one configured auth service.
pub fn build_auth_service(
    name: &str,
    config: &AuthServiceConfig,
) -> error::Result<Arc<dyn AuthService>> {
    match config {
        AuthServiceConfig::Jwt(jwt) => Ok(Arc::new(JwtAuthService::new(name, jwt)?)),
    }
}

/// Verify every token present in a request.
///
/// `header` looks up a header value by name. Services without a header, and
/// tokens that fail verification, are skipped: the caller is simply not
/// authenticated for that service.
pub async fn verified_claims<'a, I, F>(services: I, header: F) -> ClaimsMap
where
    I: IntoIterator<Item = &'a Arc<dyn AuthService>>,
    F: Fn(&str) -> Option<String>,
{
    let mut claims = ClaimsMap::new();

    for service in services {
        let Some(raw) = header(&service.header_name()) else {
            continue;
        };
        let token = raw.strip_prefix("Bearer ").unwrap_or(&raw).trim();

        match service.verify(token).await {
            Ok(verified) => {
                claims.insert(service.name().to_string(), verified);
            }
            Err(e) => {
                tracing::debug!(auth_service = %service.name(), error = %e, "Token not verified");
            }
        }
    }

    claims
}

/// Auth services keyed by name.
pub type AuthServices = BTreeMap<String, Arc<dyn AuthService>>;

#[cfg(test)]
mod tests {
    use super::*;
    use dbtoolbox_core::JwtAuthConfig;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde_json::json;
    use std::collections::HashMap;

    fn service(name: &str, secret: &str) -> Arc<dyn AuthService> {
        let config = AuthServiceConfig::Jwt(JwtAuthConfig {
            secret: Some(secret.to_string()),
            public_key: None,
            algorithm: None,
            issuer: None,
            audience: None,
        });
        build_auth_service(name, &config).unwrap()
    }

    fn token(secret: &str, email: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &json!({"email": email, "exp": 4102444800u64}),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_verified_claims_skips_bad_tokens() {
        let services = vec![
            service("good", "secret-one-secret-one-secret-one"),
            service("bad", "secret-two-secret-two-secret-two"),
            service("absent", "secret-three-secret-three-secret"),
        ];

        let mut headers = HashMap::new();
        headers.insert(
            "good_token".to_string(),
            format!("Bearer {}", token("secret-one-secret-one-secret-one", "a@example.com")),
        );
        headers.insert(
            "bad_token".to_string(),
            token("not-the-right-secret-at-all-sorry", "b@example.com"),
        );

        let claims = verified_claims(&services, |name| headers.get(name).cloned()).await;

        assert_eq!(claims.len(), 1);
        assert_eq!(claims["good"]["email"], "a@example.com");
        assert!(!claims.contains_key("bad"));
        assert!(!claims.contains_key("absent"));
    }
}
