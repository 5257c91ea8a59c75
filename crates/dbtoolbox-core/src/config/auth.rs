//! Auth service configuration.

use serde::{Deserialize, Deserializer, Serialize};

/// `kind: jwt`
///
/// Exactly one of `secret` (HMAC) or `publicKey` (PEM encoded RSA or EC key)
/// must be set. `algorithm` defaults to `HS256` for secrets and `RS256` for
/// public keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JwtAuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

/// A configured auth service.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthServiceConfig {
    Jwt(JwtAuthConfig),
}

impl AuthServiceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Jwt(_) => "jwt",
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            Self::Jwt(c) => match (&c.secret, &c.public_key) {
                (Some(_), Some(_)) => Err("only one of \"secret\" or \"publicKey\" may be set".to_string()),
                (None, None) => Err("one of \"secret\" or \"publicKey\" is required".to_string()),
                _ => Ok(()),
            },
        }
    }

    pub(crate) fn from_yaml_value(mut value: serde_yaml::Value) -> Result<Self, String> {
        let kind = super::take_kind(&mut value)?;
        match kind.as_str() {
            "jwt" => serde_yaml::from_value(value)
                .map(Self::Jwt)
                .map_err(|e| format!("jwt auth service: {}", e)),
            other => Err(format!("unknown auth service kind \"{}\"", other)),
        }
    }
}

impl<'de> Deserialize<'de> for AuthServiceConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        Self::from_yaml_value(value).map_err(serde::de::Error::custom)
    }
}
