use dbtoolbox_core::{ConfigError, ParamError, TemplateError};
use dbtoolbox_sources::SourceError;
use dbtoolbox_auth::AuthError;
use thiserror::Error;

/// Errors raised while invoking a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool \"{0}\" not found")]
    NotFound(String),

    #[error("tool invocation not authorized. Please make sure you specify correct auth headers")]
    Unauthorized,

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error("unable to extract template params: {0}")]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl ToolError {
    /// HTTP status that best describes the failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Unauthorized => 401,
            Self::Param(_) | Self::Template(_) => 400,
            Self::Source(_) => 500,
        }
    }

    /// Whether the caller can fix the request and try again.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

/// Errors raised while building a [`Toolbox`](crate::Toolbox). All of them are fatal.
#[derive(Debug, Error)]
pub enum ToolboxError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ToolError::NotFound("x".into()).status_code(), 404);
        assert_eq!(ToolError::Unauthorized.status_code(), 401);

        let param = ToolError::from(ParamError::Required { name: "id".into() });
        assert_eq!(param.status_code(), 400);
        assert!(param.is_client_error());
        assert_eq!(param.to_string(), "parameter \"id\" is required");

        let template = ToolError::from(TemplateError::UndeclaredName("t".into()));
        assert_eq!(template.status_code(), 400);

        let source = ToolError::from(SourceError::Interpolate("bad".into()));
        assert_eq!(source.status_code(), 500);
        assert!(!source.is_client_error());
    }
}
