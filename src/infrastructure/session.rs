// Session token source for bearer authorization
use crate::application::error::TelemetryError;
use std::path::PathBuf;

/// Where the bearer token comes from. A token file is re-read on every
/// request so a fresh login elsewhere takes effect without a restart.
#[derive(Debug, Clone)]
pub enum SessionTokenSource {
    Static(String),
    File(PathBuf),
    Missing,
}

impl SessionTokenSource {
    pub fn from_settings(token: Option<String>, token_file: Option<PathBuf>) -> Self {
        match (token, token_file) {
            (_, Some(path)) => SessionTokenSource::File(path),
            (Some(token), None) if !token.trim().is_empty() => SessionTokenSource::Static(token),
            _ => SessionTokenSource::Missing,
        }
    }

    pub async fn token(&self) -> Result<String, TelemetryError> {
        let token = match self {
            SessionTokenSource::Static(token) => token.trim().to_string(),
            SessionTokenSource::File(path) => match tokio::fs::read_to_string(path).await {
                Ok(contents) => contents.trim().to_string(),
                Err(e) => {
                    tracing::warn!("Cannot read session token from {}: {}", path.display(), e);
                    return Err(TelemetryError::Auth);
                }
            },
            SessionTokenSource::Missing => return Err(TelemetryError::Auth),
        };

        if token.is_empty() {
            return Err(TelemetryError::Auth);
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let source = SessionTokenSource::from_settings(Some("abc ".to_string()), None);
        assert_eq!(source.token().await, Ok("abc".to_string()));
    }

    #[tokio::test]
    async fn test_missing_token_is_auth_error() {
        let source = SessionTokenSource::from_settings(Some("  ".to_string()), None);
        assert_eq!(source.token().await, Err(TelemetryError::Auth));
    }

    #[tokio::test]
    async fn test_token_file_is_reread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        tokio::fs::write(&path, "first\n").await.unwrap();

        let source = SessionTokenSource::from_settings(Some("ignored".to_string()), Some(path.clone()));
        assert_eq!(source.token().await, Ok("first".to_string()));

        tokio::fs::write(&path, "second").await.unwrap();
        assert_eq!(source.token().await, Ok("second".to_string()));
    }

    #[tokio::test]
    async fn test_unreadable_token_file_is_auth_error() {
        let source = SessionTokenSource::File(PathBuf::from("/nonexistent/dozemate/token"));
        assert_eq!(source.token().await, Err(TelemetryError::Auth));
    }
}
