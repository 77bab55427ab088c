//! Connection credentials and endpoint addressing.

use async_trait::async_trait;
use url::Url;

use crate::error::{Result, SyncError};

/// Credential presented when opening a script channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthToken {
    /// Signed-in crew member.
    User(String),
    /// Anonymous viewer holding a share link.
    Share(String),
}

impl AuthToken {
    fn query_param(&self) -> (&'static str, &str) {
        match self {
            Self::User(t) => ("user_token", t),
            Self::Share(t) => ("share_token", t),
        }
    }
}

/// Source of the token for the next connection attempt.
///
/// Called on every attempt so refreshed tokens are picked up on reconnect.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<Option<AuthToken>>;
}

/// Fixed tokens, typically from the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenSource {
    pub user_token: Option<String>,
    pub share_token: Option<String>,
}

impl StaticTokenSource {
    pub fn user(token: impl Into<String>) -> Self {
        Self {
            user_token: Some(token.into()),
            share_token: None,
        }
    }

    pub fn share(token: impl Into<String>) -> Self {
        Self {
            user_token: None,
            share_token: Some(token.into()),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<Option<AuthToken>> {
        // A share link wins over a signed-in session.
        if let Some(share) = self.share_token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Some(AuthToken::Share(share.clone())));
        }
        Ok(self
            .user_token
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| AuthToken::User(t.clone())))
    }
}

/// Build `{base}/ws/scripts/{script_id}` with the token as a query parameter.
///
/// # Errors
///
/// Returns [`SyncError::Config`] if `base` is not a usable base URL.
pub fn build_script_url(base: &str, script_id: &str, token: Option<&AuthToken>) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| SyncError::Config(format!("invalid server_url {base:?}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| SyncError::Config(format!("server_url {base:?} cannot be a base")))?
        .pop_if_empty()
        .extend(["ws", "scripts", script_id]);
    if let Some(token) = token {
        let (key, value) = token.query_param();
        url.query_pairs_mut().append_pair(key, value);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn url_with_share_token() {
        let url = build_script_url(
            "ws://localhost:8000",
            "abc",
            Some(&AuthToken::Share("s3cret".into())),
        )
        .expect("url");
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/scripts/abc?share_token=s3cret");
    }

    #[test]
    fn url_with_user_token_and_base_path() {
        let url = build_script_url(
            "wss://cues.example.org/api/",
            "script 1",
            Some(&AuthToken::User("u&1".into())),
        )
        .expect("url");
        assert_eq!(
            url.as_str(),
            "wss://cues.example.org/api/ws/scripts/script%201?user_token=u%261"
        );
    }

    #[test]
    fn url_without_token() {
        let url = build_script_url("ws://h:1", "x", None).expect("url");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn bad_base_is_config_error() {
        assert!(matches!(
            build_script_url("not a url", "x", None),
            Err(SyncError::Config(_))
        ));
        assert!(matches!(
            build_script_url("mailto:a@b", "x", None),
            Err(SyncError::Config(_))
        ));
    }

    #[tokio::test]
    async fn share_token_takes_precedence() {
        let both = StaticTokenSource {
            user_token: Some("u".into()),
            share_token: Some("s".into()),
        };
        assert_eq!(both.token().await.unwrap(), Some(AuthToken::Share("s".into())));
        assert_eq!(
            StaticTokenSource::user("u").token().await.unwrap(),
            Some(AuthToken::User("u".into()))
        );
        assert_eq!(StaticTokenSource::default().token().await.unwrap(), None);
    }
}
