//! Pull request comment publishing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};

/// Posts a rendered report to a pull request conversation.
#[async_trait]
pub trait CommentPublisher: Send + Sync {
    /// Post `body` on pull request `number`; returns the comment URL.
    async fn publish_comment(&self, owner: &str, repo: &str, number: u64, body: &str)
        -> Result<String>;
}

/// [`CommentPublisher`] using the GitHub REST API.
pub struct GithubCommentPublisher {
    client: Octocrab,
}

impl GithubCommentPublisher {
    /// Build an authenticated client from a token.
    ///
    /// `api_url` points the client at a GitHub Enterprise Server API
    /// (`GITHUB_API_URL` on Actions runners); `None` uses api.github.com.
    pub fn new(token: &SecretString, api_url: Option<&str>) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token.expose_secret().to_string());
        if let Some(api_url) = api_url {
            builder = builder
                .base_uri(api_url)
                .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;
        }

        let client = builder.build().context("Failed to build GitHub client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl CommentPublisher for GithubCommentPublisher {
    #[instrument(skip(self, body), fields(owner = %owner, repo = %repo, number = number))]
    async fn publish_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<String> {
        debug!("Posting scan report comment");

        // Pull requests share the issue comment endpoint.
        let comment = self
            .client
            .issues(owner, repo)
            .create_comment(number, body)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to post comment to pull request #{}", number);
                e
            })?;

        let comment_url = comment.html_url.to_string();
        debug!(url = %comment_url, "Comment posted successfully");

        Ok(comment_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> SecretString {
        SecretString::new("test-github-token".into())
    }

    #[test]
    fn test_invalid_api_url_is_rejected() {
        assert!(GithubCommentPublisher::new(&token(), Some("not a url")).is_err());
    }

    #[tokio::test]
    async fn test_publish_error_is_not_wrapped() {
        // Nothing listens on the local discard port.
        let publisher = GithubCommentPublisher::new(&token(), Some("http://127.0.0.1:9")).unwrap();

        let err = publisher
            .publish_comment("test-owner", "test-repo", 42, "body")
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<octocrab::Error>().is_some());
        assert!(!err.to_string().contains("Failed to post comment"));
    }
}
