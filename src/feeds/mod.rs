//! Odds feeds.
//!
//! Defines the `OddsFeed` trait and the errors a feed can surface. The only
//! production implementation is `odds_api::OddsApiFeed`, which pulls the
//! target and reference books from The Odds API.

pub mod odds_api;

use async_trait::async_trait;

use crate::types::GameBoard;

/// Feed failures. `Quota` is singled out because the poller reports it to
/// the operator instead of just logging it.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Odds API quota exhausted (HTTP {status})")]
    Quota { status: u16 },

    #[error("Odds API error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to decode odds response: {0}")]
    Decode(String),

    #[error("Odds API request failed: {0}")]
    Request(String),
}

impl FeedError {
    pub fn is_quota(&self) -> bool {
        matches!(self, FeedError::Quota { .. })
    }

    /// Transient failures worth another attempt: server errors and transport
    /// failures. Quota and client errors are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::Http { status, .. } => *status >= 500,
            FeedError::Request(_) => true,
            FeedError::Quota { .. } | FeedError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FeedError::Decode(e.to_string())
        } else {
            FeedError::Request(e.without_url().to_string())
        }
    }
}

/// Source of game boards (target quotes plus reference quotes per game).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OddsFeed: Send + Sync {
    /// Fetch every upcoming game with its target and reference quotes,
    /// ordered by kickoff.
    async fn fetch_board(&self) -> Result<Vec<GameBoard>, FeedError>;
}
