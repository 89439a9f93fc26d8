//! Pull transport: request/response polling of the state endpoint.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::StateSnapshot;
use crate::error::PollError;

/// Fetches one state snapshot per call.
///
/// The orchestrator calls this once per poll tick while the push transport
/// is down; failures are logged and retried on the next tick.
#[async_trait]
pub trait StateFetcher: Send + Sync + Debug {
    async fn fetch_state(&self) -> Result<StateSnapshot, PollError>;

    /// Where snapshots are fetched from, for display.
    fn endpoint(&self) -> &str;
}

/// [`StateFetcher`] over HTTP `GET`.
#[derive(Debug, Clone)]
pub struct HttpStateFetcher {
    client: Client,
    url: String,
}

impl HttpStateFetcher {
    /// Create a fetcher for `url` with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, PollError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl StateFetcher for HttpStateFetcher {
    async fn fetch_state(&self) -> Result<StateSnapshot, PollError> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(PollError::Status(response.status().as_u16()));
        }

        response
            .json::<StateSnapshot>()
            .await
            .map_err(|e| PollError::Decode(e.to_string()))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
