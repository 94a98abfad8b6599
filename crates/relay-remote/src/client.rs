//! HTTP client for remote worker services

use relay_utils::Settings;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::card::{AgentCard, CARD_PATH};
use crate::error::{RemoteError, Result};
use crate::protocol::{TaskRequest, TaskResponse, TaskStatus};
use crate::retry::RetryPolicy;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for card discovery and task delegation
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: Client,
    retry: RetryPolicy,
    timeout: Duration,
}

impl RemoteClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            retry: RetryPolicy::default(),
            timeout,
        })
    }

    /// Client with the default 30 s timeout and a single retry
    pub fn with_defaults() -> Result<Self> {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.remote_timeout)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the capability descriptor served at the endpoint's origin
    #[instrument(skip(self))]
    pub async fn fetch_card(&self, endpoint_url: &str) -> Result<AgentCard> {
        let card_url = card_url(endpoint_url)?;
        self.retry
            .execute("fetch_card", || {
                let http = &self.http;
                let url = card_url.clone();
                async move {
                    let response = check_status(http.get(url).send().await?).await?;
                    response
                        .json::<AgentCard>()
                        .await
                        .map_err(|e| RemoteError::InvalidResponse(format!("agent card: {e}")))
                }
            })
            .await
    }

    /// Send a task and wait for the service's answer
    ///
    /// A response reporting failure is returned as [`RemoteError::Rejected`].
    #[instrument(skip(self, request), fields(session_id = ?request.session_id))]
    pub async fn send_task(&self, endpoint_url: &str, request: &TaskRequest) -> Result<TaskResponse> {
        let url = Url::parse(endpoint_url)?;
        let response = self
            .retry
            .execute("send_task", || {
                let http = &self.http;
                let url = url.clone();
                async move {
                    let response = check_status(http.post(url).json(request).send().await?).await?;
                    response
                        .json::<TaskResponse>()
                        .await
                        .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
                }
            })
            .await?;

        debug!(agent = %response.agent, status = ?response.status, "task answered");
        match response.status {
            TaskStatus::Completed => Ok(response),
            TaskStatus::Failed => Err(RemoteError::Rejected(
                response.error.unwrap_or_else(|| "unspecified failure".to_string()),
            )),
        }
    }
}

/// URL of the capability descriptor for an endpoint
pub fn card_url(endpoint_url: &str) -> Result<Url> {
    Ok(Url::parse(endpoint_url)?.join(CARD_PATH)?)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<TaskResponse>(&body) {
        // The unit ran and failed; running it again would fail the same way
        Ok(answer) if answer.status == TaskStatus::Failed => Err(RemoteError::Rejected(
            answer.error.unwrap_or_else(|| format!("HTTP {status}")),
        )),
        _ => Err(RemoteError::Status {
            status: status.as_u16(),
            message: body,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_url_uses_origin() {
        let url = card_url("http://localhost:11000/research_agent").unwrap();
        assert_eq!(url.as_str(), "http://localhost:11000/.well-known/agent.json");

        let url = card_url("https://agents.example.com/a/b?x=1").unwrap();
        assert_eq!(url.as_str(), "https://agents.example.com/.well-known/agent.json");
    }

    #[test]
    fn test_card_url_rejects_garbage() {
        assert!(matches!(card_url("not a url"), Err(RemoteError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_failure() {
        let client = RemoteClient::new(Duration::from_secs(2))
            .unwrap()
            .with_retry(RetryPolicy::no_retry());
        let err = client
            .send_task("http://127.0.0.1:1/agent", &TaskRequest::new("oi"))
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "{err}");
    }
}
