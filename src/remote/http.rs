use super::{RemoteQueue, RemoteQueueError};
use crate::config::types::RemoteConfig;
use crate::record::Record;
use async_trait::async_trait;
use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, RemoteQueueError>;

/// Client for a list-style queue service.
///
/// - `POST {url}/queues/{key}/push` with a JSON record appends to the tail
/// - `POST {url}/queues/{key}/pop` returns the head as JSON, or `204 No Content`
///   when the queue is empty
#[derive(Debug)]
pub struct HttpRemoteQueue {
    base_url: String,
    key: String,
    client: reqwest::Client,
}

impl HttpRemoteQueue {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            key: config.key.clone(),
            client,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/queues/{}/{}", self.base_url, self.key, action)
    }
}

async fn status_error(response: reqwest::Response) -> RemoteQueueError {
    RemoteQueueError::Status {
        status: response.status().as_u16(),
        message: response.text().await.unwrap_or_default(),
    }
}

#[async_trait]
impl RemoteQueue for HttpRemoteQueue {
    async fn push(&self, record: &Record) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint("push"))
            .json(record)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        Ok(())
    }

    async fn pop(&self) -> Result<Option<Record>> {
        let response = self.client.post(self.endpoint("pop")).send().await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => {
                let body = response.bytes().await?;
                Ok(Some(serde_json::from_slice(&body)?))
            }
            _ => Err(status_error(response).await),
        }
    }
}
