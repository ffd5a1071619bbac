use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;

use super::{LocationPayload, SendError, Transport};

pub struct HttpTransport {
    client: Client,
    url: Url,
}

impl HttpTransport {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("loc-o-mat/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpTransport { client, url })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: &LocationPayload) -> Result<(), SendError> {
        // `json` sets Content-Type: application/json
        let response = self
            .client
            .post(self.url.clone())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SendError::Status(status.as_u16()))
        }
    }
}
