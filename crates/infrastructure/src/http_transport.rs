use std::time::Duration;

use async_trait::async_trait;
use musim_domain::{Message, MessageKind, Transport};
use musim_errors::{SimError, SimResult};
use tracing::debug;

/// 基于reqwest的出站消息发送
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> SimResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SimError::transport(format!("Cannot build HTTP client: {e}")))?;
        Ok(Self { http_client })
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

/// 目标地址加上消息种类对应的路径
pub fn endpoint_url(address: &str, kind: MessageKind) -> String {
    format!("{}{}", address.trim_end_matches('/'), kind.path())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, address: &str, kind: MessageKind, message: &Message) -> SimResult<()> {
        let url = endpoint_url(address, kind);

        let response = self
            .http_client
            .post(&url)
            .json(message)
            .send()
            .await
            .map_err(|e| SimError::transport(format!("POST {url} failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            debug!(url = %url, status = %status, "Message delivered");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SimError::transport(format!(
                "POST {url} returned HTTP {status} - {body}"
            )))
        }
    }
}
