//! HTTP transfer primitive built on reqwest streaming responses.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::{ProgressCallback, TransportPrimitive};
use crate::config::TransportConfig;
use crate::error::{Error, TransportError};

/// Streams a GET response body into a file
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    read_timeout: Duration,
}

impl HttpTransport {
    /// Build a client from transport settings
    pub fn new(config: &TransportConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to build HTTP client: {}", e),
                key: Some("transport".to_string()),
            })?;

        Ok(Self {
            client,
            read_timeout: config.read_timeout,
        })
    }

    /// Use an existing client
    pub fn with_client(client: reqwest::Client, read_timeout: Duration) -> Self {
        Self {
            client,
            read_timeout,
        }
    }
}

#[async_trait::async_trait]
impl TransportPrimitive for HttpTransport {
    async fn transfer(
        &self,
        url: &str,
        destination: &Path,
        on_progress: ProgressCallback<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64, TransportError> {
        let url = url::Url::parse(url)
            .map_err(|e| TransportError::Network(format!("invalid URL '{}': {}", url, e)))?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
            });
        }

        let total_bytes = response.content_length();
        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(TransportError::Cancelled);
            }

            let next = tokio::time::timeout(self.read_timeout, stream.next())
                .await
                .map_err(|_| {
                    TransportError::Network(format!(
                        "no data received for {}s",
                        self.read_timeout.as_secs()
                    ))
                })?;

            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            on_progress(written, total_bytes);
        }

        file.flush().await?;

        if let Some(total) = total_bytes
            && written < total
        {
            return Err(TransportError::Network(format!(
                "connection closed after {} of {} bytes",
                written, total
            )));
        }

        Ok(written)
    }
}
