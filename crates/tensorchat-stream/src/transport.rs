use crate::config::TensorchatConfig;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use tensorchat_core::{StreamRequest, TensorchatError, TensorchatResult};
use tracing::debug;

/// Response body of a streaming call, one network read per item.
pub type ByteStream = Pin<Box<dyn Stream<Item = TensorchatResult<Bytes>> + Send>>;

/// Opens the byte stream for a request.
///
/// [`HttpTransport`] is the production implementation. Other transports
/// (proxies, recorded fixtures) plug in through
/// [`TensorchatStreaming::with_transport`](crate::TensorchatStreaming::with_transport).
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Issues the request. Errors here are transport errors: no frame has
    /// been consumed yet.
    async fn open(&self, request: &StreamRequest) -> TensorchatResult<ByteStream>;
}

/// `POST {base_url}/streamProcess` over reqwest.
///
/// Built from a [`TensorchatConfig`]; `verbose` also gates its request log.
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
    api_key: String,
    verbose: bool,
}

impl HttpTransport {
    pub fn new(config: &TensorchatConfig) -> TensorchatResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TensorchatError::Http(e.to_string()))?;
        Ok(Self::with_client(http, config))
    }

    /// Reuses an existing reqwest client (connection pool, proxy settings).
    pub fn with_client(http: reqwest::Client, config: &TensorchatConfig) -> Self {
        Self {
            http,
            url: config.stream_url(),
            api_key: config.api_key.clone(),
            verbose: config.verbose,
        }
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    async fn open(&self, request: &StreamRequest) -> TensorchatResult<ByteStream> {
        if self.verbose {
            debug!(url = %self.url, tensors = request.tensors.len(), "opening stream");
        }
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("x-api-key", &self.api_key)
            .header("accept", "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| TensorchatError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TensorchatError::Status {
                status: status.as_u16(),
            });
        }
        if resp.content_length() == Some(0) {
            return Err(TensorchatError::MissingBody);
        }

        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TensorchatError::Stream(e.to_string())));
        Ok(Box::pin(stream))
    }
}
