//! HTTP fetcher.
//!
//! Issues a GET for `http://` and `https://` URLs with `reqwest`. Any
//! status is returned as a response; only transport failures are errors.

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;

use crate::error::FetchError;
use crate::traits::{FetchFuture, Fetcher};
use crate::types::{FetchRequest, FetchResponse};

/// Fetches module payloads over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Fetcher with a default client.
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder().build().map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Fetcher using a preconfigured client (proxies, timeouts, TLS roots).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// True if `request` names an `http` or `https` URL.
    pub fn handles(request: &FetchRequest) -> bool {
        matches!(request.scheme(), Some("http" | "https"))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> FetchFuture<'a> {
        Box::pin(async move {
            if !Self::handles(request) {
                return Err(FetchError::UnsupportedScheme {
                    scheme: request.scheme().unwrap_or("none").to_string(),
                    url: request.url.clone(),
                });
            }

            let mut builder = self.client.get(&request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            debug!(url = %request.url, "fetching module over http");
            let transport = |source| FetchError::Transport {
                url: request.url.clone(),
                source,
            };
            let response = builder.send().await.map_err(transport)?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.bytes().await.map_err(transport)?.to_vec();

            Ok(FetchResponse {
                url: request.url.clone(),
                status,
                content_type,
                body,
            })
        })
    }
}
