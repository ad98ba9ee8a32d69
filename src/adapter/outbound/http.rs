//! `reqwest`-backed [`Transport`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::trace;

use crate::domain::{CancellationToken, Method};
use crate::error::{RequestError, Result};
use crate::port::{Transport, TransportRequest, TransportResponse};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP transport over a shared connection pool.
///
/// Every response that reached the server is returned as is; status
/// classification is left to the engine. Firing the abort token drops the
/// in-progress exchange, which closes its connection.
#[derive(Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    /// Build a transport with the default client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("courier/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// Use a preconfigured client (proxies, custom TLS roots).
    #[must_use]
    pub fn with_client(http: HttpClient) -> Self {
        Self { http }
    }

    async fn exchange(&self, request: TransportRequest) -> std::result::Result<TransportResponse, RequestError> {
        let timeout = request.timeout;
        let mut builder = self
            .http
            .request(to_reqwest(request.method), request.url)
            .timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| map_error(&e, timeout))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_error(&e, timeout))?
            .to_vec();

        trace!(status, bytes = body.len(), "response received");
        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: TransportRequest,
        abort: CancellationToken,
    ) -> std::result::Result<TransportResponse, RequestError> {
        tokio::select! {
            biased;
            () = abort.cancelled() => Err(RequestError::Cancelled),
            result = self.exchange(request) => result,
        }
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn map_error(err: &reqwest::Error, timeout: Duration) -> RequestError {
    if err.is_timeout() {
        RequestError::Timeout { after: timeout }
    } else if err.is_builder() {
        // Bad header value or unencodable body: never reached the network.
        RequestError::InvalidRequest(err.to_string())
    } else {
        RequestError::NetworkUnavailable(err.to_string())
    }
}
