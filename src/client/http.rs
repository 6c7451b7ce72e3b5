//! Redfish HTTP client
//!
//! `reqwest`-based [`Connection`] with connection pooling, a per-request
//! timeout and basic or bearer authentication.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, ClientBuilder, RequestBuilder};
use tracing::debug;
use url::Url;

use super::{Connection, Connector, FetchResult};
use crate::error::{ConnectError, FetchError};
use crate::model::{Auth, Service};

/// Creates one [`RedfishClient`] per service
#[derive(Debug, Clone)]
pub struct HttpConnector {
    timeout: Duration,
    verify_peer: bool,
}

impl HttpConnector {
    /// # Arguments
    /// * `timeout_ms` - per-request timeout (milliseconds)
    /// * `verify_peer` - verify the server's TLS certificate
    pub fn new(timeout_ms: u64, verify_peer: bool) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            verify_peer,
        }
    }
}

impl Connector for HttpConnector {
    fn connect(&self, service: &Service) -> Result<Arc<dyn Connection>, ConnectError> {
        let client = RedfishClient::new(
            service.host(),
            service.auth().clone(),
            self.timeout,
            self.verify_peer,
        )?;
        Ok(Arc::new(client))
    }
}

/// Authenticated HTTP handle to one Redfish service
pub struct RedfishClient {
    client: Client,
    base_url: String,
    auth: Auth,
    closed: AtomicBool,
}

impl RedfishClient {
    /// Create a client for `host`
    ///
    /// A host without a scheme is assumed to be `https://`.
    pub fn new(
        host: &str,
        auth: Auth,
        timeout: Duration,
        verify_peer: bool,
    ) -> Result<Self, ConnectError> {
        let base_url = normalize_host(host)?;

        let client = ClientBuilder::new()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(!verify_peer)
            .user_agent(concat!("redfish-collector/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ConnectError::HttpClientInit)?;

        Ok(Self {
            client,
            base_url,
            auth,
            closed: AtomicBool::new(false),
        })
    }

    /// Scheme and authority, without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn normalize_host(host: &str) -> Result<String, ConnectError> {
    let invalid = |reason: String| ConnectError::InvalidHost {
        host: host.to_string(),
        reason,
    };

    let candidate = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    let url = Url::parse(&candidate).map_err(|e| invalid(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host name".to_string()));
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

async fn send(req: RequestBuilder) -> FetchResult {
    let response = req.send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    let body = response.text().await.map_err(FetchError::HttpResponse)?;

    serde_json::from_str(&body).map_err(|e| FetchError::JsonParse(e.to_string()))
}

impl Connection for RedfishClient {
    fn fetch(&self, path: &str) -> BoxFuture<'static, FetchResult> {
        if self.closed.load(Ordering::Acquire) {
            return future::ready(Err(FetchError::Closed)).boxed();
        }

        let url = self.url_for(path);
        debug!(url = %url, "Sending Redfish request");

        let mut req = self.client.get(&url).header(ACCEPT, "application/json");
        req = match &self.auth {
            Auth::Basic { user, password } => req.basic_auth(user, Some(password)),
            Auth::Bearer(token) => req.bearer_auth(token),
            Auth::None => req,
        };

        send(req).boxed()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        debug!(base_url = %self.base_url, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(host: &str) -> Result<RedfishClient, ConnectError> {
        RedfishClient::new(host, Auth::None, Duration::from_secs(5), true)
    }

    #[test]
    fn test_host_without_scheme_defaults_to_https() {
        let c = client("10.0.0.5").unwrap();
        assert_eq!(c.base_url(), "https://10.0.0.5");
        assert_eq!(c.url_for("/redfish/v1"), "https://10.0.0.5/redfish/v1");
        assert_eq!(c.url_for("redfish/v1"), "https://10.0.0.5/redfish/v1");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let c = client("http://bmc.local:8000/").unwrap();
        assert_eq!(c.url_for("/redfish/v1"), "http://bmc.local:8000/redfish/v1");
    }

    #[test]
    fn test_invalid_hosts() {
        assert!(matches!(client("ftp://bmc"), Err(ConnectError::InvalidHost { .. })));
        assert!(matches!(client("https://"), Err(ConnectError::InvalidHost { .. })));
        assert!(matches!(client("http://[::1"), Err(ConnectError::InvalidHost { .. })));
    }

    #[test]
    fn test_fetch_after_close() {
        let c = client("https://bmc").unwrap();
        c.close();
        let result = tokio_test::block_on(c.fetch("/redfish/v1"));
        assert!(matches!(result, Err(FetchError::Closed)));
    }

    #[test]
    fn test_connector_uses_service_host() {
        let connector = HttpConnector::new(1000, false);
        let service = Service::new("bmc1", "bmc1.example.com");
        assert!(connector.connect(&service).is_ok());

        let bad = Service::new("bmc2", "ftp://bmc2");
        assert!(connector.connect(&bad).is_err());
    }
}
