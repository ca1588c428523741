//! HTTP Client
//!
//! Minimal hyper + tokio client used for classification lookups.
//! Features:
//! - Automatic HTTPS with rustls (memory-safe TLS)
//! - Connect and whole-request timeouts
//! - Response body size limit

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::header::{HOST, USER_AGENT};
use hyper::{Method, Request, StatusCode, Uri};
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

/// HTTP client errors
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Body read error: {0}")]
    BodyError(String),

    #[error("Response body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// User-Agent string
    pub user_agent: String,
    /// Maximum response body size
    pub max_body_size: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: String::from("fOS-WB/0.1 (Zero-Bloat Browser)"),
            max_body_size: 1024 * 1024, // 1 MB
        }
    }
}

/// HTTP response wrapper
#[derive(Debug)]
pub struct Response {
    /// Status code
    pub status: StatusCode,
    /// Response body
    pub body: Vec<u8>,
    /// Total request time
    pub total_time: Duration,
}

impl Response {
    /// Check if response was successful (2xx)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Client statistics
#[derive(Debug, Default)]
pub struct ClientStats {
    pub requests_made: std::sync::atomic::AtomicU64,
    pub requests_failed: std::sync::atomic::AtomicU64,
    pub bytes_downloaded: std::sync::atomic::AtomicU64,
}

/// HTTP client
#[derive(Debug, Default)]
pub struct HttpClient {
    /// Configuration
    config: HttpClientConfig,
    /// Statistics
    stats: ClientStats,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: HttpClientConfig) -> Self {
        info!(
            "HTTP client initialized (timeout: {:?}, connect timeout: {:?})",
            config.timeout, config.connect_timeout
        );

        Self {
            config,
            stats: ClientStats::default(),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(HttpClientConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Perform a GET request
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        use std::sync::atomic::Ordering;

        self.stats.requests_made.fetch_add(1, Ordering::Relaxed);

        let result = match tokio::time::timeout(self.config.timeout, self.send(Method::GET, url)).await {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout),
        };

        if let Err(ref e) = result {
            self.stats.requests_failed.fetch_add(1, Ordering::Relaxed);
            debug!("HTTP GET {} failed: {}", url, e);
        }
        result
    }

    async fn send(&self, method: Method, url: &str) -> Result<Response, HttpError> {
        use std::sync::atomic::Ordering;

        let start = Instant::now();

        // 1. Parse URL
        let uri: Uri = url
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| HttpError::InvalidUrl(e.to_string()))?;

        let host = uri
            .host()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?
            .to_string();
        let is_https = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            other => {
                return Err(HttpError::InvalidUrl(format!(
                    "Unsupported scheme: {}",
                    other.unwrap_or("none")
                )));
            }
        };
        let port = uri.port_u16().unwrap_or(if is_https { 443 } else { 80 });
        let host_header = match uri.port_u16() {
            Some(port) => format!("{}:{}", host, port),
            None => host.clone(),
        };
        let target = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| String::from("/"));

        // 2. Build request (origin-form target)
        let request = Request::builder()
            .method(method.clone())
            .uri(target)
            .header(HOST, host_header)
            .header(USER_AGENT, &self.config.user_agent)
            .body(Full::new(Bytes::new()))
            .map_err(|e| HttpError::HttpError(e.to_string()))?;

        // 3. Connect
        let addr = format!("{}:{}", host, port);
        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            tokio::net::TcpStream::connect(&addr),
        )
        .await
        .map_err(|_| HttpError::Timeout)?
        .map_err(|e| HttpError::ConnectionFailed(e.to_string()))?;

        // 4. Send, wrapping in TLS for HTTPS
        let response = if is_https {
            let mut root_store = rustls::RootCertStore::empty();
            root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            let tls_config = ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth();

            let connector = TlsConnector::from(Arc::new(tls_config));
            let server_name = rustls::pki_types::ServerName::try_from(host.clone())
                .map_err(|_| HttpError::TlsError("Invalid server name".to_string()))?;

            let tls_stream = connector
                .connect(server_name, stream)
                .await
                .map_err(|e| HttpError::TlsError(e.to_string()))?;

            send_http1(tls_stream, request).await?
        } else {
            send_http1(stream, request).await?
        };

        // 5. Read response, never buffering past the size limit
        let status = response.status();
        let max_body_size = self.config.max_body_size;

        let collected = Limited::new(response.into_body(), max_body_size)
            .collect()
            .await
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    HttpError::BodyTooLarge(max_body_size)
                } else {
                    HttpError::BodyError(e.to_string())
                }
            })?;
        let body = collected.to_bytes().to_vec();

        self.stats
            .bytes_downloaded
            .fetch_add(body.len() as u64, Ordering::Relaxed);

        let total_time = start.elapsed();
        debug!(
            "HTTP {} {} -> {} ({} bytes, {:?})",
            method,
            url,
            status,
            body.len(),
            total_time
        );

        Ok(Response {
            status,
            body,
            total_time,
        })
    }

    /// Get client statistics (requests, failures, bytes downloaded)
    pub fn stats(&self) -> (u64, u64, u64) {
        use std::sync::atomic::Ordering;
        (
            self.stats.requests_made.load(Ordering::Relaxed),
            self.stats.requests_failed.load(Ordering::Relaxed),
            self.stats.bytes_downloaded.load(Ordering::Relaxed),
        )
    }
}

/// Run one HTTP/1.1 exchange over an established stream
async fn send_http1<S>(
    stream: S,
    request: Request<Full<Bytes>>,
) -> Result<hyper::Response<hyper::body::Incoming>, HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| HttpError::HttpError(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            warn!("Connection error: {}", e);
        }
    });

    sender
        .send_request(request)
        .await
        .map_err(|e| HttpError::HttpError(e.to_string()))
}
