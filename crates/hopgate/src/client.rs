//! Upstream HTTP Client
//!
//! Uses hyper with tokio for HTTP/1.1 to the admitted target.
//! Features:
//! - Dials only the addresses that passed admission (no second DNS lookup)
//! - Automatic HTTPS with rustls (SNI and `Host` use the URL host)
//! - Whole exchange bounded by a timeout, connects bounded individually
//! - Response bodies capped; redirects are relayed, never followed

use hopgate_guard::{Admission, ErrorKind};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE, HOST, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use rustls::ClientConfig;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

/// Upstream errors
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Upstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Body read error: {0}")]
    Body(String),

    #[error("Upstream body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

impl HttpError {
    /// Wire kind for this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::UpstreamTimeout,
            _ => ErrorKind::UpstreamUnavailable,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Whole-exchange timeout
    pub timeout: Duration,
    /// Per-address connection timeout
    pub connect_timeout: Duration,
    /// User-Agent string
    pub user_agent: String,
    /// Maximum response body size
    pub max_body_size: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("hopgate/{}", env!("CARGO_PKG_VERSION")),
            max_body_size: 10 * 1024 * 1024, // 10 MB
        }
    }
}

/// What the caller asked us to send upstream
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    /// Empty for methods that carry no body
    pub body: Bytes,
    pub content_type: Option<HeaderValue>,
}

/// What came back from upstream
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// Sends an admitted request upstream
pub trait Forward: Send + Sync {
    fn forward(
        &self,
        admission: &Admission,
        request: UpstreamRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, HttpError>> + Send;
}

/// hyper-based upstream client
pub struct HttpClient {
    config: HttpClientConfig,
    tls: TlsConnector,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: HttpClientConfig) -> Self {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        info!(
            "HTTP client initialized (timeout: {:?}, max body: {} bytes)",
            config.timeout, config.max_body_size
        );

        Self {
            config,
            tls: TlsConnector::from(Arc::new(tls_config)),
        }
    }

    /// Try each admitted address in order; first successful connect wins
    async fn connect(&self, port: u16, addresses: &[IpAddr]) -> Result<TcpStream, HttpError> {
        let mut last_error = String::from("no admitted addresses");

        for addr in addresses {
            let socket = SocketAddr::new(*addr, port);
            match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(socket)).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => {
                    debug!("Connect to {} failed: {}", socket, e);
                    last_error = format!("{}: {}", socket, e);
                }
                Err(_) => {
                    debug!("Connect to {} timed out", socket);
                    last_error = format!("{}: connect timed out", socket);
                }
            }
        }

        Err(HttpError::ConnectionFailed(last_error))
    }

    async fn exchange(
        &self,
        admission: &Admission,
        request: UpstreamRequest,
    ) -> Result<UpstreamResponse, HttpError> {
        let start = Instant::now();
        let target = &admission.target;

        // 1. Build request (origin-form target, URL host in `Host`)
        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(target.request_target())
            .header(HOST, target.authority())
            .header(USER_AGENT, &self.config.user_agent);
        if let Some(content_type) = request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let upstream_request = builder
            .body(Full::new(request.body))
            .map_err(|e| HttpError::Http(e.to_string()))?;

        // 2. Connect to a vetted address
        let stream = self.connect(target.port(), &admission.addresses).await?;

        // 3. Send, over TLS when needed
        let response = if target.is_https() {
            let server_name = rustls::pki_types::ServerName::try_from(target.host_str().to_string())
                .map_err(|_| HttpError::Tls("Invalid server name".to_string()))?;
            let tls_stream = self
                .tls
                .connect(server_name, stream)
                .await
                .map_err(|e| HttpError::Tls(e.to_string()))?;
            send(TokioIo::new(tls_stream), upstream_request).await?
        } else {
            send(TokioIo::new(stream), upstream_request).await?
        };

        // 4. Read response with size limit
        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = Limited::new(response.into_body(), self.config.max_body_size)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    HttpError::BodyTooLarge(self.config.max_body_size)
                } else {
                    HttpError::Body(e.to_string())
                }
            })?
            .to_bytes();

        debug!(
            "HTTP {} {} -> {} ({} bytes, {:?})",
            request.method,
            target,
            status,
            body.len(),
            start.elapsed()
        );

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

impl Forward for HttpClient {
    async fn forward(
        &self,
        admission: &Admission,
        request: UpstreamRequest,
    ) -> Result<UpstreamResponse, HttpError> {
        tokio::time::timeout(self.config.timeout, self.exchange(admission, request))
            .await
            .map_err(|_| HttpError::Timeout(self.config.timeout))?
    }
}

/// HTTP/1.1 handshake over `io` and a single request
async fn send<T>(
    io: T,
    request: Request<Full<Bytes>>,
) -> Result<hyper::Response<hyper::body::Incoming>, HttpError>
where
    T: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| HttpError::Http(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            warn!("Connection error: {}", e);
        }
    });

    sender
        .send_request(request)
        .await
        .map_err(|e| HttpError::Http(e.to_string()))
}
