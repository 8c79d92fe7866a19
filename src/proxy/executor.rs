//! Outbound request execution.
//!
//! Each call resolves, connects and speaks HTTP/1.1 over a fresh connection
//! (TLS for https), follows a bounded number of redirects by hand and hands
//! the final response to the response builder. The whole exchange runs under
//! one timeout; when it fires the in-flight future is dropped, which closes
//! the socket and aborts the connection task.

use super::normalizer::normalize;
use super::response_builder::{build_response, ResponseBuildParams};
use super::types::*;
use crate::config::{DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT_MS};
use crate::error::{FailureCategory, ProxyError};
use crate::infra::{connect_tls, resolve_dns};
use crate::shared::{reason_phrase, DetailedTiming};
use http_body_util::{BodyExt, Full};
use hyper::{
    body::Bytes,
    header::{HeaderMap, ACCEPT_ENCODING, HOST, LOCATION, USER_AGENT},
    Method, Request,
};
use hyper_util::rt::TokioIo;
use std::{net::IpAddr, time::Duration};
use tokio::{net::TcpStream, task::JoinHandle};
use url::{Host, Position, Url};

const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Limits applied to every outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub timeout: Duration,
    /// Zero disables redirect following; the 3xx is returned as-is.
    pub max_redirects: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

/// One request/response exchange on the wire.
struct Hop {
    status: u16,
    status_text: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

/// Aborts the spawned hyper connection driver when dropped.
struct ConnectionTask(JoinHandle<()>);

impl Drop for ConnectionTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn bare_host(url: &Url) -> Result<String, ProxyError> {
    match url.host() {
        Some(Host::Domain(domain)) => Ok(domain.to_string()),
        Some(Host::Ipv4(ip)) => Ok(ip.to_string()),
        Some(Host::Ipv6(ip)) => Ok(ip.to_string()),
        None => Err(ProxyError::InvalidUrl("URL has no host".to_string())),
    }
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

fn build_http_request(
    method: &Method,
    url: &Url,
    headers: &[(String, String)],
    body: Option<&str>,
) -> Result<Request<Full<Bytes>>, ProxyError> {
    let path = &url[Position::BeforePath..Position::AfterQuery];
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(ProxyError::InvalidUrl("URL has no host".to_string())),
    };

    let mut builder = Request::builder().method(method.clone()).uri(path);

    if !has_header(headers, HOST.as_str()) {
        builder = builder.header(HOST, host);
    }
    for (key, value) in headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    if !has_header(headers, ACCEPT_ENCODING.as_str()) {
        builder = builder.header(ACCEPT_ENCODING, "gzip, deflate, br");
    }
    if !has_header(headers, USER_AGENT.as_str()) {
        builder = builder.header(USER_AGENT, DEFAULT_USER_AGENT);
    }

    let body = Bytes::from(body.unwrap_or_default().to_owned());
    builder
        .body(Full::new(body))
        .map_err(|e| ProxyError::InvalidHeader(format!("Failed to build request: {}", e)))
}

async fn connect_tcp(ips: &[IpAddr], port: u16) -> Result<TcpStream, ProxyError> {
    let mut last_error = None;
    for ip in ips {
        match TcpStream::connect((*ip, port)).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!(%ip, port, error = %e, "Connect attempt failed");
                last_error = Some(e);
            }
        }
    }

    let message = match last_error {
        Some(e) => format!("TCP connection failed: {}", e),
        None => "No addresses to connect to".to_string(),
    };
    Err(ProxyError::network(FailureCategory::Connect, message))
}

/// Sends `request` over `io` and reads the whole response.
async fn exchange<I>(
    io: I,
    request: Request<Full<Bytes>>,
    timing: &mut DetailedTiming,
    first: bool,
) -> Result<Hop, ProxyError>
where
    I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| ProxyError::network(FailureCategory::Protocol, format!("HTTP handshake failed: {}", e)))?;

    let _conn = ConnectionTask(tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("Connection closed with error: {}", e);
        }
    }));

    if first {
        timing.start_request();
    }

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| ProxyError::network(FailureCategory::Protocol, format!("Request failed: {}", e)))?;

    if first {
        timing.mark_ttfb();
        timing.start_download();
    }

    let status = response.status().as_u16();
    let status_text = reason_phrase(&response);
    let headers = response.headers().clone();

    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| ProxyError::network(FailureCategory::Body, format!("Failed to read body: {}", e)))?
        .to_bytes()
        .to_vec();

    if first {
        timing.end_download();
    }

    Ok(Hop {
        status,
        status_text,
        headers,
        body,
    })
}

/// Performs a single hop against `url` on a fresh connection.
async fn send_once(
    method: &Method,
    url: &Url,
    headers: &[(String, String)],
    body: Option<&str>,
    timing: &mut DetailedTiming,
    first: bool,
) -> Result<Hop, ProxyError> {
    let host = bare_host(url)?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| ProxyError::InvalidUrl(format!("No port for scheme `{}`", url.scheme())))?;
    let request = build_http_request(method, url, headers, body)?;

    if first {
        timing.start_dns();
    }
    let ips = resolve_dns(&host).await?;
    if first {
        timing.end_dns();
        timing.start_tcp();
    }
    let tcp_stream = connect_tcp(&ips, port).await?;
    if first {
        timing.end_tcp();
    }

    if url.scheme() == "https" {
        if first {
            timing.start_tls();
        }
        let tls_stream = connect_tls(tcp_stream, &host).await?;
        if first {
            timing.end_tls();
        }
        exchange(TokioIo::new(tls_stream), request, timing, first).await
    } else {
        exchange(TokioIo::new(tcp_stream), request, timing, first).await
    }
}

/// Final hop plus where it was fetched from.
struct Outcome {
    hop: Hop,
    url: Url,
    redirected: bool,
}

async fn follow_redirects(
    request: &ConcreteRequest,
    max_redirects: usize,
    timing: &mut DetailedTiming,
) -> Result<Outcome, ProxyError> {
    let mut method: Method = request.method.into();
    let mut url = request.url.clone();
    let mut headers = request.headers.clone();
    let mut body = request.body.clone();
    let mut redirects = 0usize;

    loop {
        let hop = send_once(&method, &url, &headers, body.as_deref(), timing, redirects == 0).await?;

        let location = hop
            .headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let location = match location {
            Some(location) if is_redirect(hop.status) && max_redirects > 0 => location,
            _ => {
                return Ok(Outcome {
                    hop,
                    url,
                    redirected: redirects > 0,
                })
            }
        };

        if redirects >= max_redirects {
            return Err(ProxyError::TooManyRedirects {
                limit: max_redirects,
            });
        }

        let next = url.join(&location).map_err(|e| {
            ProxyError::network(
                FailureCategory::Protocol,
                format!("Invalid redirect location `{}`: {}", location, e),
            )
        })?;
        if !matches!(next.scheme(), "http" | "https") {
            return Err(ProxyError::network(
                FailureCategory::Protocol,
                format!("Refusing redirect to `{}`", next),
            ));
        }

        tracing::debug!(status = hop.status, from = %url, to = %next, "Following redirect");

        if hop.status == 303 || (matches!(hop.status, 301 | 302) && method == Method::POST) {
            if method != Method::HEAD {
                method = Method::GET;
            }
            body = None;
            headers.retain(|(k, _)| {
                !k.eq_ignore_ascii_case("content-type") && !k.eq_ignore_ascii_case("content-length")
            });
        }
        if next.origin() != url.origin() {
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case("authorization"));
        }

        url = next;
        redirects += 1;
    }
}

/// Executes an already-normalized request.
///
/// The clock starts here, so normalization never counts toward `duration`.
pub async fn execute(
    request: &ConcreteRequest,
    options: &ExecuteOptions,
) -> Result<ResponseEnvelope, ProxyError> {
    let timeout_ms = request
        .timeout_ms
        .unwrap_or(options.timeout.as_millis() as u64);

    tracing::debug!(
        method = request.method.as_str(),
        url = %request.url,
        timeout_ms,
        "Dispatching request"
    );

    let mut timing = DetailedTiming::new();
    let outcome = tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        follow_redirects(request, options.max_redirects, &mut timing),
    )
    .await;
    timing.finish();

    match outcome {
        Ok(Ok(Outcome {
            hop,
            url,
            redirected,
        })) => Ok(build_response(ResponseBuildParams {
            status: hop.status,
            status_text: hop.status_text,
            headers: hop.headers,
            body_bytes: hop.body,
            timing,
            final_url: url.to_string(),
            redirected,
        })),
        Ok(Err(e)) => {
            tracing::debug!(elapsed_ms = timing.total_ms(), error = %e, "Outbound call failed");
            Err(e)
        }
        Err(_) => {
            tracing::debug!(elapsed_ms = timing.total_ms(), "Outbound call timed out");
            Err(ProxyError::Timeout { timeout_ms })
        }
    }
}

/// Normalizes `spec` and executes it.
pub async fn execute_request(
    spec: &RequestSpec,
    options: &ExecuteOptions,
) -> Result<ResponseEnvelope, ProxyError> {
    let request = normalize(spec)?;
    execute(&request, options).await
}
