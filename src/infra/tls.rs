//! TLS client setup for HTTPS origins.

use crate::error::{FailureCategory, ProxyError};
use rustls_pki_types::ServerName;
use std::sync::{Arc, OnceLock};
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

static TLS_CONFIG: OnceLock<Arc<rustls::ClientConfig>> = OnceLock::new();

/// Client configuration trusting Mozilla's root certificates.
///
/// The ring provider is named explicitly so the config does not depend on a
/// process-wide default provider being installed.
pub fn create_tls_config() -> Result<Arc<rustls::ClientConfig>, ProxyError> {
    if let Some(config) = TLS_CONFIG.get() {
        return Ok(config.clone());
    }

    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| ProxyError::network(FailureCategory::Tls, format!("TLS setup failed: {}", e)))?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    Ok(TLS_CONFIG.get_or_init(|| Arc::new(config)).clone())
}

/// Performs the TLS handshake over an established TCP stream.
pub async fn connect_tls(
    tcp_stream: TcpStream,
    host: &str,
) -> Result<TlsStream<TcpStream>, ProxyError> {
    let connector = TlsConnector::from(create_tls_config()?);

    let server_name = ServerName::try_from(host.to_string()).map_err(|e| {
        ProxyError::network(FailureCategory::Tls, format!("Invalid server name: {}", e))
    })?;

    connector
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| ProxyError::network(FailureCategory::Tls, format!("TLS handshake failed: {}", e)))
}
