//! DNS resolution infrastructure.

use crate::error::{FailureCategory, ProxyError};
use hickory_resolver::{config::*, TokioAsyncResolver};
use std::{net::IpAddr, sync::Arc};
use tokio::sync::OnceCell;

/// Shared resolver; its cache is read-only from the caller's point of view.
static DNS_RESOLVER: OnceCell<Arc<TokioAsyncResolver>> = OnceCell::const_new();

async fn get_resolver() -> Arc<TokioAsyncResolver> {
    DNS_RESOLVER
        .get_or_init(|| async {
            Arc::new(TokioAsyncResolver::tokio(
                ResolverConfig::default(),
                ResolverOpts::default(),
            ))
        })
        .await
        .clone()
}

/// Resolves `host` to at least one address.
///
/// IP literals never hit the resolver.
pub async fn resolve_dns(host: &str) -> Result<Vec<IpAddr>, ProxyError> {
    // url::Url keeps IPv6 literals bracketed
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let lookup = get_resolver()
        .await
        .lookup_ip(bare)
        .await
        .map_err(|e| ProxyError::network(FailureCategory::Dns, format!("DNS lookup failed: {}", e)))?;

    let ips: Vec<IpAddr> = lookup.iter().collect();
    if ips.is_empty() {
        return Err(ProxyError::network(
            FailureCategory::Dns,
            format!("DNS lookup for `{}` returned no addresses", bare),
        ));
    }
    Ok(ips)
}
