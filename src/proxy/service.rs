//! Proxy service abstraction layer.
//!
//! Routes talk to a [`ProxyService`] rather than the executor directly so the
//! HTTP surface can be tested without touching the network.

use super::executor::{execute_request, ExecuteOptions};
use super::types::{HttpMethod, RequestSpec, ResponseEnvelope};
use crate::error::ProxyError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type ProxyFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ResponseEnvelope, ProxyError>> + Send + 'a>>;

/// Something that can turn a [`RequestSpec`] into an envelope.
pub trait ProxyService: Send + Sync {
    /// Normalizes and executes `spec`. Never mutates it.
    fn execute(&self, spec: RequestSpec) -> ProxyFuture<'_>;
}

/// Default service: normalizer plus the hyper-based executor.
#[derive(Debug, Default, Clone)]
pub struct HttpProxyService {
    options: ExecuteOptions,
}

impl HttpProxyService {
    pub fn new(options: ExecuteOptions) -> Self {
        Self { options }
    }

    pub fn arc(options: ExecuteOptions) -> Arc<Self> {
        Arc::new(Self::new(options))
    }

    pub fn options(&self) -> &ExecuteOptions {
        &self.options
    }
}

impl ProxyService for HttpProxyService {
    fn execute(&self, spec: RequestSpec) -> ProxyFuture<'_> {
        Box::pin(async move { execute_request(&spec, &self.options).await })
    }
}

/// Convenience methods available on every [`ProxyService`].
pub trait ProxyServiceExt: ProxyService {
    fn get(&self, url: &str) -> ProxyFuture<'_> {
        self.execute(RequestSpec {
            method: HttpMethod::Get,
            url: url.to_string(),
            ..Default::default()
        })
    }

    /// POSTs `body` as JSON.
    fn post_json(&self, url: &str, body: &str) -> ProxyFuture<'_> {
        self.execute(RequestSpec {
            method: HttpMethod::Post,
            url: url.to_string(),
            body: body.to_string(),
            ..Default::default()
        })
    }
}

impl<T: ProxyService + ?Sized> ProxyServiceExt for T {}
