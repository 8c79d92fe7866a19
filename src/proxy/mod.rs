pub mod auth;
pub mod executor;
pub mod normalizer;
pub mod response_builder;
pub mod service;
pub mod types;

pub use auth::apply_auth;
pub use executor::{execute, execute_request, ExecuteOptions};
pub use normalizer::normalize;
pub use response_builder::{build_response, decode_body, ResponseBuildParams};
pub use service::{HttpProxyService, ProxyFuture, ProxyService, ProxyServiceExt};
pub use types::*;
