pub mod config;
pub mod error;
pub mod infra;
pub mod proxy;
pub mod routes;
pub mod shared;

pub use config::Config;
pub use error::{ErrorKind, ProxyError};
pub use proxy::{execute, execute_request, normalize, RequestSpec, ResponseEnvelope};
pub use routes::{router, AppState};
