//! Infrastructure adapters for the outbound call: DNS resolution, TLS and
//! content decompression.

pub mod decompressor;
pub mod dns;
pub mod tls;

pub use decompressor::{decompress_body, Decompressor, MultiDecompressor};
pub use dns::resolve_dns;
pub use tls::{connect_tls, create_tls_config};
