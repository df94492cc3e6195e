//! Queue service API
//!
//! - `client`: authenticated REST calls with uniform error handling
//! - `error`: the `RequestError` taxonomy
//! - `transport`: the network seam (`reqwest` in production)

mod client;
mod error;
mod transport;

pub use client::ApiClient;
pub use error::{RequestError, GENERIC_NETWORK_ERROR};
pub use transport::{
    ByteStream, HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError,
};
