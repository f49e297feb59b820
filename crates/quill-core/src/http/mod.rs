//! HTTP stack: transport, bearer token attachment, and single-flight refresh.

pub mod attach;
pub mod client;
pub mod refresh;
pub mod request;
pub mod transport;

pub use attach::{AttachToken, PublicEndpoints};
pub use client::ApiClient;
pub use refresh::{RefreshCoordinator, RefreshSettings};
pub use request::{ApiRequest, ApiResponse};
pub use transport::{ReqwestTransport, Transport};
