//! The HTTP surface: one connection state machine per accepted socket,
//! static descriptor XML, the ranged media-streaming path, and the SSDP
//! collaborator. Everything downstream of "we have bytes on a socket".

pub mod conn;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod request;
pub mod response;
pub mod route;
pub mod ssdp;
pub mod stream;

pub use context::ServerContext;
pub use error::HttpError;
pub use request::Request;
