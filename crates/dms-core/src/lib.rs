pub mod error;
pub mod filter;
pub mod ids;
pub mod models;

pub use error::CoreError;
pub use filter::FilterMask;
pub use models::*;
