//! Everything downstream of "we have an Object/Detail pair": DIDL-Lite
//! rendering, the SOAP action dispatcher, and the sort/search translators
//! that turn UPnP's query languages into catalog operations.

pub mod didl;
pub mod search;
pub mod soap;
pub mod sort;

pub use didl::XmlBuf;
pub use dms_core::FilterMask;
pub use soap::{SoapDispatcher, SoapFault};
