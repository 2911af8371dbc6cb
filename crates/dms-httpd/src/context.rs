use std::path::PathBuf;
use std::sync::Arc;

use dms_catalog::CatalogStore;
use dms_content::SoapDispatcher;

/// Everything a connection handler needs, passed explicitly rather than
/// through a global — the one mutable piece (`CatalogStore`'s change
/// counter) already protects itself with atomics.
pub struct ServerContext {
    pub store: Arc<CatalogStore>,
    pub dispatcher: SoapDispatcher,
    pub media_roots: Vec<PathBuf>,
    pub db_dir: PathBuf,
    pub disallow_wide_links: bool,
    pub strict_dlna: bool,
    pub base_url: String,
    pub friendly_name: String,
    pub device_uuid: String,
}
