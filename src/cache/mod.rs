mod memory_cache;

pub use memory_cache::MemoryCache;

use crate::error::Result;
use crate::types::{GallerySnapshot, ImageRecord};

/// Key of the single persisted row holding the latest gallery snapshot.
pub const GALLERY_SNAPSHOT_KEY: &str = "gallery_snapshot";

/// Durable home of the gallery snapshot.
///
/// `write_all` is the only mutator besides `clear`, and always replaces the
/// whole set; readers see either the previous set or the new one.
pub trait CacheStore: Send + Sync {
    /// Look up one record of the persisted snapshot by id.
    fn read(&self, id: &str) -> Result<Option<ImageRecord>> {
        Ok(self
            .read_all()?
            .and_then(|snapshot| snapshot.records.iter().find(|r| r.id == id).cloned()))
    }

    fn read_all(&self) -> Result<Option<GallerySnapshot>>;

    fn write_all(&self, snapshot: &GallerySnapshot) -> Result<()>;

    fn clear(&self) -> Result<()>;
}
