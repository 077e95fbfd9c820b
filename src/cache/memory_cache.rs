use super::CacheStore;
use crate::error::{Result, ScanError};
use crate::types::GallerySnapshot;
use std::sync::RwLock;

/// Process-local store; contents do not survive a restart.
#[derive(Default)]
pub struct MemoryCache {
    snapshot: RwLock<Option<GallerySnapshot>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: GallerySnapshot) -> Self {
        MemoryCache {
            snapshot: RwLock::new(Some(snapshot)),
        }
    }
}

fn poisoned<T>(_: T) -> ScanError {
    ScanError::Storage("memory cache lock poisoned".to_string())
}

impl CacheStore for MemoryCache {
    fn read_all(&self) -> Result<Option<GallerySnapshot>> {
        let guard = self.snapshot.read().map_err(poisoned)?;
        Ok(guard.clone())
    }

    fn write_all(&self, snapshot: &GallerySnapshot) -> Result<()> {
        let mut guard = self.snapshot.write().map_err(poisoned)?;
        *guard = Some(snapshot.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self.snapshot.write().map_err(poisoned)?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageRecord;
    use chrono::Utc;

    #[test]
    fn write_read_clear() {
        let cache = MemoryCache::new();
        assert_eq!(cache.read_all().unwrap(), None);

        let now = Utc::now();
        let snapshot = GallerySnapshot::new(
            vec![ImageRecord::from_server("a".into(), "AAAA".into(), now)],
            now,
        );
        cache.write_all(&snapshot).unwrap();
        assert_eq!(cache.read_all().unwrap(), Some(snapshot));
        assert_eq!(cache.read("a").unwrap().map(|r| r.id), Some("a".to_string()));
        assert_eq!(cache.read("zzz").unwrap(), None);

        cache.clear().unwrap();
        assert_eq!(cache.read_all().unwrap(), None);
    }
}
