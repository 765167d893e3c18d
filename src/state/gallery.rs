use bytes::Bytes;

use super::data::{GalleryEntry, ImageRecord};
use crate::blob::BlobRegistry;

/// The gallery as currently shown: one display reference per record.
///
/// The listing owns those references. Replacing the records or dropping
/// the listing releases every one of them.
pub struct GalleryListing {
    registry: BlobRegistry,
    entries: Vec<GalleryEntry>,
}

impl GalleryListing {
    pub fn new(registry: BlobRegistry) -> Self {
        Self {
            registry,
            entries: Vec::new(),
        }
    }

    /// Swap in a fresh query result
    pub fn replace(&mut self, records: Vec<ImageRecord>) {
        self.clear();
        self.entries = records
            .into_iter()
            .map(|record| GalleryEntry {
                display: self.registry.wrap(record.image_blob.clone()),
                record,
            })
            .collect();
    }

    pub fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            self.registry.release(&entry.display);
        }
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn get(&self, id: i64) -> Option<&GalleryEntry> {
        self.entries.iter().find(|entry| entry.record.id == id)
    }

    /// Bytes behind an entry's display reference
    pub fn display_bytes(&self, entry: &GalleryEntry) -> Option<Bytes> {
        self.registry.fetch(&entry.display).ok()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for GalleryListing {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for GalleryListing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalleryListing")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: i64, blob: &'static [u8]) -> ImageRecord {
        ImageRecord {
            id,
            name: format!("image {}", id),
            date: Utc::now(),
            image_blob: Bytes::from_static(blob),
        }
    }

    #[test]
    fn test_replace_releases_previous_references() {
        let registry = BlobRegistry::new();
        let mut listing = GalleryListing::new(registry.clone());

        listing.replace(vec![record(1, b"a"), record(2, b"b")]);
        let old = listing.get(1).unwrap().display.clone();
        assert_eq!(registry.live_count(), 2);

        listing.replace(vec![record(3, b"c")]);
        assert_eq!(registry.live_count(), 1);
        assert!(!registry.is_live(&old));
        assert!(listing.get(1).is_none());
        assert_eq!(listing.len(), 1);
    }

    #[test]
    fn test_entries_render_their_own_bytes() {
        let registry = BlobRegistry::new();
        let mut listing = GalleryListing::new(registry);
        listing.replace(vec![record(7, b"seven")]);

        let entry = listing.get(7).unwrap();
        assert_eq!(listing.display_bytes(entry).unwrap(), Bytes::from_static(b"seven"));
    }

    #[test]
    fn test_drop_releases_everything() {
        let registry = BlobRegistry::new();
        {
            let mut listing = GalleryListing::new(registry.clone());
            listing.replace(vec![record(1, b"a"), record(2, b"b")]);
        }
        assert_eq!(registry.live_count(), 0);
    }
}
