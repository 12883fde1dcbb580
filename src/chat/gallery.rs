//! Per-user library of generated images
//!
//! Newest items come first and the list is capped so a single account
//! cannot grow its storage entry without bound.

use crate::error::Result;
use crate::models::GalleryItem;
use crate::storage::{keys, read_json, write_json, KeyValueStore};
use std::sync::Arc;

/// Default number of images kept per user
pub const DEFAULT_GALLERY_CAPACITY: usize = 50;

/// Capped, persisted image gallery
pub struct Gallery {
    store: Arc<dyn KeyValueStore>,
    capacity: usize,
}

impl Gallery {
    /// Create a gallery over `store` keeping at most `capacity` items per user
    pub fn new(store: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        Self { store, capacity }
    }

    /// All items for `email`, newest first
    pub fn list(&self, email: &str) -> Result<Vec<GalleryItem>> {
        Ok(read_json(self.store.as_ref(), &keys::gallery(email))?.unwrap_or_default())
    }

    /// Look up one item
    pub fn get(&self, email: &str, id: &str) -> Result<Option<GalleryItem>> {
        Ok(self.list(email)?.into_iter().find(|item| item.id == id))
    }

    /// Add `item` at the front, dropping the oldest items beyond capacity
    ///
    /// # Returns
    ///
    /// The updated list
    pub fn save(&self, email: &str, item: GalleryItem) -> Result<Vec<GalleryItem>> {
        let mut items = self.list(email)?;
        items.insert(0, item);
        if items.len() > self.capacity {
            tracing::debug!(
                "Gallery for {} over capacity, dropping {} oldest item(s)",
                email,
                items.len() - self.capacity
            );
            items.truncate(self.capacity);
        }
        write_json(self.store.as_ref(), &keys::gallery(email), &items)?;
        Ok(items)
    }

    /// Remove the item with `id`; unknown ids leave the gallery unchanged
    ///
    /// # Returns
    ///
    /// The remaining items
    pub fn delete(&self, email: &str, id: &str) -> Result<Vec<GalleryItem>> {
        let mut items = self.list(email)?;
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() != before {
            write_json(self.store.as_ref(), &keys::gallery(email), &items)?;
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::new_id;
    use crate::storage::MemoryStore;
    use chrono::Utc;

    fn item(prompt: &str) -> GalleryItem {
        GalleryItem {
            id: new_id("img"),
            data: "data:image/png;base64,AAAA".to_string(),
            mime_type: "image/png".to_string(),
            prompt: prompt.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_save_prepends_newest() {
        let gallery = Gallery::new(Arc::new(MemoryStore::new()), DEFAULT_GALLERY_CAPACITY);
        gallery.save("a@b.co", item("first")).unwrap();
        let items = gallery.save("a@b.co", item("second")).unwrap();
        assert_eq!(items[0].prompt, "second");
        assert_eq!(items[1].prompt, "first");
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let gallery = Gallery::new(Arc::new(MemoryStore::new()), 3);
        for n in 0..5 {
            gallery.save("a@b.co", item(&format!("p{}", n))).unwrap();
        }
        let items = gallery.list("a@b.co").unwrap();
        let prompts: Vec<&str> = items.iter().map(|i| i.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["p4", "p3", "p2"]);
    }

    #[test]
    fn test_delete_removes_only_matching_item() {
        let gallery = Gallery::new(Arc::new(MemoryStore::new()), DEFAULT_GALLERY_CAPACITY);
        let keep = item("keep");
        let drop = item("drop");
        gallery.save("a@b.co", keep.clone()).unwrap();
        gallery.save("a@b.co", drop.clone()).unwrap();

        let remaining = gallery.delete("a@b.co", &drop.id).unwrap();
        assert_eq!(remaining, vec![keep.clone()]);
        assert_eq!(gallery.delete("a@b.co", "missing").unwrap(), vec![keep]);
    }

    #[test]
    fn test_galleries_are_per_user() {
        let gallery = Gallery::new(Arc::new(MemoryStore::new()), DEFAULT_GALLERY_CAPACITY);
        gallery.save("a@b.co", item("mine")).unwrap();
        assert!(gallery.list("other@b.co").unwrap().is_empty());
    }
}
