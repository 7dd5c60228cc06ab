use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::services::periodic;

/// An uploaded photo held in memory.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub id: Uuid,
    pub bytes: Arc<[u8]>,
    pub content_type: String,
    pub uploaded_at: Instant,
}

/// Process-lifetime store for uploaded photos.
#[derive(Debug, Default)]
pub struct ImageStore {
    images: Mutex<HashMap<Uuid, StoredImage>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, id: Uuid, bytes: impl Into<Arc<[u8]>>, content_type: impl Into<String>) {
        let image = StoredImage {
            id,
            bytes: bytes.into(),
            content_type: content_type.into(),
            uploaded_at: Instant::now(),
        };
        self.images.lock().insert(id, image);
    }

    pub fn get(&self, id: Uuid) -> Option<StoredImage> {
        self.images.lock().get(&id).cloned()
    }

    pub fn delete(&self, id: Uuid) -> bool {
        self.images.lock().remove(&id).is_some()
    }

    /// Drop every image uploaded more than `max_age` ago.
    pub fn clear_older_than(&self, max_age: Duration) -> usize {
        let mut images = self.images.lock();
        let before = images.len();
        images.retain(|_, image| image.uploaded_at.elapsed() <= max_age);
        before - images.len()
    }

    pub fn len(&self) -> usize {
        self.images.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.lock().is_empty()
    }
}

/// Checks per retention window; an image outlives `retention` by at most
/// one check period.
const RETENTION_CHECKS: u32 = 4;

/// Start the periodic image cleanup. Stops when `cancel` fires or the store
/// is dropped.
pub fn spawn_retention(
    store: &Arc<ImageStore>,
    retention: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let weak = Arc::downgrade(store);
    let period = (retention / RETENTION_CHECKS).max(Duration::from_millis(1));
    periodic::spawn("image-retention", period, cancel, move || {
        match weak.upgrade() {
            Some(store) => {
                let cleared = store.clear_older_than(retention);
                if cleared > 0 {
                    tracing::debug!(cleared, "Cleared expired images");
                }
                true
            }
            None => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_get_delete() {
        let store = ImageStore::new();
        let id = Uuid::new_v4();
        store.save(id, vec![1u8, 2, 3], "image/png");

        let image = store.get(id).unwrap();
        assert_eq!(&*image.bytes, &[1, 2, 3]);
        assert_eq!(image.content_type, "image/png");

        assert!(store.delete(id));
        assert!(!store.delete(id));
        assert!(store.get(id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_older_than() {
        let store = ImageStore::new();
        let old = Uuid::new_v4();
        store.save(old, vec![0u8], "image/jpeg");

        tokio::time::advance(Duration::from_secs(120)).await;
        let fresh = Uuid::new_v4();
        store.save(fresh, vec![0u8], "image/jpeg");

        assert_eq!(store.clear_older_than(Duration::from_secs(60)), 1);
        assert!(store.get(old).is_none());
        assert!(store.get(fresh).is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retention_task_clears_soon_after_expiry() {
        let store = Arc::new(ImageStore::new());
        let cancel = CancellationToken::new();
        let handle = spawn_retention(&store, Duration::from_secs(60), cancel.clone());

        let id = Uuid::new_v4();
        store.save(id, vec![0u8], "image/png");

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(store.get(id).is_some());

        // Checked every 15s, so gone by the first check past 60s.
        tokio::time::sleep(Duration::from_secs(17)).await;
        assert!(store.get(id).is_none());

        cancel.cancel();
        tokio_test::assert_ok!(handle.await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retention_task_stops_when_store_dropped() {
        let store = Arc::new(ImageStore::new());
        let handle = spawn_retention(&store, Duration::from_secs(4), CancellationToken::new());
        drop(store);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(handle.is_finished());
    }
}
