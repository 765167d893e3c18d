/// The editor's staging session
///
/// Owns the single working image and routes every user action to the
/// gallery store or the transform pipeline. Operations that touch the
/// working image take the slot with `try_lock`: a second action while one
/// is still in flight fails with `SessionError::Busy` instead of being
/// queued behind it.

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use super::data::{ImageRecord, ListOrder, WorkingImage};
use super::library::Library;
use crate::blob::BlobRegistry;
use crate::error::{SessionError, StoreError};
use crate::transform::{Filter, TransformPipeline};

struct Inner {
    library: Library,
    registry: BlobRegistry,
    pipeline: TransformPipeline,
    slot: Mutex<Option<WorkingImage>>,
}

/// Cheap to clone; clones drive the same session.
#[derive(Clone)]
pub struct StagingSession {
    inner: Arc<Inner>,
}

impl StagingSession {
    /// The pipeline must share `registry`, since it wraps and releases
    /// the references this session hands out.
    pub fn new(library: Library, registry: BlobRegistry, pipeline: TransformPipeline) -> Self {
        Self {
            inner: Arc::new(Inner {
                library,
                registry,
                pipeline,
                slot: Mutex::new(None),
            }),
        }
    }

    pub fn registry(&self) -> &BlobRegistry {
        &self.inner.registry
    }

    pub fn library(&self) -> &Library {
        &self.inner.library
    }

    fn acquire(&self) -> Result<MutexGuard<'_, Option<WorkingImage>>, SessionError> {
        self.inner.slot.try_lock().map_err(|_| SessionError::Busy)
    }

    /// Wrap `bytes` as the new working image, releasing the one it replaces
    fn replace(&self, slot: &mut Option<WorkingImage>, bytes: Bytes) -> WorkingImage {
        let working = WorkingImage {
            display: self.inner.registry.wrap(bytes.clone()),
            source: bytes,
        };
        if let Some(previous) = slot.replace(working.clone()) {
            self.inner.registry.release(&previous.display);
        }
        working
    }

    /// Run a store operation on the blocking pool
    async fn with_library<T, F>(&self, op: F) -> Result<T, SessionError>
    where
        F: FnOnce(&Library) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let library = self.inner.library.clone();
        Ok(tokio::task::spawn_blocking(move || op(&library)).await??)
    }

    /// Current working image, if any.
    ///
    /// The returned display reference still belongs to the session; do not
    /// release it.
    pub fn current(&self) -> Result<Option<WorkingImage>, SessionError> {
        Ok(self.acquire()?.as_ref().cloned())
    }

    /// Whether an image is loaded. Reports `false` while another
    /// operation holds the slot.
    pub fn has_image(&self) -> bool {
        matches!(self.inner.slot.try_lock(), Ok(slot) if slot.is_some())
    }

    /// Read a file the user picked and make it the working image.
    /// No format check happens here; the engine rejects what it cannot decode.
    pub async fn load_from_upload(&self, path: impl AsRef<Path>) -> Result<WorkingImage, SessionError> {
        let mut slot = self.acquire()?;
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        log::info!("📷 Loaded {} ({} bytes)", path.display(), bytes.len());
        Ok(self.replace(&mut slot, Bytes::from(bytes)))
    }

    pub fn load_from_bytes(&self, bytes: Bytes) -> Result<WorkingImage, SessionError> {
        let mut slot = self.acquire()?;
        Ok(self.replace(&mut slot, bytes))
    }

    /// Copy a gallery record's bytes into the working image
    pub fn load_from_gallery(&self, record: &ImageRecord) -> Result<WorkingImage, SessionError> {
        let mut slot = self.acquire()?;
        log::info!("🖼️  Editing gallery image {} ({:?})", record.id, record.name);
        Ok(self.replace(&mut slot, record.image_blob.clone()))
    }

    pub async fn load_from_gallery_id(&self, id: i64) -> Result<WorkingImage, SessionError> {
        let mut slot = self.acquire()?;
        let record = self.with_library(move |library| library.get(id)).await?;
        log::info!("🖼️  Editing gallery image {} ({:?})", record.id, record.name);
        Ok(self.replace(&mut slot, record.image_blob))
    }

    /// Apply a filter to the working image. On error nothing changes.
    pub async fn run_filter(&self, filter: &Filter) -> Result<WorkingImage, SessionError> {
        let mut slot = self.acquire()?;
        let working = slot.as_mut().ok_or(SessionError::NoWorkingImage)?;

        // A revoked reference here is a lifecycle bug; surface it
        self.inner.registry.fetch(&working.display)?;

        if let Err(e) = self.inner.pipeline.apply(working, filter).await {
            log::error!("❌ {} failed: {}", filter, e);
            return Err(e.into());
        }
        Ok(working.clone())
    }

    pub async fn run_named_filter(&self, name: &str, args: &[f64]) -> Result<WorkingImage, SessionError> {
        let filter = Filter::from_name(name, args)?;
        self.run_filter(&filter).await
    }

    /// Persist a copy of the working image. Returns the new gallery ID.
    pub async fn save_to_gallery(&self, name: Option<String>) -> Result<i64, SessionError> {
        let slot = self.acquire()?;
        let working = slot.as_ref().ok_or(SessionError::NoWorkingImage)?;
        let bytes = self.inner.registry.fetch(&working.display)?;

        self.with_library(move |library| library.save(&bytes, name.as_deref()))
            .await
    }

    /// Write the working image to `dest` byte for byte. Returns the size written.
    pub async fn download_current(&self, dest: impl AsRef<Path>) -> Result<usize, SessionError> {
        let slot = self.acquire()?;
        let working = slot.as_ref().ok_or(SessionError::NoWorkingImage)?;
        let bytes = self.inner.registry.fetch(&working.display)?;

        tokio::fs::write(dest.as_ref(), &bytes).await?;
        log::info!("⬇️  Downloaded {} bytes to {}", bytes.len(), dest.as_ref().display());
        Ok(bytes.len())
    }

    pub async fn list_gallery(&self, order: ListOrder) -> Result<Vec<ImageRecord>, SessionError> {
        self.with_library(move |library| library.list_all(order)).await
    }

    pub async fn gallery_count(&self) -> Result<i64, SessionError> {
        self.with_library(|library| library.count()).await
    }

    /// Delete a gallery image. Unknown IDs are reported as `NotFound`.
    pub async fn delete_from_gallery(&self, id: i64) -> Result<(), SessionError> {
        let removed = self.with_library(move |library| library.delete(id)).await?;
        if !removed {
            return Err(SessionError::NotFound(id));
        }
        Ok(())
    }

    /// Write a gallery image to `dest` as stored
    pub async fn export_record(&self, id: i64, dest: impl AsRef<Path>) -> Result<usize, SessionError> {
        let record = self.with_library(move |library| library.get(id)).await?;
        tokio::fs::write(dest.as_ref(), &record.image_blob).await?;
        Ok(record.image_blob.len())
    }

    /// Drop the working image and release its reference
    pub fn close(&self) -> Result<(), SessionError> {
        let mut slot = self.acquire()?;
        if let Some(working) = slot.take() {
            self.inner.registry.release(&working.display);
        }
        Ok(())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(working) = self.slot.get_mut().take() {
            self.registry.release(&working.display);
        }
    }
}

impl std::fmt::Debug for StagingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingSession")
            .field("library", &self.inner.library)
            .field("has_image", &self.has_image())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::engine::tests::gradient_png;
    use crate::transform::pipeline::tests::{MockEngine, Mode};
    use crate::transform::{ImageEngine, TransformEngine};
    use image::GenericImageView;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::TempDir;

    fn session_with(engine: Arc<dyn TransformEngine>) -> (TempDir, StagingSession) {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::open(dir.path().join("gallery.db")).unwrap();
        let registry = BlobRegistry::new();
        let pipeline = TransformPipeline::new(engine, registry.clone());
        (dir, StagingSession::new(library, registry, pipeline))
    }

    fn real_session() -> (TempDir, StagingSession) {
        session_with(Arc::new(ImageEngine))
    }

    #[tokio::test]
    async fn test_resize_save_delete_scenario() {
        let (_dir, session) = real_session();
        session.load_from_bytes(Bytes::from(gradient_png(100, 100))).unwrap();

        let working = session
            .run_named_filter("resize", &[200.0, 200.0])
            .await
            .unwrap();
        let rendered = image::load_from_memory(&working.source).unwrap();
        assert_eq!(rendered.dimensions(), (200, 200));

        let id = session.save_to_gallery(Some("t1".into())).await.unwrap();
        let records = session.list_gallery(ListOrder::Unspecified).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].name, "t1");
        assert!(!records[0].image_blob.is_empty());

        session.delete_from_gallery(id).await.unwrap();
        assert!(session.list_gallery(ListOrder::Unspecified).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_from_upload_replaces_and_releases() {
        let (dir, session) = real_session();
        let path = dir.path().join("upload.png");
        std::fs::write(&path, gradient_png(10, 10)).unwrap();

        let first = session.load_from_upload(&path).await.unwrap();
        let second = session.load_from_upload(&path).await.unwrap();

        assert!(!session.registry().is_live(&first.display));
        assert!(session.registry().is_live(&second.display));
        assert_eq!(session.registry().live_count(), 1);
        assert_eq!(&second.source[..], &std::fs::read(&path).unwrap()[..]);
    }

    #[tokio::test]
    async fn test_missing_upload_is_io_error() {
        let (dir, session) = real_session();
        let result = session.load_from_upload(dir.path().join("nope.png")).await;
        assert!(matches!(result, Err(SessionError::Io(_))));
        assert!(!session.has_image());
    }

    #[tokio::test]
    async fn test_filter_without_image_is_rejected() {
        let engine = MockEngine::new(Mode::Passthrough);
        let (_dir, session) = session_with(engine.clone());

        let result = session.run_filter(&Filter::Grayscale).await;

        assert!(matches!(result, Err(SessionError::NoWorkingImage)));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transform_error_keeps_state() {
        let (_dir, session) = session_with(MockEngine::new(Mode::Fail));
        session.load_from_bytes(Bytes::from(gradient_png(12, 12))).unwrap();
        let before = session.current().unwrap().unwrap();

        let result = session.run_filter(&Filter::Blur { sigma: 5.0 }).await;

        assert!(matches!(result, Err(SessionError::Transform(_))));
        let after = session.current().unwrap().unwrap();
        assert_eq!(after, before);
        assert_eq!(session.registry().fetch(&after.display).unwrap(), before.source);
    }

    #[tokio::test]
    async fn test_grayscale_twice_is_pixel_identical() {
        let (_dir, session) = real_session();
        session.load_from_bytes(Bytes::from(gradient_png(20, 20))).unwrap();

        let once = session.run_filter(&Filter::Grayscale).await.unwrap();
        let twice = session.run_filter(&Filter::Grayscale).await.unwrap();

        let a = image::load_from_memory(&once.source).unwrap().to_luma8();
        let b = image::load_from_memory(&twice.source).unwrap().to_luma8();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[tokio::test]
    async fn test_saved_record_is_a_copy() {
        let (_dir, session) = real_session();
        let original = gradient_png(30, 30);
        session.load_from_bytes(Bytes::from(original.clone())).unwrap();

        let id = session.save_to_gallery(None).await.unwrap();
        let working_after_save = session.current().unwrap().unwrap();
        assert_eq!(&working_after_save.source[..], &original[..]);

        session.run_filter(&Filter::Grayscale).await.unwrap();

        let stored = session.library().get(id).unwrap();
        assert_eq!(&stored.image_blob[..], &original[..]);
        assert!(stored.name.starts_with("Image_"));
    }

    #[tokio::test]
    async fn test_load_from_gallery_round_trip() {
        let (_dir, session) = real_session();
        let bytes = gradient_png(6, 6);
        let id = session.library().save(&bytes, Some("kept")).unwrap();

        let working = session.load_from_gallery_id(id).await.unwrap();
        assert_eq!(&working.source[..], &bytes[..]);

        let record = session.library().get(id).unwrap();
        let reloaded = session.load_from_gallery(&record).unwrap();
        assert!(!session.registry().is_live(&working.display));
        assert_eq!(reloaded.source, record.image_blob);

        assert!(matches!(
            session.load_from_gallery_id(id + 100).await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_not_found() {
        let (_dir, session) = real_session();
        assert!(matches!(
            session.delete_from_gallery(99).await,
            Err(SessionError::NotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_download_and_export_write_bytes_as_is() {
        let (dir, session) = real_session();
        let bytes = gradient_png(9, 9);
        session.load_from_bytes(Bytes::from(bytes.clone())).unwrap();
        let id = session.save_to_gallery(Some("out".into())).await.unwrap();

        let current = dir.path().join("current.png");
        let exported = dir.path().join("exported.png");
        assert_eq!(session.download_current(&current).await.unwrap(), bytes.len());
        assert_eq!(session.export_record(id, &exported).await.unwrap(), bytes.len());

        assert_eq!(std::fs::read(&current).unwrap(), bytes);
        assert_eq!(std::fs::read(&exported).unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_overlapping_operations_are_rejected() {
        let engine = MockEngine::new(Mode::Slow(Duration::from_millis(300)));
        let (_dir, session) = session_with(engine);
        session.load_from_bytes(Bytes::from(gradient_png(4, 4))).unwrap();

        let background = session.clone();
        let in_flight = tokio::spawn(async move { background.run_filter(&Filter::Grayscale).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(
            session.save_to_gallery(Some("racing".into())).await,
            Err(SessionError::Busy)
        ));
        assert!(matches!(
            session.run_filter(&Filter::Grayscale).await,
            Err(SessionError::Busy)
        ));

        in_flight.await.unwrap().unwrap();
        assert!(session.save_to_gallery(Some("after".into())).await.is_ok());
    }

    #[tokio::test]
    async fn test_close_releases_working_reference() {
        let (_dir, session) = real_session();
        session.load_from_bytes(Bytes::from(gradient_png(4, 4))).unwrap();

        session.close().unwrap();

        assert_eq!(session.registry().live_count(), 0);
        assert!(session.current().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dropping_session_releases_reference() {
        let (_dir, session) = real_session();
        let registry = session.registry().clone();
        session.load_from_bytes(Bytes::from(gradient_png(4, 4))).unwrap();

        drop(session);

        assert_eq!(registry.live_count(), 0);
    }
}
