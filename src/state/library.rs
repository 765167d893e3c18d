use bytes::Bytes;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data::{default_image_name, format_timestamp, ImageRecord, ListOrder};
use crate::error::StoreError;

/// Schema version recorded in `PRAGMA user_version`
pub const SCHEMA_VERSION: i64 = 1;

/// How long a connection waits for another process holding the write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The Library is the gallery database.
///
/// It only remembers where the database lives. Every operation opens its
/// own connection and transaction and drops both before returning, so no
/// connection is ever held between calls.
#[derive(Clone)]
pub struct Library {
    db_path: PathBuf,
}

impl Library {
    /// Open the gallery in the user's data directory:
    /// - Linux: ~/.local/share/filter-studio/gallery.db
    /// - macOS: ~/Library/Application Support/filter-studio/gallery.db
    /// - Windows: %APPDATA%\filter-studio\gallery.db
    pub fn open_default() -> Result<Self, StoreError> {
        let path = Self::default_path().ok_or_else(|| {
            StoreError::StorageUnavailable("could not determine user data directory".into())
        })?;
        Self::open(path)
    }

    /// Open (creating or upgrading the schema if needed) the gallery at `path`.
    /// Opening an already initialized database changes nothing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let db_path = path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::StorageUnavailable(format!(
                        "cannot create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let library = Library { db_path };
        let mut conn = library.connect()?;
        init_schema(&mut conn).map_err(|e| {
            StoreError::StorageUnavailable(format!("schema upgrade failed: {}", e))
        })?;

        log::info!("📁 Gallery opened at {}", library.db_path.display());
        Ok(library)
    }

    /// Platform default location of the gallery database
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
        path.push("filter-studio");
        path.push("gallery.db");
        Some(path)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path).map_err(|e| {
            StoreError::StorageUnavailable(format!("{}: {}", self.db_path.display(), e))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        Ok(conn)
    }

    /// Insert a new image. Returns the new image ID.
    ///
    /// A missing or blank name becomes `Image_<timestamp>`.
    pub fn save(&self, image_blob: &[u8], name: Option<&str>) -> Result<i64, StoreError> {
        if image_blob.is_empty() {
            return Err(StoreError::Write("refusing to store an empty image".into()));
        }

        let now = Utc::now();
        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => default_image_name(&now),
        };

        let mut conn = self.connect()?;
        let write = |e: rusqlite::Error| StoreError::Write(e.to_string());
        let tx = conn.transaction().map_err(write)?;
        tx.execute(
            "INSERT INTO images (name, date, image_blob) VALUES (?1, ?2, ?3)",
            params![name, format_timestamp(&now), image_blob],
        )
        .map_err(write)?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(write)?;

        log::info!("💾 Saved gallery image {} ({:?}, {} bytes)", id, name, image_blob.len());
        Ok(id)
    }

    /// Get every image in the gallery
    pub fn list_all(&self, order: ListOrder) -> Result<Vec<ImageRecord>, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction().map_err(StoreError::Read)?;

        let images = {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT id, name, date, image_blob FROM images{}",
                    order.order_by()
                ))
                .map_err(StoreError::Read)?;

            let image_iter = stmt.query_map([], record_from_row).map_err(StoreError::Read)?;

            let mut images = Vec::new();
            for image in image_iter {
                images.push(image.map_err(StoreError::Read)?);
            }
            images
        };

        tx.commit().map_err(StoreError::Read)?;
        Ok(images)
    }

    /// Get a single image by ID
    pub fn get(&self, id: i64) -> Result<ImageRecord, StoreError> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT id, name, date, image_blob FROM images WHERE id = ?1",
            [id],
            record_from_row,
        )
        .optional()
        .map_err(StoreError::Read)?
        .ok_or(StoreError::NotFound(id))
    }

    /// Delete an image by ID.
    ///
    /// Deleting an unknown ID is not an error here; the return value tells
    /// whether a row was actually removed.
    pub fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut conn = self.connect()?;
        let write = |e: rusqlite::Error| StoreError::Write(e.to_string());
        let tx = conn.transaction().map_err(write)?;
        let removed = tx
            .execute("DELETE FROM images WHERE id = ?1", [id])
            .map_err(write)?;
        tx.commit().map_err(write)?;

        if removed > 0 {
            log::info!("🗑️  Deleted gallery image {}", id);
        }
        Ok(removed > 0)
    }

    /// Get a count of images in the gallery
    pub fn count(&self) -> Result<i64, StoreError> {
        let conn = self.connect()?;
        conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))
            .map_err(StoreError::Read)
    }
}

/// Create the table and its indexes if they don't exist, then record the
/// schema version. A newer installed version is left alone.
fn init_schema(conn: &mut Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    let installed: i64 = tx.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS images (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            date        TEXT NOT NULL,
            image_blob  BLOB NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_images_name ON images(name);
        CREATE INDEX IF NOT EXISTS idx_images_date ON images(date);",
    )?;

    if installed < SCHEMA_VERSION {
        tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        log::info!("✅ Gallery schema upgraded {} -> {}", installed, SCHEMA_VERSION);
    } else if installed > SCHEMA_VERSION {
        log::warn!(
            "Gallery schema version {} is newer than {}; opening without changes",
            installed,
            SCHEMA_VERSION
        );
    }

    tx.commit()
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
    let date: String = row.get(2)?;
    let date = DateTime::parse_from_rfc3339(&date)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let blob: Vec<u8> = row.get(3)?;

    Ok(ImageRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        date,
        image_blob: Bytes::from(blob),
    })
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}
