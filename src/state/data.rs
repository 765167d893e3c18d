/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the gallery database, the staging session and the UI layer.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::blob::BlobUrl;

/// A named image persisted in the gallery
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Unique database ID, never reused
    pub id: i64,
    /// Display name (not unique)
    pub name: String,
    /// Creation time, set once on insert
    pub date: DateTime<Utc>,
    /// Encoded image bytes (e.g. PNG)
    pub image_blob: Bytes,
}

impl ImageRecord {
    /// Creation time in the stored ISO-8601 form
    pub fn date_string(&self) -> String {
        format_timestamp(&self.date)
    }

    /// File name suggested when downloading this record.
    ///
    /// Characters most file systems reject (the `:` in default names, for
    /// one) become `_`, and `.png` is appended since the engine writes PNG.
    pub fn download_name(&self, fallback: &str) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            return fallback.to_string();
        }
        let mut file_name: String = name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c => c,
            })
            .collect();
        if !file_name.to_ascii_lowercase().ends_with(".png") {
            file_name.push_str(".png");
        }
        file_name
    }
}

/// The image currently staged for editing.
///
/// `source` is what the next transform reads; `display` is the reference
/// handed to the UI. Both always describe the same bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingImage {
    pub source: Bytes,
    pub display: BlobUrl,
}

/// A gallery record paired with its own display reference
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub record: ImageRecord,
    pub display: BlobUrl,
}

/// Row order for listing the gallery
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    /// Whatever order the table yields (insertion order in practice)
    Unspecified,
    /// Newest first
    #[default]
    DateDesc,
    DateAsc,
    Name,
}

impl ListOrder {
    pub(crate) fn order_by(self) -> &'static str {
        match self {
            ListOrder::Unspecified => "",
            ListOrder::DateDesc => " ORDER BY date DESC, id DESC",
            ListOrder::DateAsc => " ORDER BY date ASC, id ASC",
            ListOrder::Name => " ORDER BY name ASC, id ASC",
        }
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix
pub fn format_timestamp(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Name given to a saved image when the user does not provide one
pub fn default_image_name(date: &DateTime<Utc>) -> String {
    format!("Image_{}", format_timestamp(date))
}
