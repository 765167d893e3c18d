//! # Filter Studio
//!
//! A small native image editor: load an image, run filters over it, keep
//! the results in a local gallery, and reopen them later.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`blob`] | Revocable display references over in-memory image buffers |
//! | [`state`] | Gallery database, staging session, gallery listing |
//! | [`transform`] | Filter catalog, transform engine, invoke-and-swap pipeline |
//! | [`config`] | Optional `config.toml` loading and validation |
//! | [`error`] | Error enums for every layer |
//!
//! The window itself lives in `main.rs` and only talks to
//! [`state::session::StagingSession`] and [`state::gallery::GalleryListing`].

pub mod blob;
pub mod config;
pub mod error;
pub mod state;
pub mod transform;
