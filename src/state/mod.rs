/// State management module
///
/// This module handles all application state, including:
/// - The gallery database (library.rs)
/// - Shared data structures (data.rs)
/// - The staging session that owns the working image (session.rs)
/// - The on-screen gallery listing and its display references (gallery.rs)

pub mod library;
pub mod data;
pub mod session;
pub mod gallery;
