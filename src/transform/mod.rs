/// Filter transforms
///
/// This module handles:
/// - The filter catalog (names and fixed parameters)
/// - The pixel-transform engine behind a trait
/// - The pipeline that runs a filter and swaps the working image

pub mod catalog;
pub mod engine;
pub mod pipeline;

pub use catalog::Filter;
pub use engine::{ImageEngine, TransformEngine};
pub use pipeline::TransformPipeline;
