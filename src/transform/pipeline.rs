/// Invoke-and-swap: run one filter over the working image
///
/// The pipeline does not care what the filters do. It guards the input,
/// makes sure the engine was initialized once, bounds the call with a
/// timeout, checks the output looks like an image, and only then swaps
/// the result into the working image.

use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

use super::catalog::Filter;
use super::engine::TransformEngine;
use crate::blob::BlobRegistry;
use crate::error::TransformError;
use crate::state::data::WorkingImage;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TransformPipeline {
    engine: Arc<dyn TransformEngine>,
    registry: BlobRegistry,
    timeout: Duration,
    ready: OnceCell<()>,
}

impl TransformPipeline {
    pub fn new(engine: Arc<dyn TransformEngine>, registry: BlobRegistry) -> Self {
        Self {
            engine,
            registry,
            timeout: DEFAULT_TIMEOUT,
            ready: OnceCell::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `filter` over `current` and return the new bytes.
    ///
    /// Empty input is rejected before the engine is touched.
    pub async fn transform(&self, current: Bytes, filter: &Filter) -> Result<Bytes, TransformError> {
        if current.is_empty() {
            return Err(TransformError::EmptyInput);
        }
        self.ensure_ready().await?;

        let engine = self.engine.clone();
        let task_filter = *filter;
        let started = Instant::now();
        let call = tokio::task::spawn_blocking(move || engine.apply(&current, &task_filter));

        // On timeout the blocking call keeps running; its result is dropped.
        let output = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => {
                log::warn!("{} timed out after {:?}", filter, self.timeout);
                return Err(TransformError::Timeout {
                    filter: filter.name().to_string(),
                    timeout: self.timeout,
                });
            }
            Ok(Err(join)) => {
                return Err(TransformError::Failed {
                    filter: filter.name().to_string(),
                    reason: format!("engine task aborted: {}", join),
                })
            }
            Ok(Ok(result)) => result?,
        };

        if output.is_empty() || image::guess_format(&output).is_err() {
            return Err(TransformError::Malformed {
                filter: filter.name().to_string(),
            });
        }

        log::info!(
            "⚡ {} produced {} bytes in {:.0?}",
            filter,
            output.len(),
            started.elapsed()
        );
        Ok(Bytes::from(output))
    }

    /// Transform the working image in place.
    ///
    /// On success the result becomes both the new source and a freshly
    /// wrapped display reference, and the old reference is released. On
    /// failure `working` is left exactly as it was.
    pub async fn apply(&self, working: &mut WorkingImage, filter: &Filter) -> Result<(), TransformError> {
        let output = self.transform(working.source.clone(), filter).await?;

        let display = self.registry.wrap(output.clone());
        self.registry.release(&working.display);
        *working = WorkingImage {
            source: output,
            display,
        };
        Ok(())
    }

    async fn ensure_ready(&self) -> Result<(), TransformError> {
        self.ready
            .get_or_try_init(|| async {
                let engine = self.engine.clone();
                match tokio::task::spawn_blocking(move || engine.init()).await {
                    Ok(result) => result,
                    Err(join) => Err(TransformError::Init(join.to_string())),
                }
            })
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("timeout", &self.timeout)
            .field("ready", &self.ready.initialized())
            .finish_non_exhaustive()
    }
}
