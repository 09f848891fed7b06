//! Chunked processing that yields to the runtime between chunks.

use crate::error::LakeError;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Progress reported after each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
    pub percent: f64,
}

impl Progress {
    fn new(processed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            processed as f64 * 100.0 / total as f64
        };
        Self {
            processed,
            total,
            percent,
        }
    }
}

/// Position of a chunk within the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub index: usize,
    /// Offset of the chunk's first item in the input.
    pub start: usize,
}

/// A chunk callback failure handed to an error handler.
#[derive(Debug)]
pub struct ChunkFailure {
    pub chunk: ChunkInfo,
    pub error: anyhow::Error,
}

/// Optional callbacks for [`StreamProcessor::process`].
#[derive(Default)]
pub struct StreamHooks<'a> {
    pub on_progress: Option<Box<dyn FnMut(Progress) + Send + 'a>>,
    /// When set, chunk failures are handed here and processing continues.
    pub on_error: Option<Box<dyn FnMut(ChunkFailure) + Send + 'a>>,
}

impl<'a> StreamHooks<'a> {
    pub fn on_progress(mut self, f: impl FnMut(Progress) + Send + 'a) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(ChunkFailure) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

#[derive(Debug, Clone)]
pub struct StreamProcessor {
    chunk_size: usize,
    cancel: Option<CancellationToken>,
}

impl StreamProcessor {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            cancel: None,
        }
    }

    /// Stop between chunks once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Run `f` over `items` one chunk at a time and concatenate what it
    /// returns.
    ///
    /// A failing chunk aborts with [`LakeError::Transform`] unless an error
    /// handler is installed. Cancellation is checked before every chunk and
    /// surfaces as [`LakeError::Cancelled`].
    pub async fn process<T, R, F>(&self, items: &[T], mut f: F, mut hooks: StreamHooks<'_>) -> Result<Vec<R>, LakeError>
    where
        F: FnMut(&[T], ChunkInfo) -> anyhow::Result<Vec<R>>,
    {
        let total = items.len();
        let mut results = Vec::new();
        let mut processed = 0;

        for (index, chunk) in items.chunks(self.chunk_size).enumerate() {
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                tracing::debug!(processed, total, "Stream processing cancelled");
                return Err(LakeError::Cancelled);
            }

            let info = ChunkInfo {
                index,
                start: processed,
            };
            match f(chunk, info) {
                Ok(out) => results.extend(out),
                Err(error) => match hooks.on_error.as_mut() {
                    Some(handler) => handler(ChunkFailure { chunk: info, error }),
                    None => {
                        return Err(LakeError::transform(format!("chunk {index}"), format!("{error:#}")));
                    }
                },
            }

            processed += chunk.len();
            let progress = Progress::new(processed, total);
            tracing::debug!(processed, total, "Processed chunk");
            if let Some(report) = hooks.on_progress.as_mut() {
                report(progress);
            }
            tokio::task::yield_now().await;
        }
        Ok(results)
    }
}
