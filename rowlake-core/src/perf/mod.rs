//! Performance layer: access patterns for data too large to handle naively.
//!
//! None of these utilities own data. They decide what to render, fetch,
//! sample or process next.

pub mod memory;
pub mod paged;
pub mod sampling;
pub mod stream;
pub mod window;

pub use memory::{MemoryMonitor, MemoryProbe, NoProbe, ProcStatusProbe};
pub use paged::{PagedLoader, dataset_pages};
pub use sampling::{SampleMethod, percent_sample, random_sample, stratified_sample, systematic_sample};
pub use stream::{ChunkFailure, ChunkInfo, Progress, StreamHooks, StreamProcessor};
pub use window::{VirtualWindow, VisibleRange};
