//! Public facade crate for `sumpipe`.
//!
//! This crate contains no IO or provider-specific logic.
//! It re-exports the backend-agnostic types/traits from `sumpipe-core`.
//!
//! ```
//! use sumpipe::{aggregate, chunk, ChunkOutcome, SummarizeError};
//!
//! let chunks = chunk(&"x".repeat(9), 4);
//! assert_eq!(chunks.len(), 3);
//!
//! let outcomes: Vec<ChunkOutcome> = chunks
//!     .iter()
//!     .map(|c| match c.index {
//!         1 => ChunkOutcome::Failed(SummarizeError::Status { status: 503, body: "busy".into() }),
//!         i => ChunkOutcome::Summary(format!("part {i}")),
//!     })
//!     .collect();
//! let summary = aggregate(&outcomes);
//! assert_eq!(summary.text, "part 0\n\nError 503: busy\n\npart 2");
//! assert_eq!(summary.failed_chunks, 1);
//! ```

pub use sumpipe_core::*;
