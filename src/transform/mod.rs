//! Pass-through stream stages.
//!
//! Each stage forwards chunks unmodified and only observes them: the digest
//! stage hashes, the progress stage counts.

pub mod digest;
pub mod progress;

pub use digest::{DigestAlgorithm, DigestEncoding, DigestStream, DigestValidator, ValidateOptions};
pub use progress::{ProgressCallback, ProgressInfo, ProgressStream, ProgressTracker};
