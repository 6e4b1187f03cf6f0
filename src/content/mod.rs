//! Content addressing: streaming SHA-256 digests.

pub mod hash;
pub mod hasher;

pub use hash::HashInfo;
pub use hasher::{ContentHasher, HashTask, ProgressObserver};
