//! Stages of the publish workflow, in run order:
//! 1. ComposeStage - merge clips into one asset
//! 2. AnalyzeStage - size, dimensions, duration
//! 3. ThumbnailStage - preview frame and placeholder (optional)
//! 4. HashStage - SHA-256 of the asset
//! 5. AuthorizeStage - content-bound upload token
//! 6. UploadStage - streaming upload and server hash check
//! 7. PublishStage - announce the media
//! 8. CleanupStage - remove temporary files

pub mod analyze;
pub mod authorize;
pub mod cleanup;
pub mod compose;
pub mod hash;
pub mod publish;
pub mod thumbnail;
pub mod upload;

pub use analyze::AnalyzeStage;
pub use authorize::AuthorizeStage;
pub use cleanup::{discard_temp_files, CleanupStage};
pub use compose::ComposeStage;
pub use hash::HashStage;
pub use publish::PublishStage;
pub use thumbnail::ThumbnailStage;
pub use upload::UploadStage;
