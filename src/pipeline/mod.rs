//! Sequential async stage execution for the publish workflow
//!
//! A [`Pipeline`] runs [`PipelineStage`]s in order over one
//! [`PublishContext`], stopping at the first failure. Lifecycle and progress
//! events go to an [`EventEmitter`](crate::events::EventEmitter).

pub mod context;
pub mod core;
pub mod executor;
pub mod stages;

pub use self::context::{MediaInfo, PublishContext};
pub use self::core::{PipelineResult, PipelineStage, StageResult};
pub use self::executor::{Pipeline, PipelineBuilder};
