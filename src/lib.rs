//! Segmented video capture, clip composition and content-addressed upload.

pub mod capture;
pub mod config;
pub mod config_builder;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod logger;
pub mod media;
pub mod pipeline;
pub mod publisher;
pub mod state_machine;
pub mod upload;

pub use capture::{CaptureController, Clip, ClipStore};
pub use config::ClipcastConfig;
pub use coordinator::{PublishCoordinator, PublishOutcome};
pub use error::{ClipcastError, ClipcastResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` overrides the default filter. Safe to call more than once; only
/// the first call has an effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clipcast_lib=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
