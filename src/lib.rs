//! Reddit Content Resolution Library
//!
//! Turns text containing a Reddit link into typed content: a text post, a
//! comment, a gallery, or media with its downloadable quality ladder.
//!
//! # Architecture
//!
//! - [`reddit`] - OAuth token lifecycle, rate limiting, link parsing, listing model
//! - [`classify`] - pure classification of posts and comments
//! - [`media`] - result types and DASH manifest parsing
//! - [`hosts`] - network completion of pending media (DASH, Streamable, RedGifs)
//! - [`engine`] - the [`ResolutionEngine`] facade tying it all together
//! - [`error`] - the [`FetchError`] taxonomy
//!
//! # Example
//!
//! ```no_run
//! use reddit_resolver::{EngineConfig, RedditCredentials, ResolutionEngine};
//!
//! # async fn example() -> Result<(), reddit_resolver::FetchError> {
//! let config = EngineConfig::new(RedditCredentials::new("client-id", "client-secret"));
//! let engine = ResolutionEngine::new(config).await?;
//! let result = engine.resolve("https://redd.it/abc123").await?;
//! println!("{result:?}");
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod engine;
pub mod error;
pub mod hosts;
pub mod http_client;
pub mod media;
pub mod reddit;
mod user_agent;
pub mod utils;

// Re-export commonly used types
pub use classify::{ClassifyPolicy, ClassifyStep, ContentClassifier, MediaMeta, PendingMedia};
pub use engine::{EngineConfig, Endpoints, ResolutionEngine};
pub use error::{FetchError, FetchErrorKind};
pub use hosts::{HostRegistry, MediaHost};
pub use http_client::HttpTimeouts;
pub use media::{
    AUDIO_QUALITY_LABEL, AlbumItem, MediaKind, MediaResult, MediaVariant, ResolvedResult,
};
pub use reddit::{PostIdentifier, PostIdentifierResolver, RedditCredentials, TokenAuthority};
