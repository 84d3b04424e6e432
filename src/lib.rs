//! # ai-gateway
//!
//! Resilient gateway for outbound generative-AI requests. Every call to the
//! generation provider goes through one [`Gateway`] instance, which composes:
//!
//! - a two-tier response cache (fast local tier, optional shared remote
//!   tier) with normalized keys and graceful degradation,
//! - sliding-window admission control,
//! - retryable-failure classification with exponential backoff,
//! - live usage and cost accounting, sliceable by model, account, and day.
//!
//! The surrounding application owns persistence, prompt construction, and
//! end-user authentication; this crate owns only the provider-facing
//! request path.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use ai_gateway::{Gateway, GatewayConfig, GenerationRequest};
//!
//! #[tokio::main]
//! async fn main() -> ai_gateway::Result<()> {
//!     let gateway = Gateway::builder(GatewayConfig::new("sk-...")).build()?;
//!
//!     let response = gateway
//!         .generate(GenerationRequest::new("Write a haiku about caches").with_model("gpt-4o-mini"))
//!         .await?;
//!     println!("{} (cached: {})", response.content, response.metadata.from_cache);
//!     Ok(())
//! }
//! ```
//!
//! ## Module organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`gateway`] | Orchestrator and builder |
//! | [`cache`] | Key normalization and the two-tier response cache |
//! | [`resilience`] | Sliding-window rate limiting and retry with backoff |
//! | [`usage`] | Usage accounting and the per-model rate table |
//! | [`provider`] | Provider trait and the HTTP client |
//! | [`config`] | Construction-time configuration |

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod provider;
pub mod resilience;
pub mod types;
pub mod usage;

pub use config::GatewayConfig;
pub use error::{Error, ProviderErrorKind};
pub use gateway::{Gateway, GatewayBuilder, GatewayStatus};
pub use types::{GenerationRequest, GenerationResponse, TokenUsage};
pub use usage::{StatsFilter, UsageStatistics};

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
