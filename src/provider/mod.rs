//! Generation provider seam.
//!
//! The gateway talks to the provider exclusively through [`Provider`], so
//! the orchestration (cache, admission, retry, accounting) is testable
//! without a network and the gateway stays provider-agnostic. [`HttpProvider`]
//! is the concrete client for OpenAI-style chat-completion APIs.

mod http;

pub use http::HttpProvider;

use crate::types::{GenerationRequest, GenerationResponse};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Performs one provider round trip: sends the request for `model`,
    /// parses the result, and maps provider-specific error shapes into the
    /// domain taxonomy before they reach the retry predicate.
    async fn generate(&self, request: &GenerationRequest, model: &str)
        -> Result<GenerationResponse>;

    fn name(&self) -> &'static str;
}
