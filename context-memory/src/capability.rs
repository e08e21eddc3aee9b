//! External capabilities consumed by the memory subsystem.
//!
//! Both traits exist so tests can inject stubs without a live inference
//! endpoint. Implementations must be `Send + Sync`; the history holds them
//! behind `Arc` so the driving caller can reuse the same backend.

use async_trait::async_trait;

use super::errors::CapabilityError;
use super::turn::Turn;

/// Text generation: produce a reply for `turns` under `system_message`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, turns: &[Turn], system_message: &str)
        -> Result<String, CapabilityError>;
}

/// Text embedding into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError>;
}
