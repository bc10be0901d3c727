//! Outbound notification abstraction

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one pre-formatted HTML message.
    async fn send(&self, message: &str) -> Result<()>;
}
