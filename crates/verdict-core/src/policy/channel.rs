//! Request/reply messaging channel abstraction

use crate::common::errors::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// A publish/subscribe transport that supports a correlated single reply.
///
/// Implementations do not enforce a deadline themselves; the caller wraps
/// `request` in its own timeout and drops the future when it expires, so a
/// late reply must be safe to discard.
#[async_trait]
pub trait RequestChannel: Send + Sync {
    /// Publish `payload` on `subject` and wait for one reply payload
    async fn request(&self, subject: &str, payload: Bytes) -> Result<Bytes>;

    /// Release the underlying connection
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Short name used in logs
    fn name(&self) -> &str;
}
