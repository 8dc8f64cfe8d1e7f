use async_trait::async_trait;
use tracing::info;

use crate::error::Result;

/// Outbound alert transport. Delivery (SMS or otherwise) is an external
/// collaborator; the worker only needs a send operation, and treats its
/// failures as non-fatal.
#[async_trait]
pub trait AlertDispatch: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<()>;
}

/// Dispatcher that records alerts in the service log. Stands in for a real
/// transport in deployments that have none configured.
pub struct LogAlerter;

#[async_trait]
impl AlertDispatch for LogAlerter {
    async fn send(&self, phone: &str, message: &str) -> Result<()> {
        info!(phone = %phone, "alert: {message}");
        Ok(())
    }
}
