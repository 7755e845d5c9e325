use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::unreconciled_callbacks::UnreconciledCallback;

/// Receives callbacks that were acknowledged but not applied. A replaying consumer can
/// be plugged in here; the default implementation only reports them.
#[automock]
#[async_trait]
pub trait UnreconciledCallbackSink {
    async fn record(&self, event: UnreconciledCallback) -> Result<()>;
}
