use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub mod serial;

/// A long-running unit of work. Every task is spawned once at startup and
/// runs until it fails or `cancel` fires.
#[async_trait]
pub trait Task {
    fn name(&self) -> &'static str;

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()>;
}
