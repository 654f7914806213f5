//! Maintenance commands - sweep retired vectors, rebuild the registry

use crate::error::Result;
use crate::lifecycle::Lifecycle;
use crate::registry::VectorRegistry;
use tracing::info;

/// Hard-delete retired vectors in batches
pub async fn cmd_sweep(lifecycle: &Lifecycle) -> Result<usize> {
    info!("Sweeping retired vectors");
    lifecycle.sweep().await
}

/// Rebuild the vector registry from the index
pub async fn cmd_sync_registry(registry: &VectorRegistry) -> Result<usize> {
    info!("Rebuilding vector registry from the index");
    registry.invalidate_cache().await;
    registry.rebuild().await
}
