use axum::body::Bytes;
use chrono::TimeDelta;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::aggregator::CommitAggregator;
use crate::error::{BannerError, Result};
use crate::freshness::FreshnessGate;
use crate::render::Renderer;

/// Most recently rendered banner plus the machinery to rebuild it.
///
/// Concurrent requests that both observe staleness each regenerate; the last
/// one to finish wins. A failed regeneration leaves the cached bytes alone but
/// the gate has already claimed the window by then.
pub struct BannerCache {
    gate: FreshnessGate,
    aggregator: CommitAggregator,
    renderer: Arc<dyn Renderer>,
    cached_bytes: RwLock<Option<Bytes>>,
}

impl BannerCache {
    pub fn new(aggregator: CommitAggregator, renderer: Arc<dyn Renderer>, window: TimeDelta) -> Self {
        Self {
            gate: FreshnessGate::new(window),
            aggregator,
            renderer,
            cached_bytes: RwLock::new(None),
        }
    }

    pub fn aggregator(&self) -> &CommitAggregator {
        &self.aggregator
    }

    pub fn cached(&self) -> Option<Bytes> {
        self.cached_bytes.read().clone()
    }

    pub async fn get_banner(&self) -> Result<Bytes> {
        let stale = self.gate.is_stale();
        self.serve(stale).await
    }

    #[cfg(test)]
    pub async fn get_banner_at(&self, now: chrono::DateTime<chrono::Utc>) -> Result<Bytes> {
        let stale = self.gate.is_stale_at(now);
        self.serve(stale).await
    }

    async fn serve(&self, stale: bool) -> Result<Bytes> {
        if !stale {
            if let Some(bytes) = self.cached() {
                tracing::debug!(
                    "Serving cached banner ({} bytes, window claimed at {:?})",
                    bytes.len(),
                    self.gate.last_checked_at()
                );
                return Ok(bytes);
            }
            // nothing to fall back to until one regeneration has succeeded
            tracing::debug!("Banner window is fresh but nothing is cached");
        }

        tracing::info!("Regenerating banner");
        let bytes = self.regenerate().await?;
        *self.cached_bytes.write() = Some(bytes.clone());
        tracing::info!("Banner regenerated ({} bytes)", bytes.len());

        Ok(bytes)
    }

    async fn regenerate(&self) -> Result<Bytes> {
        let found = self.aggregator.find_latest_overall().await?;

        let renderer = Arc::clone(&self.renderer);
        let png = tokio::task::spawn_blocking(move || renderer.render(&found))
            .await
            .map_err(|e| BannerError::Render(format!("render task failed: {}", e)))??;

        Ok(Bytes::from(png))
    }
}
