use std::sync::Arc;

use async_trait::async_trait;
use tokio::time;

use crate::{plugins::Plugin, prelude::*, state::AppState};

/// Periodically repairs drift between the denormalized affiliate counters
/// and the click/referral tables.
pub struct Reconcile;

#[async_trait]
impl Plugin for Reconcile {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let every = app.config.reconcile_interval;
    if every.is_zero() {
      info!("Counter reconciliation disabled via config (0 interval)");
      return Ok(());
    }

    info!(
      "Counter reconciliation started (interval: {})",
      humantime::format_duration(every)
    );

    let mut interval = time::interval(every);

    // skip the immediate tick
    interval.tick().await;

    loop {
      interval.tick().await;

      match app.sv().counters.reconcile().await {
        Ok(0) => debug!("Affiliate counters consistent"),
        Ok(n) => warn!("Reconciled counters for {n} affiliate(s)"),
        Err(err) => error!("Counter reconciliation failed: {err}"),
      }
    }
  }
}
