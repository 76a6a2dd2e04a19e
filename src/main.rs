mod entity;
mod error;
mod plugins;
mod prelude;
mod state;
mod sv;
mod utils;

use std::env;

use anyhow::Context;
use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "affiliate=debug,tower_http=debug,axum=trace,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let db_url = env::var("DATABASE_URL")
    .unwrap_or_else(|_| "sqlite:affiliates.db?mode=rwc".into());
  let secret = env::var("SERVER_SECRET").context("SERVER_SECRET not set")?;
  let config = Config::from_env()?;

  info!("Starting Affiliate Server v{}", env!("CARGO_PKG_VERSION"));

  let app = Arc::new(AppState::new(&db_url, secret, config).await?);

  let mut running = plugins::App::new()
    .register(plugins::server::Plugin)
    .register(plugins::cron::Reconcile)
    .run(app);

  tokio::select! {
    signal = tokio::signal::ctrl_c() => {
      signal.context("Failed to listen for shutdown signal")?;
      info!("Shutting down");
      Ok(())
    }
    err = running.failure() => Err(err),
  }
}
