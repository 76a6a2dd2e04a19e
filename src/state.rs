use std::env;

use anyhow::Context;

use crate::{prelude::*, sv};

#[derive(Debug, Clone)]
pub struct Config {
  pub port: u16,
  pub public_url: String,
  pub session_ttl: Duration,
  pub verification_ttl: Duration,
  /// Zero disables counter reconciliation.
  pub reconcile_interval: Duration,
  pub bcrypt_cost: u32,
  pub mail: Option<sv::MailConfig>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      port: 3000,
      public_url: "http://localhost:3000".into(),
      session_ttl: Duration::from_secs(7 * 24 * 3600),
      verification_ttl: Duration::from_secs(24 * 3600),
      reconcile_interval: Duration::from_secs(3600),
      bcrypt_cost: bcrypt::DEFAULT_COST,
      mail: None,
    }
  }
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    let default = Self::default();

    let duration = |key: &str, fallback: Duration| -> anyhow::Result<Duration> {
      match env::var(key) {
        Ok(raw) => humantime::parse_duration(raw.trim())
          .with_context(|| format!("Invalid duration in {key}: {raw}")),
        Err(_) => Ok(fallback),
      }
    };

    let mail = match (env::var("MAIL_API_URL"), env::var("MAIL_API_KEY")) {
      (Ok(api_url), Ok(api_key)) => Some(sv::MailConfig {
        api_url,
        api_key,
        from: env::var("MAIL_FROM")
          .unwrap_or_else(|_| "affiliates@localhost".into()),
      }),
      _ => None,
    };

    Ok(Self {
      port: env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(default.port),
      public_url: env::var("PUBLIC_URL")
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or(default.public_url),
      session_ttl: duration("SESSION_TTL", default.session_ttl)?,
      verification_ttl: duration("VERIFICATION_TTL", default.verification_ttl)?,
      reconcile_interval: duration(
        "RECONCILE_INTERVAL",
        default.reconcile_interval,
      )?,
      bcrypt_cost: match env::var("BCRYPT_COST") {
        Ok(raw) => raw.parse().context("Invalid BCRYPT_COST")?,
        Err(_) => default.bcrypt_cost,
      },
      mail,
    })
  }
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub config: Config,
  pub session: sv::Session,
  pub mailer: sv::Mailer,
  /// Shared secret for session signing and conversion webhooks.
  pub secret: String,
}

impl AppState {
  pub async fn new(
    db_url: &str,
    secret: String,
    config: Config,
  ) -> anyhow::Result<Self> {
    let db = Database::connect(db_url)
      .await
      .with_context(|| format!("Failed to connect to {db_url}"))?;

    migration::Migrator::up(&db, None)
      .await
      .context("Failed to apply migrations")?;

    Ok(Self::with_db(db, secret, config))
  }

  pub fn with_db(
    db: DatabaseConnection,
    secret: String,
    config: Config,
  ) -> Self {
    let session = sv::Session::new(&secret, config.session_ttl);
    let mailer = sv::Mailer::new(config.mail.clone(), &config.public_url);
    Self { db, config, session, mailer, secret }
  }

  pub fn sv(&self) -> Services<'_> {
    Services {
      affiliate: sv::Affiliate::new(&self.db, &self.config),
      click: sv::Click::new(&self.db),
      referral: sv::Referral::new(&self.db),
      counters: sv::Counters::new(&self.db),
      leaderboard: sv::Leaderboard::new(&self.db),
    }
  }
}

pub struct Services<'a> {
  pub affiliate: sv::Affiliate<'a>,
  pub click: sv::Click<'a>,
  pub referral: sv::Referral<'a>,
  pub counters: sv::Counters<'a>,
  pub leaderboard: sv::Leaderboard<'a>,
}
