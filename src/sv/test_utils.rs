//! Shared test utilities for database setup

use sea_orm::{
  ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database,
  DatabaseConnection, DbBackend, EntityTrait, NotSet, QueryFilter, Schema, Set,
  sea_query::Expr,
};

use crate::{
  entity::*,
  prelude::{MigratorTrait, Utc},
  state::Config,
  utils,
};

pub mod test_db {
  use super::*;

  /// Creates an in-memory SQLite database with all required tables.
  /// The pool is pinned to one connection so every query sees the same
  /// database.
  pub async fn setup() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    let schema = Schema::new(DbBackend::Sqlite);

    let stmt = schema.create_table_from_entity(affiliate::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(click::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(referral::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    db
  }

  /// A migrated SQLite file with a real connection pool, for tests that
  /// need transactions to contend. Keep the directory alive as long as the
  /// connection.
  pub async fn pooled() -> (tempfile::TempDir, DatabaseConnection) {
    let dir = tempfile::tempdir().unwrap();
    let url =
      format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());

    let mut opt = ConnectOptions::new(url);
    opt.max_connections(8).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();

    (dir, db)
  }
}

/// Production defaults with the cheapest bcrypt cost.
pub fn test_config() -> Config {
  Config { bcrypt_cost: 4, ..Config::default() }
}

/// Insert an affiliate directly, bypassing registration.
/// The email is derived from the code: `AFF123` -> `aff123@example.com`.
pub async fn insert_affiliate(
  db: &DatabaseConnection,
  code: &str,
  verified: bool,
) -> affiliate::Model {
  let now = Utc::now().naive_utc();
  affiliate::ActiveModel {
    id: NotSet,
    email: Set(format!("{}@example.com", code.to_lowercase())),
    password_hash: Set(bcrypt::hash("correct horse", 4).unwrap()),
    name: Set(None),
    code: Set(code.into()),
    verified: Set(verified),
    verification_token: Set((!verified).then(utils::generate_token)),
    token_expires_at: Set(None),
    total_clicks: Set(0),
    total_referrals: Set(0),
    conversion_rate: Set(0.0),
    created_at: Set(now),
    verified_at: Set(verified.then_some(now)),
  }
  .insert(db)
  .await
  .unwrap()
}

/// Overwrite counters without event rows, keeping the rate consistent.
pub async fn set_counters(
  db: &DatabaseConnection,
  id: i32,
  clicks: i64,
  referrals: i64,
) {
  affiliate::Entity::update_many()
    .col_expr(affiliate::Column::TotalClicks, Expr::value(clicks))
    .col_expr(affiliate::Column::TotalReferrals, Expr::value(referrals))
    .col_expr(
      affiliate::Column::ConversionRate,
      Expr::value(utils::conversion_rate(referrals, clicks)),
    )
    .filter(affiliate::Column::Id.eq(id))
    .exec(db)
    .await
    .unwrap();
}
