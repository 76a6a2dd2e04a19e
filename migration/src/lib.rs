pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_affiliates;
mod m20260301_000002_create_affiliate_clicks;
mod m20260301_000003_create_referrals;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20260301_000001_create_affiliates::Migration),
      Box::new(m20260301_000002_create_affiliate_clicks::Migration),
      Box::new(m20260301_000003_create_referrals::Migration),
    ]
  }
}
