use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{click, referral};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "affiliates")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  #[sea_orm(unique)]
  pub email: String,
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub name: Option<String>,
  #[sea_orm(unique)]
  pub code: String,
  pub verified: bool,
  #[sea_orm(unique)]
  #[serde(skip_serializing)]
  pub verification_token: Option<String>,
  pub token_expires_at: Option<DateTime>,
  pub total_clicks: i64,
  pub total_referrals: i64,
  #[sea_orm(column_type = "Double")]
  pub conversion_rate: f64,
  pub created_at: DateTime,
  pub verified_at: Option<DateTime>,
}

impl Model {
  /// Public label: the configured name or one derived from the code.
  pub fn display_name(&self) -> String {
    match &self.name {
      Some(name) if !name.trim().is_empty() => name.clone(),
      _ => {
        let prefix: String = self.code.chars().take(6).collect();
        format!("Affiliate {prefix}")
      }
    }
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "click::Entity")]
  Clicks,
  #[sea_orm(has_many = "referral::Entity")]
  Referrals,
}

impl Related<click::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Clicks.def()
  }
}

impl Related<referral::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Referrals.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
