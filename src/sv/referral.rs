use crate::{
  entity::{affiliate, referral},
  prelude::*,
  sv::counters::{self, Counter},
};

pub const DEFAULT_CONVERSION: &str = "signup";

#[derive(Debug, Clone, Default)]
pub struct Conversion {
  pub conversion_type: Option<String>,
  pub metadata: Option<json::Value>,
}

pub struct Referral<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Referral<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Attribute a completed signup or purchase to the affiliate owning `code`.
  /// The referral row, the counter increment and the rate recompute share
  /// one transaction.
  pub async fn record(
    &self,
    code: &str,
    conversion: Conversion,
  ) -> Result<affiliate::Model> {
    let txn = self.db.begin().await?;

    let affiliate = affiliate::Entity::find()
      .filter(affiliate::Column::Code.eq(code))
      .one(&txn)
      .await?
      .ok_or(Error::CodeNotFound)?;

    let conversion_type = conversion
      .conversion_type
      .map(|t| t.trim().to_lowercase())
      .filter(|t| !t.is_empty())
      .unwrap_or_else(|| DEFAULT_CONVERSION.into());

    referral::ActiveModel {
      id: NotSet,
      affiliate_id: Set(affiliate.id),
      conversion_type: Set(conversion_type),
      metadata: Set(conversion.metadata),
      created_at: Set(Utc::now().naive_utc()),
    }
    .insert(&txn)
    .await?;

    let affiliate =
      counters::bump(&txn, affiliate.id, Counter::Referrals).await?;

    txn.commit().await?;

    info!(
      "Referral recorded for {}: {} referrals, {:.2}% conversion",
      affiliate.code, affiliate.total_referrals, affiliate.conversion_rate
    );
    Ok(affiliate)
  }

  pub async fn recent(
    &self,
    affiliate_id: i32,
    limit: u64,
  ) -> Result<Vec<referral::Model>> {
    Ok(
      referral::Entity::find()
        .filter(referral::Column::AffiliateId.eq(affiliate_id))
        .order_by_desc(referral::Column::CreatedAt)
        .order_by_desc(referral::Column::Id)
        .limit(limit)
        .all(self.db)
        .await?,
    )
  }

  pub async fn count(&self) -> Result<u64> {
    Ok(referral::Entity::find().count(self.db).await?)
  }
}
