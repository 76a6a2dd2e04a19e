use crate::{
  entity::{affiliate, click},
  prelude::*,
  sv::counters::{self, Counter},
};

pub const UNKNOWN_IP: &str = "unknown";

/// Request details captured alongside a click.
#[derive(Debug, Clone)]
pub struct Visit {
  pub ip_address: String,
  pub user_agent: Option<String>,
  pub referer: Option<String>,
}

impl Default for Visit {
  fn default() -> Self {
    Self { ip_address: UNKNOWN_IP.into(), user_agent: None, referer: None }
  }
}

pub struct Click<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Click<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Append a click for `code` and bump the affiliate's click counter.
  /// Both writes commit together or not at all.
  pub async fn track(
    &self,
    code: &str,
    visit: Visit,
  ) -> Result<affiliate::Model> {
    let txn = self.db.begin().await?;

    let affiliate = affiliate::Entity::find()
      .filter(affiliate::Column::Code.eq(code))
      .one(&txn)
      .await?
      .ok_or(Error::CodeNotFound)?;

    click::ActiveModel {
      id: NotSet,
      affiliate_id: Set(affiliate.id),
      ip_address: Set(visit.ip_address),
      user_agent: Set(visit.user_agent),
      referer: Set(visit.referer),
      created_at: Set(Utc::now().naive_utc()),
    }
    .insert(&txn)
    .await?;

    let affiliate = counters::bump(&txn, affiliate.id, Counter::Clicks).await?;

    txn.commit().await?;

    debug!("Click tracked for {} ({})", affiliate.code, affiliate.total_clicks);
    Ok(affiliate)
  }

  pub async fn recent(
    &self,
    affiliate_id: i32,
    limit: u64,
  ) -> Result<Vec<click::Model>> {
    Ok(
      click::Entity::find()
        .filter(click::Column::AffiliateId.eq(affiliate_id))
        .order_by_desc(click::Column::CreatedAt)
        .order_by_desc(click::Column::Id)
        .limit(limit)
        .all(self.db)
        .await?,
    )
  }

  pub async fn count(&self) -> Result<u64> {
    Ok(click::Entity::find().count(self.db).await?)
  }
}
