use serde::Serialize;

use crate::{
  entity::affiliate,
  prelude::*,
  sv::{Click, Referral},
  utils,
};

pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
  /// Position within the returned page, starting at 1.
  pub rank: usize,
  pub affiliate_code: String,
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  pub total_clicks: i64,
  pub total_referrals: i64,
  pub conversion_rate: f64,
  pub joined_at: chrono::DateTime<Utc>,
}

/// Global totals, independent of the page filters.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TotalStats {
  pub total_affiliates: u64,
  pub total_referrals: u64,
  pub total_clicks: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
  pub leaderboard: Vec<Entry>,
  pub total_stats: TotalStats,
}

pub struct Leaderboard<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Leaderboard<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Verified affiliates ordered by referrals, then conversion rate, then id
  /// (oldest first). `public` strips emails from every entry.
  pub async fn page(&self, limit: u64, public: bool) -> Result<Page> {
    let limit = limit.clamp(1, MAX_LIMIT);

    let rows = affiliate::Entity::find()
      .filter(affiliate::Column::Verified.eq(true))
      .order_by_desc(affiliate::Column::TotalReferrals)
      .order_by_desc(affiliate::Column::ConversionRate)
      .order_by_asc(affiliate::Column::Id)
      .limit(limit)
      .all(self.db)
      .await?;

    let leaderboard = rows
      .into_iter()
      .enumerate()
      .map(|(idx, row)| Entry {
        rank: idx + 1,
        name: row.display_name(),
        email: (!public).then(|| row.email.clone()),
        total_clicks: row.total_clicks,
        total_referrals: row.total_referrals,
        conversion_rate: utils::round2(row.conversion_rate),
        joined_at: row.created_at.and_utc(),
        affiliate_code: row.code,
      })
      .collect();

    Ok(Page { leaderboard, total_stats: self.totals().await? })
  }

  pub async fn totals(&self) -> Result<TotalStats> {
    let total_affiliates = affiliate::Entity::find()
      .filter(affiliate::Column::Verified.eq(true))
      .count(self.db)
      .await?;
    let total_referrals = Referral::new(self.db).count().await?;
    let total_clicks = Click::new(self.db).count().await?;

    Ok(TotalStats { total_affiliates, total_referrals, total_clicks })
  }
}
