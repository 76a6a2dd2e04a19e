//! Denormalized per-affiliate totals.
//!
//! Counters only ever move through [`bump`], an in-place `col = col + 1`
//! followed by a rate recompute from the post-increment row, both on the
//! caller's transaction. [`Counters::reconcile`] periodically rewrites any
//! counter that drifted from the raw event tables.

use sea_orm::sea_query::Expr;

use crate::{
  entity::{affiliate, click, referral},
  prelude::*,
  utils,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
  Clicks,
  Referrals,
}

impl Counter {
  fn column(self) -> affiliate::Column {
    match self {
      Counter::Clicks => affiliate::Column::TotalClicks,
      Counter::Referrals => affiliate::Column::TotalReferrals,
    }
  }
}

/// Atomically increment one counter and refresh `conversion_rate`.
/// Returns the affiliate as seen after the update.
pub async fn bump<C: ConnectionTrait>(
  conn: &C,
  affiliate_id: i32,
  counter: Counter,
) -> Result<affiliate::Model> {
  let column = counter.column();
  let res = affiliate::Entity::update_many()
    .col_expr(column, Expr::col(column).add(1i64))
    .filter(affiliate::Column::Id.eq(affiliate_id))
    .exec(conn)
    .await?;

  if res.rows_affected == 0 {
    return Err(Error::AffiliateNotFound);
  }

  let mut affiliate = affiliate::Entity::find_by_id(affiliate_id)
    .one(conn)
    .await?
    .ok_or(Error::AffiliateNotFound)?;

  let rate =
    utils::conversion_rate(affiliate.total_referrals, affiliate.total_clicks);
  if rate != affiliate.conversion_rate {
    affiliate::Entity::update_many()
      .col_expr(affiliate::Column::ConversionRate, Expr::value(rate))
      .filter(affiliate::Column::Id.eq(affiliate_id))
      .exec(conn)
      .await?;
    affiliate.conversion_rate = rate;
  }

  Ok(affiliate)
}

pub struct Counters<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Counters<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Recount clicks and referrals for every affiliate and repair drift.
  /// Returns how many affiliates were corrected.
  pub async fn reconcile(&self) -> Result<u64> {
    let ids: Vec<i32> = affiliate::Entity::find()
      .select_only()
      .column(affiliate::Column::Id)
      .order_by_asc(affiliate::Column::Id)
      .into_tuple()
      .all(self.db)
      .await?;

    let mut corrected = 0;
    for id in ids {
      if self.reconcile_one(id).await? {
        corrected += 1;
      }
    }

    Ok(corrected)
  }

  async fn reconcile_one(&self, affiliate_id: i32) -> Result<bool> {
    let txn = self.db.begin().await?;

    let Some(affiliate) =
      affiliate::Entity::find_by_id(affiliate_id).one(&txn).await?
    else {
      return Ok(false);
    };

    let clicks = click::Entity::find()
      .filter(click::Column::AffiliateId.eq(affiliate_id))
      .count(&txn)
      .await? as i64;
    let referrals = referral::Entity::find()
      .filter(referral::Column::AffiliateId.eq(affiliate_id))
      .count(&txn)
      .await? as i64;
    let rate = utils::conversion_rate(referrals, clicks);

    if affiliate.total_clicks == clicks
      && affiliate.total_referrals == referrals
      && affiliate.conversion_rate == rate
    {
      return Ok(false);
    }

    warn!(
      "Counter drift on {}: clicks {} -> {}, referrals {} -> {}",
      affiliate.code,
      affiliate.total_clicks,
      clicks,
      affiliate.total_referrals,
      referrals
    );

    affiliate::Entity::update_many()
      .col_expr(affiliate::Column::TotalClicks, Expr::value(clicks))
      .col_expr(affiliate::Column::TotalReferrals, Expr::value(referrals))
      .col_expr(affiliate::Column::ConversionRate, Expr::value(rate))
      .filter(affiliate::Column::Id.eq(affiliate_id))
      .exec(&txn)
      .await?;

    txn.commit().await?;
    Ok(true)
  }
}
