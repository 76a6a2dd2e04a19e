use sea_orm_migration::prelude::*;

use super::m20260301_000001_create_affiliates::Affiliates;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(AffiliateClicks::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(AffiliateClicks::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(AffiliateClicks::AffiliateId).integer().not_null(),
          )
          .col(ColumnDef::new(AffiliateClicks::IpAddress).string().not_null())
          .col(ColumnDef::new(AffiliateClicks::UserAgent).string().null())
          .col(ColumnDef::new(AffiliateClicks::Referer).string().null())
          .col(
            ColumnDef::new(AffiliateClicks::CreatedAt).date_time().not_null(),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_affiliate_clicks_affiliate")
              .from(AffiliateClicks::Table, AffiliateClicks::AffiliateId)
              .to(Affiliates::Table, Affiliates::Id)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_affiliate_clicks_affiliate")
          .table(AffiliateClicks::Table)
          .col(AffiliateClicks::AffiliateId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(AffiliateClicks::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum AffiliateClicks {
  Table,
  Id,
  AffiliateId,
  IpAddress,
  UserAgent,
  Referer,
  CreatedAt,
}
