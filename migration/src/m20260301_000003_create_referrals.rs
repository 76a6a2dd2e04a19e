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
          .table(Referrals::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Referrals::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Referrals::AffiliateId).integer().not_null())
          .col(
            ColumnDef::new(Referrals::ConversionType)
              .string()
              .not_null()
              .default("signup"),
          )
          .col(ColumnDef::new(Referrals::Metadata).json().null())
          .col(ColumnDef::new(Referrals::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_referrals_affiliate")
              .from(Referrals::Table, Referrals::AffiliateId)
              .to(Affiliates::Table, Affiliates::Id)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_referrals_affiliate")
          .table(Referrals::Table)
          .col(Referrals::AffiliateId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(Referrals::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum Referrals {
  Table,
  Id,
  AffiliateId,
  ConversionType,
  Metadata,
  CreatedAt,
}
