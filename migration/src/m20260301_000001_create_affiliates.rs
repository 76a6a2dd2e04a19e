use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Affiliates::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Affiliates::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(Affiliates::Email).string().not_null().unique_key(),
          )
          .col(ColumnDef::new(Affiliates::PasswordHash).string().not_null())
          .col(ColumnDef::new(Affiliates::Name).string().null())
          .col(
            ColumnDef::new(Affiliates::Code).string().not_null().unique_key(),
          )
          .col(
            ColumnDef::new(Affiliates::Verified)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(
            ColumnDef::new(Affiliates::VerificationToken)
              .string()
              .null()
              .unique_key(),
          )
          .col(ColumnDef::new(Affiliates::TokenExpiresAt).date_time().null())
          .col(
            ColumnDef::new(Affiliates::TotalClicks)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Affiliates::TotalReferrals)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Affiliates::ConversionRate)
              .double()
              .not_null()
              .default(0.0),
          )
          .col(ColumnDef::new(Affiliates::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Affiliates::VerifiedAt).date_time().null())
          .to_owned(),
      )
      .await?;

    // leaderboard scan
    manager
      .create_index(
        Index::create()
          .name("idx_affiliates_ranking")
          .table(Affiliates::Table)
          .col(Affiliates::Verified)
          .col(Affiliates::TotalReferrals)
          .col(Affiliates::ConversionRate)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(Affiliates::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum Affiliates {
  Table,
  Id,
  Email,
  PasswordHash,
  Name,
  Code,
  Verified,
  VerificationToken,
  TokenExpiresAt,
  TotalClicks,
  TotalReferrals,
  ConversionRate,
  CreatedAt,
  VerifiedAt,
}
