//! Initial schema migration.
//!
//! - `flows`: every credit and debit, pending or finalized
//! - `subscription_tokens`: short-lived tokens for the notification stream

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Flows {
    Table,
    Id,
    Kind,
    AccountId,
    DeltaPoints,
    Metadata,
    CreatedAt,
    FinalizedAt,
    Accepted,
}

#[derive(Iden)]
enum SubscriptionTokens {
    Table,
    Token,
    AccountId,
    ExpiresAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Flows
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Flows::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Flows::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Flows::Kind).string().not_null())
                    .col(ColumnDef::new(Flows::AccountId).string().not_null())
                    .col(ColumnDef::new(Flows::DeltaPoints).big_integer().not_null())
                    .col(
                        ColumnDef::new(Flows::Metadata)
                            .string()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Flows::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Flows::FinalizedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Flows::Accepted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        // History pages walk one account's flows newest first.
        manager
            .create_index(
                Index::create()
                    .name("idx-flows-account_id-created_at")
                    .table(Flows::Table)
                    .col(Flows::AccountId)
                    .col(Flows::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Subscription tokens
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(SubscriptionTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SubscriptionTokens::Token)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionTokens::AccountId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SubscriptionTokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-subscription_tokens-account_id")
                    .table(SubscriptionTokens::Table)
                    .col(SubscriptionTokens::AccountId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(SubscriptionTokens::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Flows::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}
