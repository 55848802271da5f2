//! Flow change log.
//!
//! `flow_changes` keeps one row per flow insert or finalization, written in
//! the same transaction as the flow. Notification dispatchers read it in
//! `seq` order.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum FlowChanges {
    Table,
    Seq,
    FlowId,
    AccountId,
    Payload,
    RecordedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FlowChanges::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FlowChanges::Seq)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FlowChanges::FlowId).string().not_null())
                    .col(ColumnDef::new(FlowChanges::AccountId).string().not_null())
                    .col(ColumnDef::new(FlowChanges::Payload).text().not_null())
                    .col(
                        ColumnDef::new(FlowChanges::RecordedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(FlowChanges::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}
