use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Progress tracking
        manager
            .create_table(
                Table::create()
                    .table(Syncables::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Syncables::Height).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(Syncables::Time).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Syncables::SpecVersion).text().not_null())
                    .col(ColumnDef::new(Syncables::ChainUid).text().not_null())
                    .col(ColumnDef::new(Syncables::Session).big_integer().not_null())
                    .col(ColumnDef::new(Syncables::Era).big_integer().not_null())
                    .col(
                        ColumnDef::new(Syncables::LastInSession)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Syncables::LastInEra).boolean().not_null().default(false))
                    .col(ColumnDef::new(Syncables::IndexVersion).big_integer().not_null())
                    .col(ColumnDef::new(Syncables::Status).text().not_null())
                    .col(ColumnDef::new(Syncables::ReportId).big_integer().null())
                    .col(ColumnDef::new(Syncables::StartedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Syncables::ProcessedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Syncables::DurationMs).big_integer().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Reports::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reports::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Reports::Kind).text().not_null())
                    .col(ColumnDef::new(Reports::IndexVersion).big_integer().not_null())
                    .col(ColumnDef::new(Reports::StartHeight).big_integer().not_null())
                    .col(ColumnDef::new(Reports::EndHeight).big_integer().not_null())
                    .col(ColumnDef::new(Reports::SuccessCount).big_integer().null())
                    .col(ColumnDef::new(Reports::ErrorCount).big_integer().null())
                    .col(ColumnDef::new(Reports::ErrorMsg).text().null())
                    .col(ColumnDef::new(Reports::DurationMs).big_integer().null())
                    .col(ColumnDef::new(Reports::LastGoodHeight).big_integer().null())
                    .col(ColumnDef::new(Reports::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Reports::CompletedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;

        // Per-height sequences
        manager
            .create_table(
                Table::create()
                    .table(BlockSeqs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BlockSeqs::Height).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(BlockSeqs::Time).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(BlockSeqs::ExtrinsicsCount).big_integer().not_null())
                    .col(ColumnDef::new(BlockSeqs::ExtrinsicsSignedCount).big_integer().not_null())
                    .col(
                        ColumnDef::new(BlockSeqs::ExtrinsicsUnsignedCount)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_block_seqs_time")
                    .table(BlockSeqs::Table)
                    .col(BlockSeqs::Time)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ValidatorSeqs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ValidatorSeqs::Height).big_integer().not_null())
                    .col(ColumnDef::new(ValidatorSeqs::StashAccount).text().not_null())
                    .col(ColumnDef::new(ValidatorSeqs::Time).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(ValidatorSeqs::ActiveBalance).text().not_null())
                    .primary_key(
                        Index::create()
                            .col(ValidatorSeqs::Height)
                            .col(ValidatorSeqs::StashAccount),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_validator_seqs_time")
                    .table(ValidatorSeqs::Table)
                    .col(ValidatorSeqs::Time)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TransactionSeqs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TransactionSeqs::Height).big_integer().not_null())
                    .col(ColumnDef::new(TransactionSeqs::Index).big_integer().not_null())
                    .col(
                        ColumnDef::new(TransactionSeqs::Time)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TransactionSeqs::Hash).text().not_null())
                    .col(ColumnDef::new(TransactionSeqs::Method).text().not_null())
                    .col(ColumnDef::new(TransactionSeqs::Section).text().not_null())
                    .col(ColumnDef::new(TransactionSeqs::Args).json_binary().not_null())
                    .primary_key(
                        Index::create()
                            .col(TransactionSeqs::Height)
                            .col(TransactionSeqs::Index),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EventSeqs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(EventSeqs::Height).big_integer().not_null())
                    .col(ColumnDef::new(EventSeqs::Index).big_integer().not_null())
                    .col(ColumnDef::new(EventSeqs::Time).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(EventSeqs::ExtrinsicIndex).big_integer().not_null())
                    .col(ColumnDef::new(EventSeqs::Phase).text().not_null())
                    .col(ColumnDef::new(EventSeqs::Method).text().not_null())
                    .col(ColumnDef::new(EventSeqs::Section).text().not_null())
                    .col(ColumnDef::new(EventSeqs::Data).json_binary().not_null())
                    .primary_key(Index::create().col(EventSeqs::Height).col(EventSeqs::Index))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SystemEvents::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SystemEvents::Height).big_integer().not_null())
                    .col(ColumnDef::new(SystemEvents::Actor).text().not_null())
                    .col(ColumnDef::new(SystemEvents::Kind).text().not_null())
                    .col(ColumnDef::new(SystemEvents::Time).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(SystemEvents::Data).json_binary().not_null())
                    .primary_key(
                        Index::create()
                            .col(SystemEvents::Height)
                            .col(SystemEvents::Actor)
                            .col(SystemEvents::Kind),
                    )
                    .to_owned(),
            )
            .await?;

        // Era and session scoped sequences
        manager
            .create_table(
                Table::create()
                    .table(ValidatorEraSeqs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ValidatorEraSeqs::Era).big_integer().not_null())
                    .col(ColumnDef::new(ValidatorEraSeqs::StashAccount).text().not_null())
                    .col(ColumnDef::new(ValidatorEraSeqs::StartHeight).big_integer().not_null())
                    .col(ColumnDef::new(ValidatorEraSeqs::EndHeight).big_integer().not_null())
                    .col(ColumnDef::new(ValidatorEraSeqs::Index).big_integer().not_null())
                    .col(ColumnDef::new(ValidatorEraSeqs::ControllerAccount).text().not_null())
                    .col(ColumnDef::new(ValidatorEraSeqs::SessionAccounts).json_binary().not_null())
                    .col(ColumnDef::new(ValidatorEraSeqs::TotalStake).text().not_null())
                    .col(ColumnDef::new(ValidatorEraSeqs::OwnStake).text().not_null())
                    .col(ColumnDef::new(ValidatorEraSeqs::StakersStake).text().not_null())
                    .col(ColumnDef::new(ValidatorEraSeqs::RewardPoints).big_integer().not_null())
                    .col(ColumnDef::new(ValidatorEraSeqs::Commission).big_integer().not_null())
                    .col(ColumnDef::new(ValidatorEraSeqs::StakersCount).big_integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(ValidatorEraSeqs::Era)
                            .col(ValidatorEraSeqs::StashAccount),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AccountEraSeqs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AccountEraSeqs::Era).big_integer().not_null())
                    .col(ColumnDef::new(AccountEraSeqs::ValidatorStashAccount).text().not_null())
                    .col(ColumnDef::new(AccountEraSeqs::StashAccount).text().not_null())
                    .col(ColumnDef::new(AccountEraSeqs::StartHeight).big_integer().not_null())
                    .col(ColumnDef::new(AccountEraSeqs::EndHeight).big_integer().not_null())
                    .col(ColumnDef::new(AccountEraSeqs::ControllerAccount).text().not_null())
                    .col(
                        ColumnDef::new(AccountEraSeqs::ValidatorControllerAccount)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AccountEraSeqs::Stake).text().not_null())
                    .primary_key(
                        Index::create()
                            .col(AccountEraSeqs::Era)
                            .col(AccountEraSeqs::ValidatorStashAccount)
                            .col(AccountEraSeqs::StashAccount),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RewardEraSeqs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RewardEraSeqs::Era).big_integer().not_null())
                    .col(ColumnDef::new(RewardEraSeqs::ValidatorStashAccount).text().not_null())
                    .col(ColumnDef::new(RewardEraSeqs::StashAccount).text().not_null())
                    .col(ColumnDef::new(RewardEraSeqs::Kind).text().not_null())
                    .col(ColumnDef::new(RewardEraSeqs::StartHeight).big_integer().not_null())
                    .col(ColumnDef::new(RewardEraSeqs::EndHeight).big_integer().not_null())
                    .col(ColumnDef::new(RewardEraSeqs::Amount).text().not_null())
                    .col(ColumnDef::new(RewardEraSeqs::Claimed).boolean().not_null().default(false))
                    .primary_key(
                        Index::create()
                            .col(RewardEraSeqs::Era)
                            .col(RewardEraSeqs::ValidatorStashAccount)
                            .col(RewardEraSeqs::StashAccount)
                            .col(RewardEraSeqs::Kind),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ValidatorSessionSeqs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ValidatorSessionSeqs::Session).big_integer().not_null())
                    .col(ColumnDef::new(ValidatorSessionSeqs::StashAccount).text().not_null())
                    .col(ColumnDef::new(ValidatorSessionSeqs::StartHeight).big_integer().not_null())
                    .col(ColumnDef::new(ValidatorSessionSeqs::EndHeight).big_integer().not_null())
                    .col(ColumnDef::new(ValidatorSessionSeqs::Online).boolean().not_null())
                    .primary_key(
                        Index::create()
                            .col(ValidatorSessionSeqs::Session)
                            .col(ValidatorSessionSeqs::StashAccount),
                    )
                    .to_owned(),
            )
            .await?;

        // Aggregates and rollups
        manager
            .create_table(
                Table::create()
                    .table(ValidatorAggs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ValidatorAggs::StashAccount)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ValidatorAggs::StartedAtHeight).big_integer().not_null())
                    .col(
                        ColumnDef::new(ValidatorAggs::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ValidatorAggs::RecentAtHeight).big_integer().not_null())
                    .col(
                        ColumnDef::new(ValidatorAggs::RecentAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ValidatorAggs::RecentAsValidatorHeight)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ValidatorAggs::AccumulatedUptime)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ValidatorAggs::AccumulatedUptimeCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BlockSummaries::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BlockSummaries::TimeInterval).text().not_null())
                    .col(
                        ColumnDef::new(BlockSummaries::TimeBucket)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BlockSummaries::IndexVersion).big_integer().not_null())
                    .col(ColumnDef::new(BlockSummaries::Count).big_integer().not_null())
                    .col(ColumnDef::new(BlockSummaries::ExtrinsicsMin).big_integer().not_null())
                    .col(ColumnDef::new(BlockSummaries::ExtrinsicsAvg).double().not_null())
                    .col(ColumnDef::new(BlockSummaries::ExtrinsicsMax).big_integer().not_null())
                    .col(ColumnDef::new(BlockSummaries::ExtrinsicsSignedAvg).double().not_null())
                    .primary_key(
                        Index::create()
                            .col(BlockSummaries::TimeInterval)
                            .col(BlockSummaries::TimeBucket),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ValidatorSummaries::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ValidatorSummaries::TimeInterval).text().not_null())
                    .col(
                        ColumnDef::new(ValidatorSummaries::TimeBucket)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ValidatorSummaries::StashAccount).text().not_null())
                    .col(ColumnDef::new(ValidatorSummaries::IndexVersion).big_integer().not_null())
                    .col(ColumnDef::new(ValidatorSummaries::Count).big_integer().not_null())
                    .col(ColumnDef::new(ValidatorSummaries::ActiveBalanceMin).text().not_null())
                    .col(ColumnDef::new(ValidatorSummaries::ActiveBalanceAvg).text().not_null())
                    .col(ColumnDef::new(ValidatorSummaries::ActiveBalanceMax).text().not_null())
                    .primary_key(
                        Index::create()
                            .col(ValidatorSummaries::TimeInterval)
                            .col(ValidatorSummaries::TimeBucket)
                            .col(ValidatorSummaries::StashAccount),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ValidatorSessionSeqSummaries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ValidatorSessionSeqSummaries::TimeInterval)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ValidatorSessionSeqSummaries::TimeBucket)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ValidatorSessionSeqSummaries::StashAccount)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ValidatorSessionSeqSummaries::IndexVersion)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ValidatorSessionSeqSummaries::Count)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ValidatorSessionSeqSummaries::OnlineCount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ValidatorSessionSeqSummaries::UptimeMin)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ValidatorSessionSeqSummaries::UptimeAvg)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ValidatorSessionSeqSummaries::UptimeMax)
                            .double()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ValidatorSessionSeqSummaries::TimeInterval)
                            .col(ValidatorSessionSeqSummaries::TimeBucket)
                            .col(ValidatorSessionSeqSummaries::StashAccount),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ValidatorSessionSeqSummaries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ValidatorSummaries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BlockSummaries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ValidatorAggs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ValidatorSessionSeqs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RewardEraSeqs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AccountEraSeqs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ValidatorEraSeqs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SystemEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EventSeqs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TransactionSeqs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ValidatorSeqs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BlockSeqs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Reports::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Syncables::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Syncables {
    Table,
    Height,
    Time,
    SpecVersion,
    ChainUid,
    Session,
    Era,
    LastInSession,
    LastInEra,
    IndexVersion,
    Status,
    ReportId,
    StartedAt,
    ProcessedAt,
    DurationMs,
}

#[derive(DeriveIden)]
enum Reports {
    Table,
    Id,
    Kind,
    IndexVersion,
    StartHeight,
    EndHeight,
    SuccessCount,
    ErrorCount,
    ErrorMsg,
    DurationMs,
    LastGoodHeight,
    CreatedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum BlockSeqs {
    Table,
    Height,
    Time,
    ExtrinsicsCount,
    ExtrinsicsSignedCount,
    ExtrinsicsUnsignedCount,
}

#[derive(DeriveIden)]
enum ValidatorSeqs {
    Table,
    Height,
    StashAccount,
    Time,
    ActiveBalance,
}

#[derive(DeriveIden)]
enum TransactionSeqs {
    Table,
    Height,
    Index,
    Time,
    Hash,
    Method,
    Section,
    Args,
}

#[derive(DeriveIden)]
enum EventSeqs {
    Table,
    Height,
    Index,
    Time,
    ExtrinsicIndex,
    Phase,
    Method,
    Section,
    Data,
}

#[derive(DeriveIden)]
enum SystemEvents {
    Table,
    Height,
    Actor,
    Kind,
    Time,
    Data,
}

#[derive(DeriveIden)]
enum ValidatorEraSeqs {
    Table,
    Era,
    StashAccount,
    StartHeight,
    EndHeight,
    Index,
    ControllerAccount,
    SessionAccounts,
    TotalStake,
    OwnStake,
    StakersStake,
    RewardPoints,
    Commission,
    StakersCount,
}

#[derive(DeriveIden)]
enum AccountEraSeqs {
    Table,
    Era,
    ValidatorStashAccount,
    StashAccount,
    StartHeight,
    EndHeight,
    ControllerAccount,
    ValidatorControllerAccount,
    Stake,
}

#[derive(DeriveIden)]
enum RewardEraSeqs {
    Table,
    Era,
    ValidatorStashAccount,
    StashAccount,
    Kind,
    StartHeight,
    EndHeight,
    Amount,
    Claimed,
}

#[derive(DeriveIden)]
enum ValidatorSessionSeqs {
    Table,
    Session,
    StashAccount,
    StartHeight,
    EndHeight,
    Online,
}

#[derive(DeriveIden)]
enum ValidatorAggs {
    Table,
    StashAccount,
    StartedAtHeight,
    StartedAt,
    RecentAtHeight,
    RecentAt,
    RecentAsValidatorHeight,
    AccumulatedUptime,
    AccumulatedUptimeCount,
}

#[derive(DeriveIden)]
enum BlockSummaries {
    Table,
    TimeInterval,
    TimeBucket,
    IndexVersion,
    Count,
    ExtrinsicsMin,
    ExtrinsicsAvg,
    ExtrinsicsMax,
    ExtrinsicsSignedAvg,
}

#[derive(DeriveIden)]
enum ValidatorSummaries {
    Table,
    TimeInterval,
    TimeBucket,
    StashAccount,
    IndexVersion,
    Count,
    ActiveBalanceMin,
    ActiveBalanceAvg,
    ActiveBalanceMax,
}

#[derive(DeriveIden)]
enum ValidatorSessionSeqSummaries {
    Table,
    TimeInterval,
    TimeBucket,
    StashAccount,
    IndexVersion,
    Count,
    OnlineCount,
    UptimeMin,
    UptimeAvg,
    UptimeMax,
}
