use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_parties_tables::Migration),
            Box::new(m20240301_000002_create_orders_table::Migration),
            Box::new(m20240301_000003_create_negotiation_tables::Migration),
            Box::new(m20240301_000004_create_production_tables::Migration),
            Box::new(m20240301_000005_create_revision_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_parties_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_parties_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Companies::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Companies::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Companies::Name).string().not_null())
                        .col(
                            ColumnDef::new(Companies::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Users::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::Role).string_len(32).not_null())
                        .col(ColumnDef::new(Users::CompanyId).uuid())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Collections::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Collections::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Collections::CompanyId).uuid().not_null())
                        .col(ColumnDef::new(Collections::Name).string().not_null())
                        .col(
                            ColumnDef::new(Collections::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Samples::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Samples::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Samples::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Samples::CompanyId).uuid().not_null())
                        .col(ColumnDef::new(Samples::CollectionId).uuid().not_null())
                        .col(ColumnDef::new(Samples::Name).string().not_null())
                        .col(
                            ColumnDef::new(Samples::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Samples::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Collections::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Companies::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Companies {
        Table,
        Id,
        Name,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Email,
        Name,
        Role,
        CompanyId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Collections {
        Table,
        Id,
        CompanyId,
        Name,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Samples {
        Table,
        Id,
        CustomerId,
        CompanyId,
        CollectionId,
        Name,
        CreatedAt,
    }
}

mod m20240301_000002_create_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::CompanyId).uuid().not_null())
                        .col(ColumnDef::new(Orders::CollectionId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Quantity).integer().not_null())
                        .col(ColumnDef::new(Orders::UnitPrice).decimal().not_null())
                        .col(ColumnDef::new(Orders::TotalPrice).decimal().not_null())
                        .col(ColumnDef::new(Orders::Currency).string_len(3).not_null())
                        .col(ColumnDef::new(Orders::ProductionDays).integer())
                        .col(ColumnDef::new(Orders::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::AgreedUnitPrice).decimal())
                        .col(ColumnDef::new(Orders::AgreedProductionDays).integer())
                        .col(ColumnDef::new(Orders::AgreedQuantity).integer())
                        .col(ColumnDef::new(Orders::Notes).text())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp_with_time_zone())
                        .col(ColumnDef::new(Orders::Version).integer().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_id")
                        .table(Orders::Table)
                        .col(Orders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_company_id")
                        .table(Orders::Table)
                        .col(Orders::CompanyId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        CustomerId,
        CompanyId,
        CollectionId,
        Quantity,
        UnitPrice,
        TotalPrice,
        Currency,
        ProductionDays,
        Status,
        AgreedUnitPrice,
        AgreedProductionDays,
        AgreedQuantity,
        Notes,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20240301_000003_create_negotiation_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_negotiation_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Negotiations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Negotiations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Negotiations::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(Negotiations::SenderRole)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Negotiations::SenderId).uuid().not_null())
                        .col(ColumnDef::new(Negotiations::UnitPrice).decimal().not_null())
                        .col(
                            ColumnDef::new(Negotiations::ProductionDays)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Negotiations::Quantity).integer())
                        .col(ColumnDef::new(Negotiations::Message).text())
                        .col(
                            ColumnDef::new(Negotiations::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Negotiations::RespondedBy).uuid())
                        .col(ColumnDef::new(Negotiations::RespondedAt).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(Negotiations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_negotiations_order_id")
                        .table(Negotiations::Table)
                        .col(Negotiations::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ChangeLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ChangeLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ChangeLogs::OrderId).uuid().not_null())
                        .col(ColumnDef::new(ChangeLogs::NegotiationId).uuid())
                        .col(ColumnDef::new(ChangeLogs::ActorId).uuid().not_null())
                        .col(ColumnDef::new(ChangeLogs::PreviousValues).json().not_null())
                        .col(ColumnDef::new(ChangeLogs::NewValues).json().not_null())
                        .col(
                            ColumnDef::new(ChangeLogs::ReviewStatus)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ChangeLogs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ChangeLogs::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Negotiations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Negotiations {
        Table,
        Id,
        OrderId,
        SenderRole,
        SenderId,
        UnitPrice,
        ProductionDays,
        Quantity,
        Message,
        Status,
        RespondedBy,
        RespondedAt,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ChangeLogs {
        Table,
        Id,
        OrderId,
        NegotiationId,
        ActorId,
        PreviousValues,
        NewValues,
        ReviewStatus,
        CreatedAt,
    }
}

mod m20240301_000004_create_production_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_production_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductionTrackings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionTrackings::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionTrackings::OwnerType)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionTrackings::OwnerId).uuid().not_null())
                        .col(
                            ColumnDef::new(ProductionTrackings::CurrentStage)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionTrackings::OverallStatus)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionTrackings::PlanStatus)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionTrackings::PlanNotes).text())
                        .col(ColumnDef::new(ProductionTrackings::CustomerRejectionReason).text())
                        .col(
                            ColumnDef::new(ProductionTrackings::RevisionCount)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionTrackings::CanStartProduction)
                                .boolean()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionTrackings::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionTrackings::UpdatedAt)
                                .timestamp_with_time_zone(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_production_trackings_owner")
                        .table(ProductionTrackings::Table)
                        .col(ProductionTrackings::OwnerType)
                        .col(ProductionTrackings::OwnerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductionStageUpdates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionStageUpdates::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionStageUpdates::TrackingId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionStageUpdates::Stage)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionStageUpdates::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionStageUpdates::Note).text())
                        .col(
                            ColumnDef::new(ProductionStageUpdates::ActualStart)
                                .timestamp_with_time_zone(),
                        )
                        .col(
                            ColumnDef::new(ProductionStageUpdates::ActualEnd)
                                .timestamp_with_time_zone(),
                        )
                        .col(ColumnDef::new(ProductionStageUpdates::DelayReason).text())
                        .col(ColumnDef::new(ProductionStageUpdates::ExtraDays).integer())
                        .col(
                            ColumnDef::new(ProductionStageUpdates::CreatedBy)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionStageUpdates::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductionStageUpdates::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductionTrackings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ProductionTrackings {
        Table,
        Id,
        OwnerType,
        OwnerId,
        CurrentStage,
        OverallStatus,
        PlanStatus,
        PlanNotes,
        CustomerRejectionReason,
        RevisionCount,
        CanStartProduction,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductionStageUpdates {
        Table,
        Id,
        TrackingId,
        Stage,
        Status,
        Note,
        ActualStart,
        ActualEnd,
        DelayReason,
        ExtraDays,
        CreatedBy,
        CreatedAt,
    }
}

mod m20240301_000005_create_revision_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_revision_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RevisionRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RevisionRequests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RevisionRequests::RevisionNumber)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(RevisionRequests::Title).string().not_null())
                        .col(
                            ColumnDef::new(RevisionRequests::Description)
                                .text()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RevisionRequests::RevisionType)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RevisionRequests::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RevisionRequests::ApprovalLevel)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RevisionRequests::OrderId).uuid())
                        .col(ColumnDef::new(RevisionRequests::SampleId).uuid())
                        .col(ColumnDef::new(RevisionRequests::ProductionTrackingId).uuid())
                        .col(ColumnDef::new(RevisionRequests::NegotiationId).uuid())
                        .col(
                            ColumnDef::new(RevisionRequests::RequestedBy)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RevisionRequests::AssignedTo).uuid())
                        .col(ColumnDef::new(RevisionRequests::EstimatedCostImpact).decimal())
                        .col(ColumnDef::new(RevisionRequests::EstimatedTimeImpactDays).integer())
                        .col(
                            ColumnDef::new(RevisionRequests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RevisionRequests::UpdatedAt)
                                .timestamp_with_time_zone(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RevisionTimelines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RevisionTimelines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RevisionTimelines::RevisionRequestId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RevisionTimelines::Event)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(RevisionTimelines::ActorId).uuid().not_null())
                        .col(ColumnDef::new(RevisionTimelines::Comments).text())
                        .col(
                            ColumnDef::new(RevisionTimelines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_revision_timelines_request_id")
                        .table(RevisionTimelines::Table)
                        .col(RevisionTimelines::RevisionRequestId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RevisionTimelines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RevisionRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum RevisionRequests {
        Table,
        Id,
        RevisionNumber,
        Title,
        Description,
        RevisionType,
        Status,
        ApprovalLevel,
        OrderId,
        SampleId,
        ProductionTrackingId,
        NegotiationId,
        RequestedBy,
        AssignedTo,
        EstimatedCostImpact,
        EstimatedTimeImpactDays,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum RevisionTimelines {
        Table,
        Id,
        RevisionRequestId,
        Event,
        ActorId,
        Comments,
        CreatedAt,
    }
}
