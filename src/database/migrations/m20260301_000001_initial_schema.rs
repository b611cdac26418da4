use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create tables in order of dependencies
        self.create_analysis_jobs_table(manager).await?;
        self.create_monitoring_configs_table(manager).await?;
        self.create_monitoring_runs_table(manager).await?;
        self.create_threshold_alerts_table(manager).await?;

        self.create_indexes(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order
        manager
            .drop_table(Table::drop().table(ThresholdAlerts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MonitoringRuns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MonitoringConfigs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AnalysisJobs::Table).to_owned())
            .await?;

        Ok(())
    }
}

impl Migration {
    // Helper functions for database-specific types
    fn create_id_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.uuid().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn create_uuid_fk_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.uuid().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn create_timestamp_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn create_nullable_timestamp_column(
        &self,
        manager: &SchemaManager,
        column: impl IntoIden,
    ) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone(),
            _ => col.string(),
        };
        col
    }

    fn create_json_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.json_binary().not_null(),
            _ => col.json().not_null(),
        };
        col
    }

    fn create_nullable_json_column(
        &self,
        manager: &SchemaManager,
        column: impl IntoIden,
    ) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.json_binary(),
            _ => col.json(),
        };
        col
    }

    async fn create_analysis_jobs_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AnalysisJobs::Table)
                    .if_not_exists()
                    .col(
                        self.create_id_column(manager, AnalysisJobs::Id)
                            .primary_key(),
                    )
                    .col(self.create_uuid_fk_column(manager, AnalysisJobs::ResourceId))
                    .col(
                        ColumnDef::new(AnalysisJobs::TriggerType)
                            .string()
                            .not_null(),
                    )
                    .col(self.create_json_column(manager, AnalysisJobs::TriggerData))
                    .col(
                        ColumnDef::new(AnalysisJobs::Status)
                            .string()
                            .not_null()
                            .default("queued"),
                    )
                    .col(
                        ColumnDef::new(AnalysisJobs::Priority)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AnalysisJobs::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AnalysisJobs::MaxRetries)
                            .integer()
                            .not_null(),
                    )
                    .col(self.create_timestamp_column(manager, AnalysisJobs::ScheduledAt))
                    .col(self.create_nullable_timestamp_column(manager, AnalysisJobs::StartedAt))
                    .col(self.create_nullable_timestamp_column(manager, AnalysisJobs::CompletedAt))
                    .col(
                        self.create_nullable_timestamp_column(
                            manager,
                            AnalysisJobs::LeaseExpiresAt,
                        ),
                    )
                    .col(
                        ColumnDef::new(AnalysisJobs::Progress)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(AnalysisJobs::StatusMessage).string())
                    .col(self.create_nullable_json_column(manager, AnalysisJobs::ResultSummary))
                    .col(ColumnDef::new(AnalysisJobs::ErrorMessage).string())
                    .col(self.create_timestamp_column(manager, AnalysisJobs::CreatedAt))
                    .col(self.create_timestamp_column(manager, AnalysisJobs::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_monitoring_configs_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MonitoringConfigs::Table)
                    .if_not_exists()
                    .col(
                        self.create_id_column(manager, MonitoringConfigs::Id)
                            .primary_key(),
                    )
                    .col(self.create_uuid_fk_column(manager, MonitoringConfigs::ProjectId))
                    .col(ColumnDef::new(MonitoringConfigs::Name).string().not_null())
                    .col(self.create_json_column(manager, MonitoringConfigs::Targets))
                    .col(
                        ColumnDef::new(MonitoringConfigs::ScheduleInterval)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MonitoringConfigs::ScheduleCron).string())
                    .col(self.create_json_column(manager, MonitoringConfigs::Thresholds))
                    .col(
                        ColumnDef::new(MonitoringConfigs::MaxRunsPerDay)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MonitoringConfigs::AvoidPeakHours)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(MonitoringConfigs::PeakStart).string())
                    .col(ColumnDef::new(MonitoringConfigs::PeakEnd).string())
                    .col(
                        self.create_nullable_timestamp_column(
                            manager,
                            MonitoringConfigs::LastRunAt,
                        ),
                    )
                    .col(
                        self.create_nullable_timestamp_column(
                            manager,
                            MonitoringConfigs::NextRunAt,
                        ),
                    )
                    .col(
                        ColumnDef::new(MonitoringConfigs::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(self.create_timestamp_column(manager, MonitoringConfigs::CreatedAt))
                    .col(self.create_timestamp_column(manager, MonitoringConfigs::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_monitoring_runs_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MonitoringRuns::Table)
                    .if_not_exists()
                    .col(
                        self.create_id_column(manager, MonitoringRuns::Id)
                            .primary_key(),
                    )
                    .col(self.create_uuid_fk_column(manager, MonitoringRuns::ConfigId))
                    .col(
                        ColumnDef::new(MonitoringRuns::TriggerType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MonitoringRuns::Status).string().not_null())
                    .col(
                        ColumnDef::new(MonitoringRuns::TotalTargets)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MonitoringRuns::CompletedTargets)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MonitoringRuns::FailedTargets)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(self.create_nullable_json_column(manager, MonitoringRuns::AverageScores))
                    .col(self.create_timestamp_column(manager, MonitoringRuns::StartedAt))
                    .col(
                        self.create_nullable_timestamp_column(
                            manager,
                            MonitoringRuns::CompletedAt,
                        ),
                    )
                    .col(self.create_timestamp_column(manager, MonitoringRuns::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_monitoring_runs_config")
                            .from(MonitoringRuns::Table, MonitoringRuns::ConfigId)
                            .to(MonitoringConfigs::Table, MonitoringConfigs::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_threshold_alerts_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ThresholdAlerts::Table)
                    .if_not_exists()
                    .col(
                        self.create_id_column(manager, ThresholdAlerts::Id)
                            .primary_key(),
                    )
                    .col(self.create_uuid_fk_column(manager, ThresholdAlerts::RunId))
                    .col(ColumnDef::new(ThresholdAlerts::Target).string().not_null())
                    .col(
                        ColumnDef::new(ThresholdAlerts::MetricName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ThresholdAlerts::CurrentScore)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ThresholdAlerts::ThresholdScore)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ThresholdAlerts::Severity)
                            .string()
                            .not_null(),
                    )
                    .col(self.create_timestamp_column(manager, ThresholdAlerts::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_threshold_alerts_run")
                            .from(ThresholdAlerts::Table, ThresholdAlerts::RunId)
                            .to(MonitoringRuns::Table, MonitoringRuns::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        // The dequeue query filters on status + scheduled_at
        manager
            .create_index(
                Index::create()
                    .name("idx_analysis_jobs_status_scheduled")
                    .table(AnalysisJobs::Table)
                    .col(AnalysisJobs::Status)
                    .col(AnalysisJobs::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        // Admission counts active jobs per resource
        manager
            .create_index(
                Index::create()
                    .name("idx_analysis_jobs_resource_status")
                    .table(AnalysisJobs::Table)
                    .col(AnalysisJobs::ResourceId)
                    .col(AnalysisJobs::Status)
                    .to_owned(),
            )
            .await?;

        // The monitor selects due active configs
        manager
            .create_index(
                Index::create()
                    .name("idx_monitoring_configs_active_next_run")
                    .table(MonitoringConfigs::Table)
                    .col(MonitoringConfigs::IsActive)
                    .col(MonitoringConfigs::NextRunAt)
                    .to_owned(),
            )
            .await?;

        // Daily cap counts runs per config per day
        manager
            .create_index(
                Index::create()
                    .name("idx_monitoring_runs_config_created")
                    .table(MonitoringRuns::Table)
                    .col(MonitoringRuns::ConfigId)
                    .col(MonitoringRuns::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_threshold_alerts_run")
                    .table(ThresholdAlerts::Table)
                    .col(ThresholdAlerts::RunId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum AnalysisJobs {
    Table,
    Id,
    ResourceId,
    TriggerType,
    TriggerData,
    Status,
    Priority,
    RetryCount,
    MaxRetries,
    ScheduledAt,
    StartedAt,
    CompletedAt,
    LeaseExpiresAt,
    Progress,
    StatusMessage,
    ResultSummary,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MonitoringConfigs {
    Table,
    Id,
    ProjectId,
    Name,
    Targets,
    ScheduleInterval,
    ScheduleCron,
    Thresholds,
    MaxRunsPerDay,
    AvoidPeakHours,
    PeakStart,
    PeakEnd,
    LastRunAt,
    NextRunAt,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MonitoringRuns {
    Table,
    Id,
    ConfigId,
    TriggerType,
    Status,
    TotalTargets,
    CompletedTargets,
    FailedTargets,
    AverageScores,
    StartedAt,
    CompletedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ThresholdAlerts {
    Table,
    Id,
    RunId,
    Target,
    MetricName,
    CurrentScore,
    ThresholdScore,
    Severity,
    CreatedAt,
}
