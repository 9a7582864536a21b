use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_sessions_table(manager).await?;
        self.create_segments_table(manager).await?;
        self.create_processed_channels_table(manager).await?;
        self.create_pipeline_runs_table(manager).await?;
        self.create_annotations_table(manager).await?;
        self.create_channel_settings_table(manager).await?;
        self.create_recordings_table(manager).await?;
        self.create_indexes(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Recordings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ChannelSettings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Annotations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PipelineRuns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProcessedChannels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Segments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sessions::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    /// Timestamps round-trip as `chrono::DateTime<Utc>`; stored as
    /// `TIMESTAMPTZ` on Postgres, `TEXT` elsewhere (§3.1).
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

    async fn create_sessions_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sessions::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Sessions::Status).string().not_null())
                    .col(ColumnDef::new(Sessions::SampleRate).integer().not_null())
                    .col(ColumnDef::new(Sessions::Channels).integer().not_null())
                    .col(self.create_timestamp_column(manager, Sessions::CreatedAt))
                    .col(self.create_timestamp_column(manager, Sessions::UpdatedAt))
                    .col(self.create_nullable_timestamp_column(manager, Sessions::CompletedAt))
                    .col(self.create_nullable_timestamp_column(manager, Sessions::ProcessedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_segments_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Segments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Segments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Segments::SessionId).string().not_null())
                    .col(ColumnDef::new(Segments::SegmentNumber).integer().not_null())
                    .col(ColumnDef::new(Segments::ChannelGroup).string().not_null())
                    .col(ColumnDef::new(Segments::LocalPath).string().not_null())
                    .col(ColumnDef::new(Segments::S3Key).string())
                    .col(ColumnDef::new(Segments::FileSize).big_integer().not_null())
                    .col(self.create_timestamp_column(manager, Segments::ReceivedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_segments_session_id")
                            .from(Segments::Table, Segments::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_processed_channels_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProcessedChannels::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProcessedChannels::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProcessedChannels::SessionId).string().not_null())
                    .col(ColumnDef::new(ProcessedChannels::ChannelNumber).integer().not_null())
                    .col(ColumnDef::new(ProcessedChannels::LocalPath).string().not_null())
                    .col(ColumnDef::new(ProcessedChannels::S3Key).string())
                    .col(ColumnDef::new(ProcessedChannels::S3Url).string())
                    .col(ColumnDef::new(ProcessedChannels::HlsUrl).string())
                    .col(ColumnDef::new(ProcessedChannels::PeaksUrl).string())
                    .col(ColumnDef::new(ProcessedChannels::FileSize).big_integer().not_null())
                    .col(ColumnDef::new(ProcessedChannels::DurationSeconds).double())
                    .col(
                        ColumnDef::new(ProcessedChannels::IsQuiet)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ProcessedChannels::IsSilent)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(self.create_timestamp_column(manager, ProcessedChannels::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_processed_channels_session_id")
                            .from(ProcessedChannels::Table, ProcessedChannels::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_pipeline_runs_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PipelineRuns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PipelineRuns::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PipelineRuns::SessionId).string().not_null())
                    .col(ColumnDef::new(PipelineRuns::ChannelNumber).integer())
                    .col(ColumnDef::new(PipelineRuns::StepName).string().not_null())
                    .col(ColumnDef::new(PipelineRuns::Status).string().not_null())
                    .col(self.create_nullable_timestamp_column(manager, PipelineRuns::StartedAt))
                    .col(self.create_nullable_timestamp_column(manager, PipelineRuns::CompletedAt))
                    .col(ColumnDef::new(PipelineRuns::DurationMs).big_integer())
                    .col(ColumnDef::new(PipelineRuns::InputSnapshot).text().not_null())
                    .col(ColumnDef::new(PipelineRuns::OutputSnapshot).text())
                    .col(ColumnDef::new(PipelineRuns::ErrorMessage).text())
                    .col(
                        ColumnDef::new(PipelineRuns::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(self.create_timestamp_column(manager, PipelineRuns::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pipeline_runs_session_id")
                            .from(PipelineRuns::Table, PipelineRuns::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_annotations_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Annotations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Annotations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Annotations::SessionId).string().not_null())
                    .col(ColumnDef::new(Annotations::ChannelNumber).integer())
                    .col(ColumnDef::new(Annotations::Body).text().not_null())
                    .col(self.create_timestamp_column(manager, Annotations::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_annotations_session_id")
                            .from(Annotations::Table, Annotations::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_channel_settings_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChannelSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChannelSettings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChannelSettings::SessionId).string().not_null())
                    .col(ColumnDef::new(ChannelSettings::ChannelNumber).integer().not_null())
                    .col(ColumnDef::new(ChannelSettings::Key).string().not_null())
                    .col(ColumnDef::new(ChannelSettings::Value).string().not_null())
                    .col(self.create_timestamp_column(manager, ChannelSettings::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_channel_settings_session_id")
                            .from(ChannelSettings::Table, ChannelSettings::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_recordings_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Recordings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Recordings::SessionId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Recordings::Title).string())
                    .col(ColumnDef::new(Recordings::Description).text())
                    .col(self.create_nullable_timestamp_column(manager, Recordings::RecordedAt))
                    .col(self.create_timestamp_column(manager, Recordings::CreatedAt))
                    .col(self.create_timestamp_column(manager, Recordings::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_recordings_session_id")
                            .from(Recordings::Table, Recordings::SessionId)
                            .to(Sessions::Table, Sessions::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_segments_unique")
                    .table(Segments::Table)
                    .col(Segments::SessionId)
                    .col(Segments::SegmentNumber)
                    .col(Segments::ChannelGroup)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_processed_channels_unique")
                    .table(ProcessedChannels::Table)
                    .col(ProcessedChannels::SessionId)
                    .col(ProcessedChannels::ChannelNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_channel_settings_unique")
                    .table(ChannelSettings::Table)
                    .col(ChannelSettings::SessionId)
                    .col(ChannelSettings::ChannelNumber)
                    .col(ChannelSettings::Key)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sessions_status")
                    .table(Sessions::Table)
                    .col(Sessions::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pipeline_runs_session_id")
                    .table(PipelineRuns::Table)
                    .col(PipelineRuns::SessionId)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Sessions {
    Table,
    Id,
    Status,
    SampleRate,
    Channels,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
    ProcessedAt,
}

#[derive(DeriveIden)]
enum Segments {
    Table,
    Id,
    SessionId,
    SegmentNumber,
    ChannelGroup,
    LocalPath,
    S3Key,
    FileSize,
    ReceivedAt,
}

#[derive(DeriveIden)]
enum ProcessedChannels {
    Table,
    Id,
    SessionId,
    ChannelNumber,
    LocalPath,
    S3Key,
    S3Url,
    HlsUrl,
    PeaksUrl,
    FileSize,
    DurationSeconds,
    IsQuiet,
    IsSilent,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PipelineRuns {
    Table,
    Id,
    SessionId,
    ChannelNumber,
    StepName,
    Status,
    StartedAt,
    CompletedAt,
    DurationMs,
    InputSnapshot,
    OutputSnapshot,
    ErrorMessage,
    RetryCount,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Annotations {
    Table,
    Id,
    SessionId,
    ChannelNumber,
    Body,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ChannelSettings {
    Table,
    Id,
    SessionId,
    ChannelNumber,
    Key,
    Value,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Recordings {
    Table,
    SessionId,
    Title,
    Description,
    RecordedAt,
    CreatedAt,
    UpdatedAt,
}
