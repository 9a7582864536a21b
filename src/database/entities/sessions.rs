//! `sessions` table (§3): the recording session lifecycle root.

use sea_orm::entity::prelude::*;
use sea_orm_migration::sea_query::StringLen;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Opaque, client-supplied session id.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub status: SessionStatus,
    pub sample_rate: i32,
    pub channels: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
    pub processed_at: Option<DateTimeUtc>,
}

/// Session lifecycle status (§3). Invariant: `completed_at` non-null iff the
/// session ever reached `Complete`; `processed_at` non-null iff it ever
/// reached `Processed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize,
    utoipa::ToSchema, DeriveActiveEnum, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum SessionStatus {
    #[sea_orm(string_value = "receiving")]
    Receiving,
    #[sea_orm(string_value = "complete")]
    Complete,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "processed")]
    Processed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Receiving => "receiving",
            SessionStatus::Complete => "complete",
            SessionStatus::Processing => "processing",
            SessionStatus::Processed => "processed",
            SessionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::segments::Entity")]
    Segments,
    #[sea_orm(has_many = "super::processed_channels::Entity")]
    ProcessedChannels,
    #[sea_orm(has_many = "super::pipeline_runs::Entity")]
    PipelineRuns,
    #[sea_orm(has_many = "super::annotations::Entity")]
    Annotations,
    #[sea_orm(has_many = "super::channel_settings::Entity")]
    ChannelSettings,
    #[sea_orm(has_one = "super::recordings::Entity")]
    Recording,
}

impl Related<super::segments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Segments.def()
    }
}

impl Related<super::processed_channels::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProcessedChannels.def()
    }
}

impl Related<super::pipeline_runs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PipelineRuns.def()
    }
}

impl Related<super::annotations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Annotations.def()
    }
}

impl Related<super::channel_settings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChannelSettings.def()
    }
}

impl Related<super::recordings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recording.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
