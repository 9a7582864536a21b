//! `processed_channels` table (§3): the per-channel pipeline output.
//!
//! Uniqueness is enforced by a migration-level index on
//! `(session_id, channel_number)`.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "processed_channels")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub session_id: String,
    pub channel_number: i32,
    pub local_path: String,
    pub s3_key: Option<String>,
    pub s3_url: Option<String>,
    pub hls_url: Option<String>,
    pub peaks_url: Option<String>,
    pub file_size: i64,
    pub duration_seconds: Option<f64>,
    /// Peak amplitude below the configured quiet threshold.
    pub is_quiet: bool,
    /// Mean loudness below the configured (stricter) silence threshold.
    pub is_silent: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sessions::Entity",
        from = "Column::SessionId",
        to = "super::sessions::Column::Id"
    )]
    Session,
}

impl Related<super::sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
