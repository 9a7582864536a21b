//! `segments` table (§3): one row per uploaded raw audio segment.

use sea_orm::entity::prelude::*;

/// Uniqueness is enforced by a migration-level index on
/// `(session_id, segment_number, channel_group)` (§3).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "segments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub session_id: String,
    pub segment_number: i32,
    /// `chAA-BB`, zero-padded 1-based endpoints (§4.7), or `unknown`.
    pub channel_group: String,
    pub local_path: String,
    pub s3_key: Option<String>,
    pub file_size: i64,
    pub received_at: DateTimeUtc,
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
