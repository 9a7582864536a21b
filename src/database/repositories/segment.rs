//! SeaORM repository for the `segments` table (§3, §4.1).

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;

use crate::database::entities::segments;
use crate::errors::RepositoryError;

#[derive(Clone)]
pub struct SegmentRepository {
    connection: Arc<DatabaseConnection>,
}

pub struct NewSegment {
    pub session_id: String,
    pub segment_number: i32,
    pub channel_group: String,
    pub local_path: String,
    pub file_size: i64,
}

impl SegmentRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Insert, or replace on the `(session_id, segment_number, channel_group)`
    /// unique key (§4.1 step 5 — sender retry is an idempotent overwrite).
    pub async fn upsert(&self, new: NewSegment) -> Result<segments::Model, RepositoryError> {
        let existing = segments::Entity::find()
            .filter(segments::Column::SessionId.eq(new.session_id.clone()))
            .filter(segments::Column::SegmentNumber.eq(new.segment_number))
            .filter(segments::Column::ChannelGroup.eq(new.channel_group.clone()))
            .one(&*self.connection)
            .await?;

        let now = Utc::now();
        if let Some(existing) = existing {
            let mut active: segments::ActiveModel = existing.into();
            active.local_path = Set(new.local_path);
            active.file_size = Set(new.file_size);
            active.received_at = Set(now);
            active.s3_key = Set(None);
            return Ok(active.update(&*self.connection).await?);
        }

        let active = segments::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            session_id: Set(new.session_id),
            segment_number: Set(new.segment_number),
            channel_group: Set(new.channel_group),
            local_path: Set(new.local_path),
            s3_key: Set(None),
            file_size: Set(new.file_size),
            received_at: Set(now),
        };
        Ok(active.insert(&*self.connection).await?)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<segments::Model>, RepositoryError> {
        segments::Entity::find_by_id(id)
            .one(&*self.connection)
            .await
            .map_err(Into::into)
    }

    pub async fn set_s3_key(&self, id: i32, s3_key: &str) -> Result<(), RepositoryError> {
        let Some(model) = self.find_by_id(id).await? else {
            return Err(RepositoryError::RecordNotFound {
                table: "segments".into(),
                field: "id".into(),
                value: id.to_string(),
            });
        };
        let mut active: segments::ActiveModel = model.into();
        active.s3_key = Set(Some(s3_key.to_string()));
        active.update(&*self.connection).await?;
        Ok(())
    }

    pub async fn find_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<segments::Model>, RepositoryError> {
        segments::Entity::find()
            .filter(segments::Column::SessionId.eq(session_id))
            .all(&*self.connection)
            .await
            .map_err(Into::into)
    }

    /// Segments carrying channel group `group_name` for a session, ordered by
    /// segment number (§4.5 step 1 `prefetch-flac`).
    /// Cascade delete step (`/session/delete`, §6).
    pub async fn delete_by_session(&self, session_id: &str) -> Result<(), RepositoryError> {
        segments::Entity::delete_many()
            .filter(segments::Column::SessionId.eq(session_id))
            .exec(&*self.connection)
            .await?;
        Ok(())
    }

    pub async fn find_by_session_and_group(
        &self,
        session_id: &str,
        group_name: &str,
    ) -> Result<Vec<segments::Model>, RepositoryError> {
        use sea_orm::QueryOrder;
        segments::Entity::find()
            .filter(segments::Column::SessionId.eq(session_id))
            .filter(segments::Column::ChannelGroup.eq(group_name))
            .order_by_asc(segments::Column::SegmentNumber)
            .all(&*self.connection)
            .await
            .map_err(Into::into)
    }
}
