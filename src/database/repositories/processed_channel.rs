//! SeaORM repository for the `processed_channels` table (§3, §4.5).

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;

use crate::database::entities::processed_channels;
use crate::errors::RepositoryError;

#[derive(Clone)]
pub struct ProcessedChannelRepository {
    connection: Arc<DatabaseConnection>,
}

/// Accumulated pipeline output for one channel, written/overwritten after
/// pipeline completion (§4.5, final paragraph).
#[derive(Debug, Clone, Default)]
pub struct ChannelOutcome {
    pub local_path: String,
    pub s3_key: Option<String>,
    pub s3_url: Option<String>,
    pub hls_url: Option<String>,
    pub peaks_url: Option<String>,
    pub file_size: i64,
    pub duration_seconds: Option<f64>,
    pub is_quiet: bool,
    pub is_silent: bool,
}

impl ProcessedChannelRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn find_one(
        &self,
        session_id: &str,
        channel_number: i32,
    ) -> Result<Option<processed_channels::Model>, RepositoryError> {
        processed_channels::Entity::find()
            .filter(processed_channels::Column::SessionId.eq(session_id))
            .filter(processed_channels::Column::ChannelNumber.eq(channel_number))
            .one(&*self.connection)
            .await
            .map_err(Into::into)
    }

    pub async fn upsert(
        &self,
        session_id: &str,
        channel_number: i32,
        outcome: ChannelOutcome,
    ) -> Result<processed_channels::Model, RepositoryError> {
        let now = Utc::now();
        if let Some(existing) = self.find_one(session_id, channel_number).await? {
            let mut active: processed_channels::ActiveModel = existing.into();
            active.local_path = Set(outcome.local_path);
            active.s3_key = Set(outcome.s3_key);
            active.s3_url = Set(outcome.s3_url);
            active.hls_url = Set(outcome.hls_url);
            active.peaks_url = Set(outcome.peaks_url);
            active.file_size = Set(outcome.file_size);
            active.duration_seconds = Set(outcome.duration_seconds);
            active.is_quiet = Set(outcome.is_quiet);
            active.is_silent = Set(outcome.is_silent);
            return Ok(active.update(&*self.connection).await?);
        }

        let active = processed_channels::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            session_id: Set(session_id.to_string()),
            channel_number: Set(channel_number),
            local_path: Set(outcome.local_path),
            s3_key: Set(outcome.s3_key),
            s3_url: Set(outcome.s3_url),
            hls_url: Set(outcome.hls_url),
            peaks_url: Set(outcome.peaks_url),
            file_size: Set(outcome.file_size),
            duration_seconds: Set(outcome.duration_seconds),
            is_quiet: Set(outcome.is_quiet),
            is_silent: Set(outcome.is_silent),
            created_at: Set(now),
        };
        Ok(active.insert(&*self.connection).await?)
    }

    pub async fn find_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<processed_channels::Model>, RepositoryError> {
        processed_channels::Entity::find()
            .filter(processed_channels::Column::SessionId.eq(session_id))
            .all(&*self.connection)
            .await
            .map_err(Into::into)
    }

    /// Cascade delete step (`/session/delete`, §6).
    pub async fn delete_by_session(&self, session_id: &str) -> Result<(), RepositoryError> {
        processed_channels::Entity::delete_many()
            .filter(processed_channels::Column::SessionId.eq(session_id))
            .exec(&*self.connection)
            .await?;
        Ok(())
    }
}
