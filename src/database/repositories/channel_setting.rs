//! SeaORM repository for the `channel_settings` table (§6.1).

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;

use crate::database::entities::channel_settings;
use crate::errors::RepositoryError;

#[derive(Clone)]
pub struct ChannelSettingRepository {
    connection: Arc<DatabaseConnection>,
}

impl ChannelSettingRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Unique on `(session_id, channel_number, key)`; a repeated write
    /// overwrites the value.
    pub async fn set(
        &self,
        session_id: &str,
        channel_number: i32,
        key: &str,
        value: &str,
    ) -> Result<channel_settings::Model, RepositoryError> {
        let existing = channel_settings::Entity::find()
            .filter(channel_settings::Column::SessionId.eq(session_id))
            .filter(channel_settings::Column::ChannelNumber.eq(channel_number))
            .filter(channel_settings::Column::Key.eq(key))
            .one(&*self.connection)
            .await?;

        let now = Utc::now();
        if let Some(existing) = existing {
            let mut active: channel_settings::ActiveModel = existing.into();
            active.value = Set(value.to_string());
            active.updated_at = Set(now);
            return Ok(active.update(&*self.connection).await?);
        }

        let active = channel_settings::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            session_id: Set(session_id.to_string()),
            channel_number: Set(channel_number),
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(now),
        };
        Ok(active.insert(&*self.connection).await?)
    }

    /// Consulted by `normalize-audio` for a manual gain override, falling
    /// back to config defaults when absent (§6.1).
    pub async fn get(
        &self,
        session_id: &str,
        channel_number: i32,
        key: &str,
    ) -> Result<Option<channel_settings::Model>, RepositoryError> {
        channel_settings::Entity::find()
            .filter(channel_settings::Column::SessionId.eq(session_id))
            .filter(channel_settings::Column::ChannelNumber.eq(channel_number))
            .filter(channel_settings::Column::Key.eq(key))
            .one(&*self.connection)
            .await
            .map_err(Into::into)
    }

    pub async fn delete(&self, id: i32) -> Result<(), RepositoryError> {
        channel_settings::Entity::delete_by_id(id)
            .exec(&*self.connection)
            .await?;
        Ok(())
    }
}
