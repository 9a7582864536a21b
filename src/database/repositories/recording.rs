//! SeaORM repository for the `recordings` table (§6.1), 1:1 with Session.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;

use crate::database::entities::recordings;
use crate::errors::RepositoryError;

#[derive(Clone)]
pub struct RecordingRepository {
    connection: Arc<DatabaseConnection>,
}

impl RecordingRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn find_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<recordings::Model>, RepositoryError> {
        recordings::Entity::find_by_id(session_id)
            .one(&*self.connection)
            .await
            .map_err(Into::into)
    }

    pub async fn upsert(
        &self,
        session_id: &str,
        title: Option<String>,
        description: Option<String>,
        recorded_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<recordings::Model, RepositoryError> {
        let now = Utc::now();
        if let Some(existing) = self.find_by_session(session_id).await? {
            let mut active: recordings::ActiveModel = existing.into();
            active.title = Set(title);
            active.description = Set(description);
            active.recorded_at = Set(recorded_at);
            active.updated_at = Set(now);
            return Ok(active.update(&*self.connection).await?);
        }

        let active = recordings::ActiveModel {
            session_id: Set(session_id.to_string()),
            title: Set(title),
            description: Set(description),
            recorded_at: Set(recorded_at),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(active.insert(&*self.connection).await?)
    }

    /// Cascade delete step (`/session/delete`, §6): recordings is 1:1 with
    /// sessions, so this is a delete-by-primary-key.
    pub async fn delete_by_session(&self, session_id: &str) -> Result<(), RepositoryError> {
        recordings::Entity::delete_by_id(session_id).exec(&*self.connection).await?;
        Ok(())
    }
}
