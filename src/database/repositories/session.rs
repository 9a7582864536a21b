//! SeaORM repository for the `sessions` table (§3, §4.3).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;

use crate::database::entities::sessions::{self, SessionStatus};
use crate::errors::RepositoryError;

#[derive(Clone)]
pub struct SessionRepository {
    connection: Arc<DatabaseConnection>,
}

impl SessionRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Upsert on first sight: creates with `receiving` status if absent,
    /// otherwise is a no-op on status (§4.1 step 3).
    pub async fn upsert_receiving(
        &self,
        session_id: &str,
        sample_rate: i32,
        channels: i32,
    ) -> Result<sessions::Model, RepositoryError> {
        if let Some(existing) = self.find_by_id(session_id).await? {
            return Ok(existing);
        }
        let now = Utc::now();
        let active = sessions::ActiveModel {
            id: Set(session_id.to_string()),
            status: Set(SessionStatus::Receiving),
            sample_rate: Set(sample_rate),
            channels: Set(channels),
            created_at: Set(now),
            updated_at: Set(now),
            completed_at: Set(None),
            processed_at: Set(None),
        };
        Ok(active.insert(&*self.connection).await?)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<sessions::Model>, RepositoryError> {
        sessions::Entity::find_by_id(id)
            .one(&*self.connection)
            .await
            .map_err(Into::into)
    }

    /// Refresh `updated_at` on every segment (§4.1 step 6).
    pub async fn touch(&self, id: &str) -> Result<(), RepositoryError> {
        let Some(model) = self.find_by_id(id).await? else {
            return Err(RepositoryError::RecordNotFound {
                table: "sessions".into(),
                field: "id".into(),
                value: id.into(),
            });
        };
        let mut active: sessions::ActiveModel = model.into();
        active.updated_at = Set(Utc::now());
        active.update(&*self.connection).await?;
        Ok(())
    }

    pub async fn set_status(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<sessions::Model, RepositoryError> {
        let Some(model) = self.find_by_id(id).await? else {
            return Err(RepositoryError::RecordNotFound {
                table: "sessions".into(),
                field: "id".into(),
                value: id.into(),
            });
        };
        let now = Utc::now();
        let mut active: sessions::ActiveModel = model.into();
        active.status = Set(status);
        active.updated_at = Set(now);
        match status {
            SessionStatus::Complete => active.completed_at = Set(Some(now)),
            SessionStatus::Processed => active.processed_at = Set(Some(now)),
            _ => {}
        }
        Ok(active.update(&*self.connection).await?)
    }

    /// Conditional transition: updates the row only if it is still `from`,
    /// keying success on rows-affected rather than a prior read, so two
    /// concurrent callers racing the same transition can't both succeed
    /// (§4.3 "exactly one caller completes a session").
    pub async fn try_transition(&self, id: &str, from: SessionStatus, to: SessionStatus) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        let mut active = sessions::ActiveModel {
            status: Set(to),
            updated_at: Set(now),
            ..Default::default()
        };
        match to {
            SessionStatus::Complete => active.completed_at = Set(Some(now)),
            SessionStatus::Processed => active.processed_at = Set(Some(now)),
            _ => {}
        }

        let result = sessions::Entity::update_many()
            .set(active)
            .filter(sessions::Column::Id.eq(id))
            .filter(sessions::Column::Status.eq(from))
            .exec(&*self.connection)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Sessions still `receiving` whose `updated_at` predates the timeout
    /// cutoff (§4.3 step 2).
    pub async fn find_timed_out_receiving(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<sessions::Model>, RepositoryError> {
        sessions::Entity::find()
            .filter(sessions::Column::Status.eq(SessionStatus::Receiving))
            .filter(sessions::Column::UpdatedAt.lt(cutoff))
            .all(&*self.connection)
            .await
            .map_err(Into::into)
    }

    /// Sessions stuck `complete` at startup, for recovery (§4.3 step 1).
    pub async fn find_complete(&self) -> Result<Vec<sessions::Model>, RepositoryError> {
        sessions::Entity::find()
            .filter(sessions::Column::Status.eq(SessionStatus::Complete))
            .all(&*self.connection)
            .await
            .map_err(Into::into)
    }

    pub async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        sessions::Entity::delete_by_id(id)
            .exec(&*self.connection)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn mock_repo(db: DatabaseConnection) -> SessionRepository {
        SessionRepository::new(Arc::new(db))
    }

    #[tokio::test]
    async fn upsert_receiving_returns_existing_without_duplicate_insert() {
        let now = Utc::now();
        let existing = sessions::Model {
            id: "session_1".into(),
            status: SessionStatus::Receiving,
            sample_rate: 48000,
            channels: 18,
            created_at: now,
            updated_at: now,
            completed_at: None,
            processed_at: None,
        };
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([[existing.clone()]])
            .into_connection();
        let repo = mock_repo(db);
        let result = repo.upsert_receiving("session_1", 48000, 18).await.unwrap();
        assert_eq!(result.id, "session_1");
        assert_eq!(result.status, SessionStatus::Receiving);
    }
}
