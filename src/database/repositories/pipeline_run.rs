//! SeaORM repository for the `pipeline_runs` table (§3, §4.4).

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;

use crate::database::entities::pipeline_runs::{self, PipelineRunStatus};
use crate::errors::RepositoryError;

#[derive(Clone)]
pub struct PipelineRunRepository {
    connection: Arc<DatabaseConnection>,
}

impl PipelineRunRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Runner step 1: insert with `status=pending`.
    pub async fn start(
        &self,
        session_id: &str,
        channel_number: Option<i32>,
        step_name: &str,
        input_snapshot: String,
    ) -> Result<pipeline_runs::Model, RepositoryError> {
        let now = Utc::now();
        let active = pipeline_runs::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            session_id: Set(session_id.to_string()),
            channel_number: Set(channel_number),
            step_name: Set(step_name.to_string()),
            status: Set(PipelineRunStatus::Pending),
            started_at: Set(None),
            completed_at: Set(None),
            duration_ms: Set(None),
            input_snapshot: Set(input_snapshot),
            output_snapshot: Set(None),
            error_message: Set(None),
            retry_count: Set(0),
            created_at: Set(now),
        };
        Ok(active.insert(&*self.connection).await?)
    }

    pub async fn mark_running(&self, id: i32) -> Result<(), RepositoryError> {
        let model = self.require(id).await?;
        let mut active: pipeline_runs::ActiveModel = model.into();
        active.status = Set(PipelineRunStatus::Running);
        active.started_at = Set(Some(Utc::now()));
        active.update(&*self.connection).await?;
        Ok(())
    }

    pub async fn mark_skipped(&self, id: i32, reason: &str) -> Result<(), RepositoryError> {
        let model = self.require(id).await?;
        let mut active: pipeline_runs::ActiveModel = model.into();
        active.status = Set(PipelineRunStatus::Skipped);
        active.output_snapshot = Set(Some(reason.to_string()));
        active.completed_at = Set(Some(Utc::now()));
        active.update(&*self.connection).await?;
        Ok(())
    }

    pub async fn mark_completed(
        &self,
        id: i32,
        output_snapshot: String,
        duration_ms: i64,
    ) -> Result<(), RepositoryError> {
        let model = self.require(id).await?;
        let mut active: pipeline_runs::ActiveModel = model.into();
        active.status = Set(PipelineRunStatus::Completed);
        active.output_snapshot = Set(Some(output_snapshot));
        active.duration_ms = Set(Some(duration_ms));
        active.completed_at = Set(Some(Utc::now()));
        active.update(&*self.connection).await?;
        Ok(())
    }

    /// Retry loop: bump `retry_count`, cycle back to `pending` (§4.4 step 5).
    pub async fn mark_retry(&self, id: i32) -> Result<(), RepositoryError> {
        let model = self.require(id).await?;
        let mut active: pipeline_runs::ActiveModel = model.into();
        let next_count = *active.retry_count.as_ref() + 1;
        active.retry_count = Set(next_count);
        active.status = Set(PipelineRunStatus::Pending);
        active.update(&*self.connection).await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: i32, error_message: &str) -> Result<(), RepositoryError> {
        let model = self.require(id).await?;
        let mut active: pipeline_runs::ActiveModel = model.into();
        active.status = Set(PipelineRunStatus::Failed);
        active.error_message = Set(Some(error_message.to_string()));
        active.completed_at = Set(Some(Utc::now()));
        active.update(&*self.connection).await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<pipeline_runs::Model>, RepositoryError> {
        pipeline_runs::Entity::find_by_id(id)
            .one(&*self.connection)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<pipeline_runs::Model>, RepositoryError> {
        use sea_orm::QueryOrder;
        pipeline_runs::Entity::find()
            .filter(pipeline_runs::Column::SessionId.eq(session_id))
            .order_by_desc(pipeline_runs::Column::CreatedAt)
            .all(&*self.connection)
            .await
            .map_err(Into::into)
    }

    /// Cascade delete step (`/session/delete`, §6): pipeline_runs is the
    /// first table removed in dependency order.
    pub async fn delete_by_session(&self, session_id: &str) -> Result<(), RepositoryError> {
        pipeline_runs::Entity::delete_many()
            .filter(pipeline_runs::Column::SessionId.eq(session_id))
            .exec(&*self.connection)
            .await?;
        Ok(())
    }

    async fn require(&self, id: i32) -> Result<pipeline_runs::Model, RepositoryError> {
        self.find_by_id(id).await?.ok_or_else(|| RepositoryError::RecordNotFound {
            table: "pipeline_runs".into(),
            field: "id".into(),
            value: id.to_string(),
        })
    }
}
