//! SeaORM repository for the `annotations` table (§6.1). CRUD only.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;

use crate::database::entities::annotations;
use crate::errors::RepositoryError;

#[derive(Clone)]
pub struct AnnotationRepository {
    connection: Arc<DatabaseConnection>,
}

impl AnnotationRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn create(
        &self,
        session_id: &str,
        channel_number: Option<i32>,
        body: &str,
    ) -> Result<annotations::Model, RepositoryError> {
        let active = annotations::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            session_id: Set(session_id.to_string()),
            channel_number: Set(channel_number),
            body: Set(body.to_string()),
            created_at: Set(Utc::now()),
        };
        Ok(active.insert(&*self.connection).await?)
    }

    pub async fn find_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<annotations::Model>, RepositoryError> {
        annotations::Entity::find()
            .filter(annotations::Column::SessionId.eq(session_id))
            .all(&*self.connection)
            .await
            .map_err(Into::into)
    }

    pub async fn delete(&self, id: i32) -> Result<(), RepositoryError> {
        annotations::Entity::delete_by_id(id)
            .exec(&*self.connection)
            .await?;
        Ok(())
    }
}
