use chrono::Utc;
use clinic_core::model::SessionId;
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{SessionStore, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl SessionStore for SqliteRepository {
    async fn get(&self) -> Result<Option<SessionId>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT session_id
                FROM autosave_session
                WHERE scope = ?1
            ",
        )
        .bind(self.scope())
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        match row {
            Some(row) => {
                let id: String = row.try_get("session_id").map_err(conn)?;
                id.parse::<SessionId>()
                    .map(Some)
                    .map_err(|e| StorageError::Serialization(e.to_string()))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, id: &SessionId) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO autosave_session (scope, session_id, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(scope) DO UPDATE SET
                    session_id = excluded.session_id,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(self.scope())
        .bind(id.as_str())
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query(
            r"
                DELETE FROM autosave_session
                WHERE scope = ?1
            ",
        )
        .bind(self.scope())
        .execute(self.pool())
        .await
        .map_err(conn)?;

        Ok(())
    }
}
