use chrono::{DateTime, Utc};
use sqlx::Row;

use tender_core::notify::{Notification, NotificationType, RelatedType};

use super::{NotificationRepository, RepositoryError};
use crate::codec::{decode_enum, decode_timestamp, encode_timestamp};
use crate::DbPool;

/// A notification row as persisted for its recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredNotification {
    pub id: String,
    pub notification: Notification,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn append(&self, notification: &Notification) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO notification (
                id, user_id, kind, title, message, related_id, related_type, is_read, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(format!("NTF-{}", uuid::Uuid::new_v4()))
        .bind(&notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.related_id)
        .bind(notification.related_type.as_str())
        .bind(encode_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<StoredNotification>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, kind, title, message, related_id, related_type, is_read, created_at
             FROM notification
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<StoredNotification, RepositoryError> {
                let kind: String = row.try_get("kind")?;
                let related_type: String = row.try_get("related_type")?;
                let created_at: String = row.try_get("created_at")?;
                Ok(StoredNotification {
                    id: row.try_get("id")?,
                    notification: Notification {
                        user_id: row.try_get("user_id")?,
                        kind: decode_enum("kind", &kind, NotificationType::parse)?,
                        title: row.try_get("title")?,
                        message: row.try_get("message")?,
                        related_id: row.try_get("related_id")?,
                        related_type: decode_enum(
                            "related_type",
                            &related_type,
                            RelatedType::parse,
                        )?,
                    },
                    is_read: row.try_get("is_read")?,
                    created_at: decode_timestamp("created_at", &created_at)?,
                })
            })
            .collect()
    }
}
