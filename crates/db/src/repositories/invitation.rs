use sqlx::{sqlite::SqliteRow, Row, Sqlite};

use tender_core::domain::invitation::{Invitation, InvitationId, InvitationStatus};
use tender_core::domain::quotation::QuotationId;
use tender_core::domain::request::RequestId;
use tender_core::domain::SupplierId;

use super::{InvitationRepository, RepositoryError};
use crate::codec::{decode_enum, decode_optional_timestamp, decode_timestamp, encode_timestamp};
use crate::DbPool;

const INVITATION_COLUMNS: &str = "id, request_id, supplier_id, manager_id, status, due_date,
    message, delivery_address, quotation_id, created_at, viewed_at";

const UPSERT_INVITATION: &str = "INSERT INTO invitation (
        id, request_id, supplier_id, manager_id, status, due_date,
        message, delivery_address, quotation_id, created_at, viewed_at
     ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
     ON CONFLICT(id) DO UPDATE SET
        status = excluded.status,
        due_date = excluded.due_date,
        message = excluded.message,
        delivery_address = excluded.delivery_address,
        quotation_id = excluded.quotation_id,
        viewed_at = excluded.viewed_at";

pub struct SqlInvitationRepository {
    pool: DbPool,
}

impl SqlInvitationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Binds an invitation to the shared upsert statement.
pub(crate) fn bind_invitation<'q>(
    invitation: &'q Invitation,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    sqlx::query(UPSERT_INVITATION)
        .bind(invitation.id.0.as_str())
        .bind(invitation.request_id.0.as_str())
        .bind(invitation.supplier_id.0.as_str())
        .bind(invitation.manager_id.as_str())
        .bind(invitation.status.as_str())
        .bind(encode_timestamp(&invitation.due_date))
        .bind(invitation.message.as_deref())
        .bind(invitation.delivery_address.as_deref())
        .bind(invitation.quotation_id.as_ref().map(|id| id.0.as_str()))
        .bind(encode_timestamp(&invitation.created_at))
        .bind(invitation.viewed_at.as_ref().map(encode_timestamp))
}

fn invitation_from_row(row: &SqliteRow) -> Result<Invitation, RepositoryError> {
    let status: String = row.try_get("status")?;
    let due_date: String = row.try_get("due_date")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Invitation {
        id: InvitationId(row.try_get("id")?),
        request_id: RequestId(row.try_get("request_id")?),
        supplier_id: SupplierId(row.try_get("supplier_id")?),
        manager_id: row.try_get("manager_id")?,
        status: decode_enum("status", &status, InvitationStatus::parse)?,
        due_date: decode_timestamp("due_date", &due_date)?,
        message: row.try_get("message")?,
        delivery_address: row.try_get("delivery_address")?,
        quotation_id: row.try_get::<Option<String>, _>("quotation_id")?.map(QuotationId),
        created_at: decode_timestamp("created_at", &created_at)?,
        viewed_at: decode_optional_timestamp("viewed_at", row.try_get("viewed_at")?)?,
    })
}

#[async_trait::async_trait]
impl InvitationRepository for SqlInvitationRepository {
    async fn find_by_id(&self, id: &InvitationId) -> Result<Option<Invitation>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {INVITATION_COLUMNS} FROM invitation WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(invitation_from_row).transpose()
    }

    async fn save(&self, invitation: Invitation) -> Result<(), RepositoryError> {
        bind_invitation(&invitation).execute(&self.pool).await?;
        Ok(())
    }

    async fn save_all(&self, invitations: Vec<Invitation>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for invitation in &invitations {
            bind_invitation(invitation).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Invitation>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitation
             WHERE request_id = ?
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(invitation_from_row).collect()
    }

    async fn list_by_supplier(
        &self,
        supplier_id: &SupplierId,
    ) -> Result<Vec<Invitation>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitation
             WHERE supplier_id = ?
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(&supplier_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(invitation_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use tender_core::domain::invitation::{Invitation, InvitationId, InvitationStatus};
    use tender_core::domain::request::{ProcurementRequest, RequestId};
    use tender_core::domain::SupplierId;

    use super::SqlInvitationRepository;
    use crate::repositories::{InvitationRepository, RequestRepository, SqlRequestRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlRequestRepository::new(pool.clone())
            .save(ProcurementRequest::new(
                RequestId("REQ-1".to_string()),
                "Steel beams",
                "user-1",
                Utc::now(),
            ))
            .await
            .expect("seed request");
        pool
    }

    fn invitation(id: &str, supplier: &str, offset_secs: i64) -> Invitation {
        let created_at = Utc::now() + Duration::seconds(offset_secs);
        Invitation {
            id: InvitationId(id.to_string()),
            request_id: RequestId("REQ-1".to_string()),
            supplier_id: SupplierId(supplier.to_string()),
            manager_id: "manager-1".to_string(),
            status: InvitationStatus::Pending,
            due_date: created_at + Duration::days(7),
            message: Some("Please quote".to_string()),
            delivery_address: None,
            quotation_id: None,
            created_at,
            viewed_at: None,
        }
    }

    #[tokio::test]
    async fn save_all_persists_batch_newest_first() {
        let pool = setup().await;
        let repo = SqlInvitationRepository::new(pool);

        repo.save_all(vec![
            invitation("INV-1", "SUP-1", 0),
            invitation("INV-2", "SUP-2", 1),
            invitation("INV-3", "SUP-1", 2),
        ])
        .await
        .expect("save batch");

        let by_request =
            repo.list_by_request(&RequestId("REQ-1".to_string())).await.expect("list");
        let ids: Vec<&str> = by_request.iter().map(|inv| inv.id.0.as_str()).collect();
        assert_eq!(ids, vec!["INV-3", "INV-2", "INV-1"]);

        let by_supplier =
            repo.list_by_supplier(&SupplierId("SUP-1".to_string())).await.expect("list");
        assert_eq!(by_supplier.len(), 2);
        assert_eq!(by_supplier[0].id.0, "INV-3");
    }

    #[tokio::test]
    async fn save_all_rolls_back_when_one_row_fails() {
        let pool = setup().await;
        let repo = SqlInvitationRepository::new(pool);

        let mut orphan = invitation("INV-2", "SUP-2", 1);
        orphan.request_id = RequestId("REQ-MISSING".to_string());

        let result = repo.save_all(vec![invitation("INV-1", "SUP-1", 0), orphan]).await;
        assert!(result.is_err());
        assert!(repo.find_by_id(&InvitationId("INV-1".to_string())).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn save_updates_status_and_viewed_at() {
        let pool = setup().await;
        let repo = SqlInvitationRepository::new(pool);
        let mut inv = invitation("INV-1", "SUP-1", 0);
        repo.save(inv.clone()).await.expect("insert");

        inv.mark_viewed(Utc::now()).expect("view");
        repo.save(inv.clone()).await.expect("update");

        let found = repo.find_by_id(&inv.id).await.expect("find").expect("exists");
        assert_eq!(found, inv);
    }
}
