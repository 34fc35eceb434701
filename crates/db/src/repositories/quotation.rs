use sqlx::{sqlite::SqliteRow, Row, Sqlite};

use tender_core::domain::invitation::{Invitation, InvitationId};
use tender_core::domain::quotation::{Currency, Quotation, QuotationId, QuotationStatus};
use tender_core::domain::request::RequestId;
use tender_core::domain::SupplierId;

use super::invitation::bind_invitation;
use super::{QuotationRepository, RepositoryError};
use crate::codec::{
    decode_decimal, decode_enum, decode_optional_timestamp, decode_timestamp, decode_u32,
    encode_timestamp,
};
use crate::DbPool;

pub(crate) const QUOTATION_COLUMNS: &str = "id, invitation_id, request_id, supplier_id,
    supplier_name, total_amount, currency, delivery_days, delivery_date, payment_terms,
    valid_until, notes, attachments_json, status, is_winner, is_reselection,
    submitted_at, selected_at, updated_at";

const UPSERT_QUOTATION: &str = "INSERT INTO quotation (
        id, invitation_id, request_id, supplier_id, supplier_name, total_amount,
        currency, delivery_days, delivery_date, payment_terms, valid_until, notes,
        attachments_json, status, is_winner, is_reselection, submitted_at,
        selected_at, updated_at
     ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
     ON CONFLICT(id) DO UPDATE SET
        supplier_name = excluded.supplier_name,
        total_amount = excluded.total_amount,
        currency = excluded.currency,
        delivery_days = excluded.delivery_days,
        delivery_date = excluded.delivery_date,
        payment_terms = excluded.payment_terms,
        valid_until = excluded.valid_until,
        notes = excluded.notes,
        attachments_json = excluded.attachments_json,
        status = excluded.status,
        is_winner = excluded.is_winner,
        is_reselection = excluded.is_reselection,
        selected_at = excluded.selected_at,
        updated_at = excluded.updated_at";

const UPDATE_SUPPLIER_EDIT: &str = "UPDATE quotation
     SET supplier_name = ?, total_amount = ?, currency = ?, delivery_days = ?,
         delivery_date = ?, payment_terms = ?, valid_until = ?, notes = ?,
         attachments_json = ?, status = ?, updated_at = ?
     WHERE id = ? AND status = ?";

pub struct SqlQuotationRepository {
    pool: DbPool,
}

impl SqlQuotationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn encode_attachments(quotation: &Quotation) -> Result<String, RepositoryError> {
    serde_json::to_string(&quotation.attachments)
        .map_err(|error| RepositoryError::Decode(format!("attachments_json: {error}")))
}

fn bind_quotation(
    quotation: &Quotation,
) -> Result<sqlx::query::Query<'_, Sqlite, sqlx::sqlite::SqliteArguments<'_>>, RepositoryError> {
    let attachments = encode_attachments(quotation)?;

    Ok(sqlx::query(UPSERT_QUOTATION)
        .bind(quotation.id.0.as_str())
        .bind(quotation.invitation_id.0.as_str())
        .bind(quotation.request_id.0.as_str())
        .bind(quotation.supplier_id.0.as_str())
        .bind(quotation.supplier_name.as_str())
        .bind(quotation.total_amount.to_string())
        .bind(quotation.currency.as_str())
        .bind(i64::from(quotation.delivery_days))
        .bind(encode_timestamp(&quotation.delivery_date))
        .bind(quotation.payment_terms.as_str())
        .bind(encode_timestamp(&quotation.valid_until))
        .bind(quotation.notes.as_deref())
        .bind(attachments)
        .bind(quotation.status.as_str())
        .bind(quotation.is_winner)
        .bind(quotation.is_reselection)
        .bind(encode_timestamp(&quotation.submitted_at))
        .bind(quotation.selected_at.as_ref().map(encode_timestamp))
        .bind(encode_timestamp(&quotation.updated_at)))
}

pub(crate) fn quotation_from_row(row: &SqliteRow) -> Result<Quotation, RepositoryError> {
    let total_amount: String = row.try_get("total_amount")?;
    let currency: String = row.try_get("currency")?;
    let status: String = row.try_get("status")?;
    let attachments_json: String = row.try_get("attachments_json")?;
    let delivery_date: String = row.try_get("delivery_date")?;
    let valid_until: String = row.try_get("valid_until")?;
    let submitted_at: String = row.try_get("submitted_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let attachments = serde_json::from_str(&attachments_json)
        .map_err(|error| RepositoryError::Decode(format!("attachments_json: {error}")))?;

    Ok(Quotation {
        id: QuotationId(row.try_get("id")?),
        invitation_id: InvitationId(row.try_get("invitation_id")?),
        request_id: RequestId(row.try_get("request_id")?),
        supplier_id: SupplierId(row.try_get("supplier_id")?),
        supplier_name: row.try_get("supplier_name")?,
        total_amount: decode_decimal("total_amount", &total_amount)?,
        currency: decode_enum("currency", &currency, Currency::parse)?,
        delivery_days: decode_u32("delivery_days", row.try_get("delivery_days")?)?,
        delivery_date: decode_timestamp("delivery_date", &delivery_date)?,
        payment_terms: row.try_get("payment_terms")?,
        valid_until: decode_timestamp("valid_until", &valid_until)?,
        notes: row.try_get("notes")?,
        attachments,
        status: decode_enum("status", &status, QuotationStatus::parse)?,
        is_winner: row.try_get("is_winner")?,
        is_reselection: row.try_get("is_reselection")?,
        ranking_score: None,
        submitted_at: decode_timestamp("submitted_at", &submitted_at)?,
        selected_at: decode_optional_timestamp("selected_at", row.try_get("selected_at")?)?,
        updated_at: decode_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl QuotationRepository for SqlQuotationRepository {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTATION_COLUMNS} FROM quotation WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(quotation_from_row).transpose()
    }

    async fn find_by_invitation(
        &self,
        invitation_id: &InvitationId,
    ) -> Result<Option<Quotation>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotation
             WHERE invitation_id = ?
             ORDER BY submitted_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(&invitation_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(quotation_from_row).transpose()
    }

    async fn save(&self, quotation: Quotation) -> Result<(), RepositoryError> {
        bind_quotation(&quotation)?.execute(&self.pool).await?;
        Ok(())
    }

    async fn save_with_invitation(
        &self,
        quotation: Quotation,
        invitation: Invitation,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        bind_quotation(&quotation)?.execute(&mut *tx).await?;
        bind_invitation(&invitation).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save_supplier_edit(
        &self,
        quotation: &Quotation,
        expected: QuotationStatus,
        invitation: Option<&Invitation>,
    ) -> Result<bool, RepositoryError> {
        let attachments = encode_attachments(quotation)?;
        let mut tx = self.pool.begin().await?;

        let written = sqlx::query(UPDATE_SUPPLIER_EDIT)
            .bind(quotation.supplier_name.as_str())
            .bind(quotation.total_amount.to_string())
            .bind(quotation.currency.as_str())
            .bind(i64::from(quotation.delivery_days))
            .bind(encode_timestamp(&quotation.delivery_date))
            .bind(quotation.payment_terms.as_str())
            .bind(encode_timestamp(&quotation.valid_until))
            .bind(quotation.notes.as_deref())
            .bind(attachments)
            .bind(quotation.status.as_str())
            .bind(encode_timestamp(&quotation.updated_at))
            .bind(quotation.id.0.as_str())
            .bind(expected.as_str())
            .execute(&mut *tx)
            .await?;
        if written.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(invitation) = invitation {
            bind_invitation(invitation).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn list_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Quotation>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotation
             WHERE request_id = ?
             ORDER BY submitted_at DESC, id DESC"
        ))
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(quotation_from_row).collect()
    }

    async fn list_by_supplier(
        &self,
        supplier_id: &SupplierId,
    ) -> Result<Vec<Quotation>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotation
             WHERE supplier_id = ?
             ORDER BY submitted_at DESC, id DESC"
        ))
        .bind(&supplier_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(quotation_from_row).collect()
    }
}
