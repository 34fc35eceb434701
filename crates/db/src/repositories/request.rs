use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use tender_core::domain::quotation::{Currency, QuotationId};
use tender_core::domain::request::{ProcurementRequest, RequestId, RequestStatus};
use tender_core::domain::SupplierId;

use super::{RepositoryError, RequestRepository};
use crate::codec::{
    decode_decimal, decode_enum, decode_optional_timestamp, decode_timestamp, decode_u32,
    encode_timestamp,
};
use crate::DbPool;

pub(crate) const REQUEST_COLUMNS: &str = "id, title, requester_id, requester_email, status,
    due_date, winner_id, winner_quotation_id, winner_amount, winner_currency,
    winner_delivery_days, previous_winner_id, revocation_reason, adjudicated_at,
    created_at, updated_at";

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn request_from_row(row: &SqliteRow) -> Result<ProcurementRequest, RepositoryError> {
    let status: String = row.try_get("status")?;
    let winner_amount: Option<String> = row.try_get("winner_amount")?;
    let winner_currency: Option<String> = row.try_get("winner_currency")?;
    let winner_delivery_days: Option<i64> = row.try_get("winner_delivery_days")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(ProcurementRequest {
        id: RequestId(row.try_get("id")?),
        title: row.try_get("title")?,
        requester_id: row.try_get("requester_id")?,
        requester_email: row.try_get("requester_email")?,
        status: decode_enum("status", &status, RequestStatus::parse)?,
        due_date: decode_optional_timestamp("due_date", row.try_get("due_date")?)?,
        winner_id: row.try_get::<Option<String>, _>("winner_id")?.map(SupplierId),
        winner_quotation_id: row
            .try_get::<Option<String>, _>("winner_quotation_id")?
            .map(QuotationId),
        winner_amount: winner_amount
            .map(|value| decode_decimal("winner_amount", &value))
            .transpose()?,
        winner_currency: winner_currency
            .map(|value| decode_enum("winner_currency", &value, Currency::parse))
            .transpose()?,
        winner_delivery_days: winner_delivery_days
            .map(|value| decode_u32("winner_delivery_days", value))
            .transpose()?,
        previous_winner_id: row.try_get::<Option<String>, _>("previous_winner_id")?.map(SupplierId),
        revocation_reason: row.try_get("revocation_reason")?,
        adjudicated_at: decode_optional_timestamp(
            "adjudicated_at",
            row.try_get("adjudicated_at")?,
        )?,
        created_at: decode_timestamp("created_at", &created_at)?,
        updated_at: decode_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<ProcurementRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM procurement_request WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(request_from_row).transpose()
    }

    async fn save(&self, request: ProcurementRequest) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO procurement_request (
                id, title, requester_id, requester_email, status, due_date,
                winner_id, winner_quotation_id, winner_amount, winner_currency,
                winner_delivery_days, previous_winner_id, revocation_reason,
                adjudicated_at, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                requester_id = excluded.requester_id,
                requester_email = excluded.requester_email,
                status = excluded.status,
                due_date = excluded.due_date,
                winner_id = excluded.winner_id,
                winner_quotation_id = excluded.winner_quotation_id,
                winner_amount = excluded.winner_amount,
                winner_currency = excluded.winner_currency,
                winner_delivery_days = excluded.winner_delivery_days,
                previous_winner_id = excluded.previous_winner_id,
                revocation_reason = excluded.revocation_reason,
                adjudicated_at = excluded.adjudicated_at,
                updated_at = excluded.updated_at",
        )
        .bind(&request.id.0)
        .bind(&request.title)
        .bind(&request.requester_id)
        .bind(request.requester_email.as_deref())
        .bind(request.status.as_str())
        .bind(request.due_date.as_ref().map(encode_timestamp))
        .bind(request.winner_id.as_ref().map(|id| id.0.as_str()))
        .bind(request.winner_quotation_id.as_ref().map(|id| id.0.as_str()))
        .bind(request.winner_amount.map(|amount| amount.to_string()))
        .bind(request.winner_currency.map(|currency| currency.as_str()))
        .bind(request.winner_delivery_days.map(i64::from))
        .bind(request.previous_winner_id.as_ref().map(|id| id.0.as_str()))
        .bind(request.revocation_reason.as_deref())
        .bind(request.adjudicated_at.as_ref().map(encode_timestamp))
        .bind(encode_timestamp(&request.created_at))
        .bind(encode_timestamp(&request.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn enter_quoting(
        &self,
        id: &RequestId,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE procurement_request
             SET status = 'quoting', updated_at = ?
             WHERE id = ? AND status IN ('draft', 'pending', 'in_progress')",
        )
        .bind(encode_timestamp(&at))
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
