use sqlx::{Row, Sqlite, Transaction};

use tender_core::award::{
    AwardCommit, AwardCommitResult, AwardKind, AwardOutcome, RevocationCommit,
    RevocationCommitResult,
};
use tender_core::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use tender_core::domain::request::{ProcurementRequest, RequestId};

use super::quotation::{quotation_from_row, QUOTATION_COLUMNS};
use super::request::{request_from_row, REQUEST_COLUMNS};
use super::{AwardRepository, RepositoryError};
use crate::codec::{decode_enum, encode_timestamp};
use crate::DbPool;

pub struct SqlAwardRepository {
    pool: DbPool,
}

impl SqlAwardRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

async fn load_request(
    tx: &mut Transaction<'_, Sqlite>,
    id: &RequestId,
) -> Result<ProcurementRequest, RepositoryError> {
    let row = sqlx::query(&format!(
        "SELECT {REQUEST_COLUMNS} FROM procurement_request WHERE id = ?"
    ))
    .bind(&id.0)
    .fetch_one(&mut **tx)
    .await?;
    request_from_row(&row)
}

async fn load_quotation(
    tx: &mut Transaction<'_, Sqlite>,
    id: &QuotationId,
) -> Result<Quotation, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {QUOTATION_COLUMNS} FROM quotation WHERE id = ?"))
        .bind(&id.0)
        .fetch_one(&mut **tx)
        .await?;
    quotation_from_row(&row)
}

#[async_trait::async_trait]
impl AwardRepository for SqlAwardRepository {
    async fn commit_award(
        &self,
        commit: &AwardCommit,
    ) -> Result<AwardCommitResult, RepositoryError> {
        let at = encode_timestamp(&commit.awarded_at);
        let mut tx = self.pool.begin().await?;

        // The guarded write comes first so the transaction holds the write
        // lock before anything is read. A selection needs an unawarded
        // request; a reselection needs the recorded penalized supplier and
        // no quotation currently selected, whatever the request status says.
        let claimed = match (&commit.kind, &commit.penalized_supplier) {
            (AwardKind::Reselection, Some(penalized)) => {
                sqlx::query(
                    "UPDATE procurement_request
                     SET status = 'awarded', adjudicated_at = ?, updated_at = ?
                     WHERE id = ? AND previous_winner_id = ? AND previous_winner_id != ?
                       AND NOT EXISTS (
                           SELECT 1 FROM quotation
                           WHERE request_id = procurement_request.id AND status = 'selected'
                       )",
                )
                .bind(&at)
                .bind(&at)
                .bind(&commit.request_id.0)
                .bind(&penalized.0)
                .bind(&commit.supplier_id.0)
                .execute(&mut *tx)
                .await?
            }
            _ => {
                sqlx::query(
                    "UPDATE procurement_request
                     SET status = 'awarded', adjudicated_at = ?, updated_at = ?
                     WHERE id = ? AND status != 'awarded'
                       AND (previous_winner_id IS NULL OR previous_winner_id != ?)",
                )
                .bind(&at)
                .bind(&at)
                .bind(&commit.request_id.0)
                .bind(&commit.supplier_id.0)
                .execute(&mut *tx)
                .await?
            }
        };
        if claimed.rows_affected() == 0 {
            // Surfaces RowNotFound for a request that vanished.
            let current = load_request(&mut tx, &commit.request_id).await?;
            tx.rollback().await?;
            if current.previous_winner_id.as_ref() == Some(&commit.supplier_id) {
                return Ok(AwardCommitResult::SupplierPenalized);
            }
            return Ok(AwardCommitResult::AlreadyAwarded);
        }

        if commit.kind == AwardKind::Reselection {
            // A winner revoked elsewhere may still carry the winner flag.
            sqlx::query(
                "UPDATE quotation SET is_winner = 0
                 WHERE request_id = ? AND status = 'revoked' AND is_winner = 1",
            )
            .bind(&commit.request_id.0)
            .execute(&mut *tx)
            .await?;
        }

        let selectable = match commit.kind {
            AwardKind::Selection => "('submitted')",
            AwardKind::Reselection => "('submitted', 'rejected')",
        };
        let winner_update = sqlx::query(&format!(
            "UPDATE quotation
             SET status = 'selected', is_winner = 1, is_reselection = ?,
                 selected_at = ?, updated_at = ?
             WHERE id = ? AND request_id = ? AND status IN {selectable}"
        ))
        .bind(commit.kind == AwardKind::Reselection)
        .bind(&at)
        .bind(&at)
        .bind(&commit.quotation_id.0)
        .bind(&commit.request_id.0)
        .execute(&mut *tx)
        .await?;
        if winner_update.rows_affected() == 0 {
            let row = sqlx::query("SELECT status FROM quotation WHERE id = ?")
                .bind(&commit.quotation_id.0)
                .fetch_one(&mut *tx)
                .await?;
            let status: String = row.try_get("status")?;
            tx.rollback().await?;
            return Ok(AwardCommitResult::CandidateUnavailable {
                status: decode_enum("status", &status, QuotationStatus::parse)?,
            });
        }

        let rejected_rows = sqlx::query(
            "SELECT id FROM quotation
             WHERE request_id = ? AND id != ? AND status NOT IN ('cancelled', 'revoked')
             ORDER BY submitted_at DESC, id DESC",
        )
        .bind(&commit.request_id.0)
        .bind(&commit.quotation_id.0)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE quotation
             SET status = 'rejected', is_winner = 0, updated_at = ?
             WHERE request_id = ? AND id != ? AND status NOT IN ('cancelled', 'revoked')",
        )
        .bind(&at)
        .bind(&commit.request_id.0)
        .bind(&commit.quotation_id.0)
        .execute(&mut *tx)
        .await?;

        let winner = load_quotation(&mut tx, &commit.quotation_id).await?;

        sqlx::query(
            "UPDATE procurement_request
             SET winner_id = ?, winner_quotation_id = ?, winner_amount = ?,
                 winner_currency = ?, winner_delivery_days = ?
             WHERE id = ?",
        )
        .bind(&winner.supplier_id.0)
        .bind(&winner.id.0)
        .bind(winner.total_amount.to_string())
        .bind(winner.currency.as_str())
        .bind(i64::from(winner.delivery_days))
        .bind(&commit.request_id.0)
        .execute(&mut *tx)
        .await?;

        let mut rejected = Vec::with_capacity(rejected_rows.len());
        for row in &rejected_rows {
            let id: String = row.try_get("id")?;
            rejected.push(load_quotation(&mut tx, &QuotationId(id)).await?);
        }
        let request = load_request(&mut tx, &commit.request_id).await?;

        tx.commit().await?;

        Ok(AwardCommitResult::Committed(AwardOutcome { request, winner, rejected }))
    }

    async fn commit_revocation(
        &self,
        commit: &RevocationCommit,
    ) -> Result<RevocationCommitResult, RepositoryError> {
        let at = encode_timestamp(&commit.revoked_at);
        let mut tx = self.pool.begin().await?;

        let reopened = sqlx::query(
            "UPDATE procurement_request
             SET status = 'quoting', previous_winner_id = ?, revocation_reason = ?,
                 winner_id = NULL, winner_quotation_id = NULL, winner_amount = NULL,
                 winner_currency = NULL, winner_delivery_days = NULL, updated_at = ?
             WHERE id = ? AND status = 'awarded' AND winner_quotation_id = ?",
        )
        .bind(&commit.supplier_id.0)
        .bind(&commit.reason)
        .bind(&at)
        .bind(&commit.request_id.0)
        .bind(&commit.quotation_id.0)
        .execute(&mut *tx)
        .await?;
        if reopened.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(RevocationCommitResult::NotAwarded);
        }

        let revoked = sqlx::query(
            "UPDATE quotation
             SET status = 'revoked', is_winner = 0, updated_at = ?
             WHERE id = ? AND status = 'selected'",
        )
        .bind(&at)
        .bind(&commit.quotation_id.0)
        .execute(&mut *tx)
        .await?;
        if revoked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(RevocationCommitResult::NotAwarded);
        }

        let request = load_request(&mut tx, &commit.request_id).await?;
        let revoked = load_quotation(&mut tx, &commit.quotation_id).await?;
        tx.commit().await?;

        Ok(RevocationCommitResult::Committed { request, revoked })
    }
}
