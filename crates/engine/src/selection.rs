use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use tender_core::award::{plan_selection, AwardCommit, AwardCommitResult, AwardOutcome};
use tender_core::domain::quotation::{QuotationId, QuotationStatus};
use tender_core::domain::request::RequestId;
use tender_core::errors::{ApplicationError, DomainError};
use tender_core::notify::{EmailMessage, Notification, RequestMeta, WinnerEmails};
use tender_db::repositories::{AwardRepository, QuotationRepository, RequestRepository};

use crate::dispatch::Outbox;

pub struct WinnerSelectionCoordinator {
    requests: Arc<dyn RequestRepository>,
    quotations: Arc<dyn QuotationRepository>,
    awards: Arc<dyn AwardRepository>,
    outbox: Outbox,
}

impl WinnerSelectionCoordinator {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        quotations: Arc<dyn QuotationRepository>,
        awards: Arc<dyn AwardRepository>,
        outbox: Outbox,
    ) -> Self {
        Self { requests, quotations, awards, outbox }
    }

    /// Awards the request to `quotation_id` and rejects the other live bids.
    ///
    /// Fails with `AlreadyAwarded` when the request has a winner, including
    /// when a concurrent selection committed first, and with
    /// `PolicyViolation` for a supplier whose earlier award was revoked.
    pub async fn select_winner(
        &self,
        quotation_id: &QuotationId,
        request_id: &RequestId,
        requester_user_id: &str,
    ) -> Result<AwardOutcome, ApplicationError> {
        let request = self
            .requests
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("request", &request_id.0))?;
        let candidate = self
            .quotations
            .find_by_id(quotation_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("quotation", &quotation_id.0))?;

        let plan = match plan_selection(&request, &candidate, Utc::now()) {
            Ok(plan) => plan,
            Err(error) => {
                log_refusal(request_id, quotation_id, &error);
                return Err(error.into());
            }
        };

        let outcome = committed_outcome(self.awards.commit_award(&plan).await?, &plan)?;

        info!(
            event_name = "rfq.award.selected",
            request_id = %request_id.0,
            quotation_id = %quotation_id.0,
            supplier_id = %outcome.winner.supplier_id,
            rejected = outcome.rejected.len(),
            "winner selected"
        );

        for loser in &outcome.rejected {
            self.outbox.notify(Notification::not_selected(loser, &outcome.request));
        }
        self.outbox.notify(Notification::winner(&outcome.winner, &outcome.request));
        self.outbox.notify(Notification::supplier_selected(
            requester_user_id,
            &outcome.winner,
            &outcome.request,
        ));
        self.outbox.email(EmailMessage::Winner(WinnerEmails {
            request_id: outcome.request.id.clone(),
            request: RequestMeta::from(&outcome.request),
            winner_supplier_id: outcome.winner.supplier_id.clone(),
            requester_email: outcome.request.requester_email.clone(),
            amount: outcome.winner.total_amount,
            currency: outcome.winner.currency,
        }));

        Ok(outcome)
    }
}

/// Maps a refused commit to the domain error the caller sees.
pub(crate) fn committed_outcome(
    result: AwardCommitResult,
    plan: &AwardCommit,
) -> Result<AwardOutcome, ApplicationError> {
    let error = match result {
        AwardCommitResult::Committed(outcome) => return Ok(outcome),
        AwardCommitResult::AlreadyAwarded => {
            DomainError::AlreadyAwarded { request_id: plan.request_id.0.clone() }
        }
        AwardCommitResult::CandidateUnavailable { status } => DomainError::invalid_transition(
            "quotation",
            status.as_str(),
            QuotationStatus::Selected.as_str(),
        ),
        AwardCommitResult::SupplierPenalized => DomainError::PolicyViolation {
            supplier_id: plan.supplier_id.0.clone(),
            reason: "cannot re-award the penalized supplier".to_string(),
        },
    };
    log_refusal(&plan.request_id, &plan.quotation_id, &error);
    Err(error.into())
}

pub(crate) fn log_refusal(request_id: &RequestId, quotation_id: &QuotationId, error: &DomainError) {
    let event_name = match error {
        DomainError::AlreadyAwarded { .. } => "rfq.award.already_awarded",
        DomainError::PolicyViolation { .. } => "rfq.award.policy_violation",
        _ => "rfq.award.refused",
    };
    warn!(
        event_name,
        request_id = %request_id.0,
        quotation_id = %quotation_id.0,
        error = %error,
        "award refused"
    );
}
