use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use tender_core::award::{
    current_winner, eligible_for_reselection, plan_reselection, plan_revocation, AwardOutcome,
    RevocationCommitResult,
};
use tender_core::domain::quotation::{Quotation, QuotationId};
use tender_core::domain::request::{ProcurementRequest, RequestId};
use tender_core::errors::{ApplicationError, DomainError};
use tender_core::notify::Notification;
use tender_db::repositories::{AwardRepository, QuotationRepository, RequestRepository};

use crate::dispatch::Outbox;
use crate::selection::{committed_outcome, log_refusal};

/// Replaces a winner that failed to perform.
pub struct ReselectionCoordinator {
    requests: Arc<dyn RequestRepository>,
    quotations: Arc<dyn QuotationRepository>,
    awards: Arc<dyn AwardRepository>,
    outbox: Outbox,
}

impl ReselectionCoordinator {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        quotations: Arc<dyn QuotationRepository>,
        awards: Arc<dyn AwardRepository>,
        outbox: Outbox,
    ) -> Self {
        Self { requests, quotations, awards, outbox }
    }

    /// Revokes the current winner as a penalty and reopens the request.
    ///
    /// The winning quotation becomes `revoked`, its supplier is recorded as
    /// `previous_winner_id` and the request returns to `quoting`.
    pub async fn revoke_winner(
        &self,
        request_id: &RequestId,
        manager_id: &str,
        reason: &str,
    ) -> Result<ProcurementRequest, ApplicationError> {
        let request = self.load_request(request_id).await?;
        let winner = match &request.winner_quotation_id {
            Some(id) => self.quotations.find_by_id(id).await?,
            None => None,
        };

        let plan = plan_revocation(&request, winner.as_ref(), reason, Utc::now())?;
        let (request, revoked) = match self.awards.commit_revocation(&plan).await? {
            RevocationCommitResult::Committed { request, revoked } => (request, revoked),
            RevocationCommitResult::NotAwarded => {
                return Err(DomainError::invalid_transition(
                    "request",
                    request.status.as_str(),
                    "revoked",
                )
                .into());
            }
        };

        warn!(
            event_name = "rfq.award.revoked",
            request_id = %request.id.0,
            quotation_id = %revoked.id.0,
            supplier_id = %revoked.supplier_id,
            manager_id = %manager_id,
            reason = %plan.reason,
            "winner revoked"
        );
        Ok(request)
    }

    /// Awards the request to a replacement bid after a revocation. The
    /// penalized supplier can never be chosen. The request may still read
    /// `awarded` if the winner was revoked outside this coordinator.
    pub async fn reselect(
        &self,
        quotation_id: &QuotationId,
        request_id: &RequestId,
        manager_id: &str,
    ) -> Result<AwardOutcome, ApplicationError> {
        let request = self.load_request(request_id).await?;
        let candidate = self
            .quotations
            .find_by_id(quotation_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("quotation", &quotation_id.0))?;

        let quotations = self.quotations.list_by_request(request_id).await?;
        let plan = match plan_reselection(
            &request,
            &candidate,
            current_winner(&quotations),
            Utc::now(),
        ) {
            Ok(plan) => plan,
            Err(error) => {
                log_refusal(request_id, quotation_id, &error);
                return Err(error.into());
            }
        };

        let outcome = committed_outcome(self.awards.commit_award(&plan).await?, &plan)?;

        info!(
            event_name = "rfq.award.reselected",
            request_id = %request_id.0,
            quotation_id = %quotation_id.0,
            supplier_id = %outcome.winner.supplier_id,
            manager_id = %manager_id,
            "replacement winner selected"
        );
        self.outbox.notify(Notification::winner(&outcome.winner, &outcome.request));

        Ok(outcome)
    }

    /// Non-revoked quotations from suppliers other than the penalized one.
    pub async fn get_eligible_for_reselection(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Quotation>, ApplicationError> {
        let request = self.load_request(request_id).await?;
        let quotations = self.quotations.list_by_request(request_id).await?;
        Ok(eligible_for_reselection(quotations, request.previous_winner_id.as_ref()))
    }

    async fn load_request(&self, id: &RequestId) -> Result<ProcurementRequest, ApplicationError> {
        self.requests
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("request", &id.0))
    }
}
