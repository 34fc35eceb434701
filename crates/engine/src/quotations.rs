use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use tender_core::calendar::add_business_days;
use tender_core::domain::invitation::{Invitation, InvitationId};
use tender_core::domain::quotation::{
    Quotation, QuotationId, QuotationStatus, QuotationTerms, QuotationUpdate,
};
use tender_core::domain::request::RequestId;
use tender_core::domain::SupplierId;
use tender_core::errors::{ApplicationError, DomainError};
use tender_core::notify::Notification;
use tender_db::repositories::{InvitationRepository, QuotationRepository};

use crate::dispatch::Outbox;

#[derive(Clone, Debug)]
pub struct SubmitQuotation {
    pub invitation_id: InvitationId,
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub terms: QuotationTerms,
}

pub struct QuotationStore {
    invitations: Arc<dyn InvitationRepository>,
    quotations: Arc<dyn QuotationRepository>,
    outbox: Outbox,
}

impl QuotationStore {
    pub fn new(
        invitations: Arc<dyn InvitationRepository>,
        quotations: Arc<dyn QuotationRepository>,
        outbox: Outbox,
    ) -> Self {
        Self { invitations, quotations, outbox }
    }

    pub async fn submit(&self, command: SubmitQuotation) -> Result<QuotationId, ApplicationError> {
        let mut invitation = self
            .invitations
            .find_by_id(&command.invitation_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("invitation", &command.invitation_id.0))?;
        if invitation.supplier_id != command.supplier_id {
            return Err(DomainError::Validation(format!(
                "invitation {} was not addressed to supplier {}",
                invitation.id.0, command.supplier_id
            ))
            .into());
        }
        if command.supplier_name.trim().is_empty() {
            return Err(DomainError::Validation("supplier_name is required".into()).into());
        }

        let now = Utc::now();
        command.terms.validate(now)?;
        let terms = command.terms;
        let quotation = Quotation {
            id: QuotationId::generate(),
            invitation_id: invitation.id.clone(),
            request_id: invitation.request_id.clone(),
            supplier_id: command.supplier_id,
            supplier_name: command.supplier_name,
            total_amount: terms.total_amount,
            currency: terms.currency,
            delivery_days: terms.delivery_days,
            delivery_date: add_business_days(now, terms.delivery_days),
            payment_terms: terms.payment_terms,
            valid_until: terms.valid_until,
            notes: terms.notes,
            attachments: terms.attachments,
            status: QuotationStatus::Submitted,
            is_winner: false,
            is_reselection: false,
            ranking_score: None,
            submitted_at: now,
            selected_at: None,
            updated_at: now,
        };
        invitation.link_quotation(quotation.id.clone())?;

        self.quotations.save_with_invitation(quotation.clone(), invitation.clone()).await?;
        info!(
            event_name = "rfq.quotation.submitted",
            quotation_id = %quotation.id.0,
            request_id = %quotation.request_id.0,
            invitation_id = %invitation.id.0,
            supplier_id = %quotation.supplier_id,
            "quotation submitted"
        );

        self.outbox.notify(Notification::quotation_received(&invitation.manager_id, &quotation));
        Ok(quotation.id)
    }

    /// Edits a quotation's terms and puts it back in `submitted`. Editing a
    /// cancelled quotation resubmits it and re-links its invitation.
    pub async fn update(
        &self,
        id: &QuotationId,
        update: QuotationUpdate,
    ) -> Result<Quotation, ApplicationError> {
        let current = self.get(id).await?;
        let now = Utc::now();

        let mut next = current.clone();
        let delivery_changed = next.apply_update(update)?;
        next.terms().validate(now)?;
        if delivery_changed {
            next.delivery_date = add_business_days(now, next.delivery_days);
        }
        next.updated_at = now;

        let invitation = if current.status == QuotationStatus::Cancelled {
            let mut invitation = self
                .invitations
                .find_by_id(&next.invitation_id)
                .await?
                .ok_or_else(|| ApplicationError::not_found("invitation", &next.invitation_id.0))?;
            invitation.link_quotation(next.id.clone())?;
            Some(invitation)
        } else {
            None
        };
        self.write_supplier_edit(&next, current.status, invitation.as_ref()).await?;

        info!(
            event_name = "rfq.quotation.updated",
            quotation_id = %next.id.0,
            request_id = %next.request_id.0,
            resubmitted = current.status == QuotationStatus::Cancelled,
            delivery_changed,
            "quotation updated"
        );
        Ok(next)
    }

    pub async fn cancel(
        &self,
        id: &QuotationId,
        invitation_id: &InvitationId,
    ) -> Result<Quotation, ApplicationError> {
        let mut quotation = self.get(id).await?;
        if &quotation.invitation_id != invitation_id {
            return Err(DomainError::Validation(format!(
                "quotation {} does not belong to invitation {}",
                quotation.id.0, invitation_id.0
            ))
            .into());
        }
        let mut invitation = self
            .invitations
            .find_by_id(invitation_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("invitation", &invitation_id.0))?;

        let read_status = quotation.status;
        quotation.transition_to(QuotationStatus::Cancelled)?;
        quotation.updated_at = Utc::now();
        invitation.revert_to_viewed()?;

        self.write_supplier_edit(&quotation, read_status, Some(&invitation)).await?;
        info!(
            event_name = "rfq.quotation.cancelled",
            quotation_id = %quotation.id.0,
            request_id = %quotation.request_id.0,
            supplier_id = %quotation.supplier_id,
            "quotation cancelled"
        );
        Ok(quotation)
    }

    /// Persists a supplier-side change only if no award moved the quotation
    /// since `read_status` was observed.
    async fn write_supplier_edit(
        &self,
        quotation: &Quotation,
        read_status: QuotationStatus,
        invitation: Option<&Invitation>,
    ) -> Result<(), ApplicationError> {
        if self.quotations.save_supplier_edit(quotation, read_status, invitation).await? {
            return Ok(());
        }
        let stored = self.get(&quotation.id).await?;
        warn!(
            event_name = "rfq.quotation.edit_conflict",
            quotation_id = %quotation.id.0,
            read_status = read_status.as_str(),
            stored_status = stored.status.as_str(),
            "quotation changed while being edited"
        );
        Err(DomainError::invalid_transition(
            "quotation",
            stored.status.as_str(),
            quotation.status.as_str(),
        )
        .into())
    }

    pub async fn get(&self, id: &QuotationId) -> Result<Quotation, ApplicationError> {
        self.quotations
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("quotation", &id.0))
    }

    pub async fn find_by_invitation(
        &self,
        invitation_id: &InvitationId,
    ) -> Result<Option<Quotation>, ApplicationError> {
        Ok(self.quotations.find_by_invitation(invitation_id).await?)
    }

    /// Newest submission first.
    pub async fn list_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Quotation>, ApplicationError> {
        Ok(self.quotations.list_by_request(request_id).await?)
    }

    /// Newest submission first.
    pub async fn list_by_supplier(
        &self,
        supplier_id: &SupplierId,
    ) -> Result<Vec<Quotation>, ApplicationError> {
        Ok(self.quotations.list_by_supplier(supplier_id).await?)
    }
}
