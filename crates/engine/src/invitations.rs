use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use tender_core::domain::invitation::{Invitation, InvitationId, InvitationStatus};
use tender_core::domain::quotation::QuotationId;
use tender_core::domain::request::{RequestId, RequestStatus};
use tender_core::domain::SupplierId;
use tender_core::errors::{ApplicationError, DomainError};
use tender_core::notify::{EmailMessage, InvitationEmails, Notification, RequestMeta};
use tender_db::repositories::{InvitationRepository, RequestRepository};

use crate::dispatch::Outbox;

#[derive(Clone, Debug)]
pub struct InviteSuppliers {
    pub request_id: RequestId,
    /// One invitation per (request, supplier) is expected; duplicates are not
    /// rejected here.
    pub supplier_ids: Vec<SupplierId>,
    pub manager_id: String,
    pub due_date: DateTime<Utc>,
    pub message: Option<String>,
    pub delivery_address: Option<String>,
}

impl InviteSuppliers {
    fn validate(&self) -> Result<(), DomainError> {
        if self.supplier_ids.is_empty() {
            return Err(DomainError::Validation("at least one supplier is required".into()));
        }
        if self.supplier_ids.iter().any(|id| id.0.trim().is_empty()) {
            return Err(DomainError::Validation("supplier ids must not be blank".into()));
        }
        if self.manager_id.trim().is_empty() {
            return Err(DomainError::Validation("manager_id is required".into()));
        }
        Ok(())
    }
}

pub struct InvitationStore {
    requests: Arc<dyn RequestRepository>,
    invitations: Arc<dyn InvitationRepository>,
    outbox: Outbox,
}

impl InvitationStore {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        invitations: Arc<dyn InvitationRepository>,
        outbox: Outbox,
    ) -> Self {
        Self { requests, invitations, outbox }
    }

    pub async fn invite(
        &self,
        command: InviteSuppliers,
    ) -> Result<Vec<InvitationId>, ApplicationError> {
        command.validate()?;
        let request = self
            .requests
            .find_by_id(&command.request_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("request", &command.request_id.0))?;
        if !request.accepts_invitations() {
            return Err(DomainError::invalid_transition(
                "request",
                request.status.as_str(),
                RequestStatus::Quoting.as_str(),
            )
            .into());
        }

        let now = Utc::now();
        let invitations: Vec<Invitation> = command
            .supplier_ids
            .iter()
            .map(|supplier_id| Invitation {
                id: InvitationId::generate(),
                request_id: request.id.clone(),
                supplier_id: supplier_id.clone(),
                manager_id: command.manager_id.clone(),
                status: InvitationStatus::Pending,
                due_date: command.due_date,
                message: command.message.clone(),
                delivery_address: command.delivery_address.clone(),
                quotation_id: None,
                created_at: now,
                viewed_at: None,
            })
            .collect();
        let ids: Vec<InvitationId> =
            invitations.iter().map(|invitation| invitation.id.clone()).collect();

        self.invitations.save_all(invitations.clone()).await?;
        if self.requests.enter_quoting(&request.id, now).await? {
            info!(
                event_name = "rfq.request.quoting",
                request_id = %request.id.0,
                "request opened for quoting"
            );
        }
        info!(
            event_name = "rfq.invitation.created",
            request_id = %request.id.0,
            manager_id = %command.manager_id,
            suppliers = invitations.len(),
            "invitations sent"
        );

        for invitation in &invitations {
            self.outbox.notify(Notification::invitation(invitation, &request));
        }
        self.outbox.email(EmailMessage::Invitations(InvitationEmails {
            request_id: request.id.clone(),
            request: RequestMeta::from(&request),
            supplier_ids: command.supplier_ids,
            requester_email: request.requester_email.clone(),
            due_date: command.due_date,
        }));

        Ok(ids)
    }

    pub async fn get(&self, id: &InvitationId) -> Result<Invitation, ApplicationError> {
        self.invitations
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("invitation", &id.0))
    }

    pub async fn mark_viewed(&self, id: &InvitationId) -> Result<Invitation, ApplicationError> {
        let mut invitation = self.get(id).await?;
        if invitation.mark_viewed(Utc::now())? {
            self.invitations.save(invitation.clone()).await?;
            info!(
                event_name = "rfq.invitation.viewed",
                invitation_id = %invitation.id.0,
                supplier_id = %invitation.supplier_id,
                "invitation viewed"
            );
        }
        Ok(invitation)
    }

    pub async fn decline(&self, id: &InvitationId) -> Result<Invitation, ApplicationError> {
        let mut invitation = self.get(id).await?;
        invitation.transition_to(InvitationStatus::Declined)?;
        self.invitations.save(invitation.clone()).await?;
        info!(
            event_name = "rfq.invitation.declined",
            invitation_id = %invitation.id.0,
            supplier_id = %invitation.supplier_id,
            "invitation declined"
        );
        Ok(invitation)
    }

    pub async fn link_quotation(
        &self,
        id: &InvitationId,
        quotation_id: QuotationId,
    ) -> Result<Invitation, ApplicationError> {
        let mut invitation = self.get(id).await?;
        invitation.link_quotation(quotation_id)?;
        self.invitations.save(invitation.clone()).await?;
        Ok(invitation)
    }

    pub async fn revert_to_viewed(
        &self,
        id: &InvitationId,
    ) -> Result<Invitation, ApplicationError> {
        let mut invitation = self.get(id).await?;
        invitation.revert_to_viewed()?;
        self.invitations.save(invitation.clone()).await?;
        Ok(invitation)
    }

    pub async fn list_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Invitation>, ApplicationError> {
        Ok(self.invitations.list_by_request(request_id).await?)
    }

    pub async fn list_by_supplier(
        &self,
        supplier_id: &SupplierId,
    ) -> Result<Vec<Invitation>, ApplicationError> {
        Ok(self.invitations.list_by_supplier(supplier_id).await?)
    }
}
