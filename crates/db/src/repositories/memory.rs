use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use tender_core::award::{
    is_rejected_by_award, AwardCommit, AwardCommitResult, AwardKind, AwardOutcome,
    RevocationCommit, RevocationCommitResult,
};
use tender_core::domain::invitation::{Invitation, InvitationId};
use tender_core::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use tender_core::domain::request::{ProcurementRequest, RequestId, RequestStatus};
use tender_core::domain::SupplierId;
use tender_core::notify::Notification;

use super::{
    AwardRepository, InvitationRepository, NotificationRepository, QuotationRepository,
    RepositoryError, RequestRepository, StoredNotification,
};

#[derive(Default)]
struct Tables {
    requests: HashMap<String, ProcurementRequest>,
    invitations: HashMap<String, Invitation>,
    quotations: HashMap<String, Quotation>,
    notifications: Vec<StoredNotification>,
}

impl Tables {
    fn sorted_quotations(&self, filter: impl Fn(&Quotation) -> bool) -> Vec<Quotation> {
        let mut rows: Vec<Quotation> =
            self.quotations.values().filter(|q| filter(q)).cloned().collect();
        rows.sort_by(|a, b| {
            b.submitted_at.cmp(&a.submitted_at).then_with(|| b.id.0.cmp(&a.id.0))
        });
        rows
    }

    fn sorted_invitations(&self, filter: impl Fn(&Invitation) -> bool) -> Vec<Invitation> {
        let mut rows: Vec<Invitation> =
            self.invitations.values().filter(|inv| filter(inv)).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.0.cmp(&a.id.0)));
        rows
    }
}

/// All RFQ tables behind one lock, so multi-record commits are atomic.
#[derive(Default)]
pub struct InMemoryRfqStore {
    tables: RwLock<Tables>,
}

impl InMemoryRfqStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn stored(mut quotation: Quotation) -> Quotation {
    quotation.ranking_score = None;
    quotation
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRfqStore {
    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<ProcurementRequest>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.requests.get(&id.0).cloned())
    }

    async fn save(&self, request: ProcurementRequest) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.requests.insert(request.id.0.clone(), request);
        Ok(())
    }

    async fn enter_quoting(
        &self,
        id: &RequestId,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        match tables.requests.get_mut(&id.0) {
            Some(request)
                if matches!(
                    request.status,
                    RequestStatus::Draft | RequestStatus::Pending | RequestStatus::InProgress
                ) =>
            {
                request.status = RequestStatus::Quoting;
                request.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait::async_trait]
impl InvitationRepository for InMemoryRfqStore {
    async fn find_by_id(&self, id: &InvitationId) -> Result<Option<Invitation>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.invitations.get(&id.0).cloned())
    }

    async fn save(&self, invitation: Invitation) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.invitations.insert(invitation.id.0.clone(), invitation);
        Ok(())
    }

    async fn save_all(&self, invitations: Vec<Invitation>) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        for invitation in invitations {
            tables.invitations.insert(invitation.id.0.clone(), invitation);
        }
        Ok(())
    }

    async fn list_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Invitation>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.sorted_invitations(|inv| &inv.request_id == request_id))
    }

    async fn list_by_supplier(
        &self,
        supplier_id: &SupplierId,
    ) -> Result<Vec<Invitation>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.sorted_invitations(|inv| &inv.supplier_id == supplier_id))
    }
}

#[async_trait::async_trait]
impl QuotationRepository for InMemoryRfqStore {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.quotations.get(&id.0).cloned())
    }

    async fn find_by_invitation(
        &self,
        invitation_id: &InvitationId,
    ) -> Result<Option<Quotation>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.sorted_quotations(|q| &q.invitation_id == invitation_id).into_iter().next())
    }

    async fn save(&self, quotation: Quotation) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.quotations.insert(quotation.id.0.clone(), stored(quotation));
        Ok(())
    }

    async fn save_with_invitation(
        &self,
        quotation: Quotation,
        invitation: Invitation,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.quotations.insert(quotation.id.0.clone(), stored(quotation));
        tables.invitations.insert(invitation.id.0.clone(), invitation);
        Ok(())
    }

    async fn save_supplier_edit(
        &self,
        quotation: &Quotation,
        expected: QuotationStatus,
        invitation: Option<&Invitation>,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.write().await;
        let Some(current) = tables.quotations.get(&quotation.id.0) else {
            return Ok(false);
        };
        if current.status != expected {
            return Ok(false);
        }

        let mut edited = stored(quotation.clone());
        edited.is_winner = current.is_winner;
        edited.is_reselection = current.is_reselection;
        edited.selected_at = current.selected_at;
        tables.quotations.insert(edited.id.0.clone(), edited);
        if let Some(invitation) = invitation {
            tables.invitations.insert(invitation.id.0.clone(), invitation.clone());
        }
        Ok(true)
    }

    async fn list_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Quotation>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.sorted_quotations(|q| &q.request_id == request_id))
    }

    async fn list_by_supplier(
        &self,
        supplier_id: &SupplierId,
    ) -> Result<Vec<Quotation>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.sorted_quotations(|q| &q.supplier_id == supplier_id))
    }
}

#[async_trait::async_trait]
impl AwardRepository for InMemoryRfqStore {
    async fn commit_award(
        &self,
        commit: &AwardCommit,
    ) -> Result<AwardCommitResult, RepositoryError> {
        let mut tables = self.tables.write().await;

        let request = tables
            .requests
            .get(&commit.request_id.0)
            .ok_or(RepositoryError::Database(sqlx::Error::RowNotFound))?;
        if request.previous_winner_id.as_ref() == Some(&commit.supplier_id) {
            return Ok(AwardCommitResult::SupplierPenalized);
        }
        let claimable = match commit.kind {
            AwardKind::Selection => request.status != RequestStatus::Awarded,
            AwardKind::Reselection => {
                commit.penalized_supplier.is_some()
                    && request.previous_winner_id == commit.penalized_supplier
                    && !tables.quotations.values().any(|q| {
                        q.request_id == commit.request_id && q.status == QuotationStatus::Selected
                    })
            }
        };
        if !claimable {
            return Ok(AwardCommitResult::AlreadyAwarded);
        }

        let candidate = tables
            .quotations
            .get(&commit.quotation_id.0)
            .filter(|q| q.request_id == commit.request_id)
            .ok_or(RepositoryError::Database(sqlx::Error::RowNotFound))?;
        let selectable = match commit.kind {
            AwardKind::Selection => candidate.status == QuotationStatus::Submitted,
            AwardKind::Reselection => matches!(
                candidate.status,
                QuotationStatus::Submitted | QuotationStatus::Rejected
            ),
        };
        if !selectable {
            return Ok(AwardCommitResult::CandidateUnavailable { status: candidate.status });
        }

        let mut winner = candidate.clone();
        winner.mark_winner(commit);

        let mut rejected = Vec::new();
        for quotation in tables.quotations.values_mut() {
            if quotation.request_id != commit.request_id {
                continue;
            }
            if quotation.status == QuotationStatus::Revoked {
                quotation.is_winner = false;
            } else if is_rejected_by_award(quotation, &commit.quotation_id) {
                quotation.mark_rejected(commit.awarded_at);
                rejected.push(quotation.clone());
            }
        }
        rejected.sort_by(|a, b| {
            b.submitted_at.cmp(&a.submitted_at).then_with(|| b.id.0.cmp(&a.id.0))
        });
        tables.quotations.insert(winner.id.0.clone(), winner.clone());

        let request = match tables.requests.get_mut(&commit.request_id.0) {
            Some(request) => {
                request.record_award(&winner, commit.awarded_at);
                request.clone()
            }
            None => return Err(RepositoryError::Database(sqlx::Error::RowNotFound)),
        };

        Ok(AwardCommitResult::Committed(AwardOutcome { request, winner, rejected }))
    }

    async fn commit_revocation(
        &self,
        commit: &RevocationCommit,
    ) -> Result<RevocationCommitResult, RepositoryError> {
        let mut tables = self.tables.write().await;

        let request_matches = tables.requests.get(&commit.request_id.0).is_some_and(|request| {
            request.status == RequestStatus::Awarded
                && request.winner_quotation_id.as_ref() == Some(&commit.quotation_id)
        });
        let winner_matches = tables
            .quotations
            .get(&commit.quotation_id.0)
            .is_some_and(|q| q.status == QuotationStatus::Selected);
        if !request_matches || !winner_matches {
            return Ok(RevocationCommitResult::NotAwarded);
        }

        let revoked = match tables.quotations.get_mut(&commit.quotation_id.0) {
            Some(quotation) => {
                quotation.mark_revoked(commit.revoked_at);
                quotation.clone()
            }
            None => return Ok(RevocationCommitResult::NotAwarded),
        };
        let request = match tables.requests.get_mut(&commit.request_id.0) {
            Some(request) => {
                request.record_revocation(commit);
                request.clone()
            }
            None => return Ok(RevocationCommitResult::NotAwarded),
        };

        Ok(RevocationCommitResult::Committed { request, revoked })
    }
}

#[async_trait::async_trait]
impl NotificationRepository for InMemoryRfqStore {
    async fn append(&self, notification: &Notification) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.notifications.push(StoredNotification {
            id: format!("NTF-{}", uuid::Uuid::new_v4()),
            notification: notification.clone(),
            is_read: false,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<StoredNotification>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|stored| stored.notification.user_id == user_id)
            .cloned()
            .collect())
    }
}
