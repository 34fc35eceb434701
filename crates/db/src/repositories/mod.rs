use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use tender_core::award::{
    AwardCommit, AwardCommitResult, RevocationCommit, RevocationCommitResult,
};
use tender_core::domain::invitation::{Invitation, InvitationId};
use tender_core::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use tender_core::domain::request::{ProcurementRequest, RequestId};
use tender_core::domain::SupplierId;
use tender_core::errors::ApplicationError;
use tender_core::notify::Notification;

pub mod award;
pub mod invitation;
pub mod memory;
pub mod notification;
pub mod quotation;
pub mod request;

pub use award::SqlAwardRepository;
pub use invitation::SqlInvitationRepository;
pub use memory::InMemoryRfqStore;
pub use notification::{SqlNotificationRepository, StoredNotification};
pub use quotation::SqlQuotationRepository;
pub use request::SqlRequestRepository;

use crate::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<ProcurementRequest>, RepositoryError>;

    async fn save(&self, request: ProcurementRequest) -> Result<(), RepositoryError>;

    /// Moves the request to `quoting` unless it is already there or past it.
    /// Returns whether the status changed.
    async fn enter_quoting(
        &self,
        id: &RequestId,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait InvitationRepository: Send + Sync {
    async fn find_by_id(&self, id: &InvitationId) -> Result<Option<Invitation>, RepositoryError>;

    async fn save(&self, invitation: Invitation) -> Result<(), RepositoryError>;

    /// Inserts a batch of invitations as one unit.
    async fn save_all(&self, invitations: Vec<Invitation>) -> Result<(), RepositoryError>;

    async fn list_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Invitation>, RepositoryError>;

    async fn list_by_supplier(
        &self,
        supplier_id: &SupplierId,
    ) -> Result<Vec<Invitation>, RepositoryError>;
}

/// Quotation persistence. Listings are ordered by `submitted_at` descending.
#[async_trait]
pub trait QuotationRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError>;

    async fn find_by_invitation(
        &self,
        invitation_id: &InvitationId,
    ) -> Result<Option<Quotation>, RepositoryError>;

    async fn save(&self, quotation: Quotation) -> Result<(), RepositoryError>;

    /// Writes a quotation and its invitation together.
    async fn save_with_invitation(
        &self,
        quotation: Quotation,
        invitation: Invitation,
    ) -> Result<(), RepositoryError>;

    /// Writes a supplier edit (terms and status) only while the stored status
    /// still equals `expected`, together with the invitation when given. The
    /// award columns (`is_winner`, `is_reselection`, `selected_at`) are never
    /// written. Returns `false` when the status moved on and nothing changed.
    async fn save_supplier_edit(
        &self,
        quotation: &Quotation,
        expected: QuotationStatus,
        invitation: Option<&Invitation>,
    ) -> Result<bool, RepositoryError>;

    async fn list_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Quotation>, RepositoryError>;

    async fn list_by_supplier(
        &self,
        supplier_id: &SupplierId,
    ) -> Result<Vec<Quotation>, RepositoryError>;
}

/// Atomic multi-record award transitions.
///
/// Implementations re-check the request status inside their transaction:
/// a selection commits only while the request is not `awarded`, and a
/// reselection additionally requires the recorded penalized supplier.
#[async_trait]
pub trait AwardRepository: Send + Sync {
    async fn commit_award(&self, commit: &AwardCommit)
        -> Result<AwardCommitResult, RepositoryError>;

    async fn commit_revocation(
        &self,
        commit: &RevocationCommit,
    ) -> Result<RevocationCommitResult, RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn append(&self, notification: &Notification) -> Result<(), RepositoryError>;

    async fn list_for_user(&self, user_id: &str)
        -> Result<Vec<StoredNotification>, RepositoryError>;
}

/// The repository set the RFQ services run against.
#[derive(Clone)]
pub struct RfqRepositories {
    pub requests: Arc<dyn RequestRepository>,
    pub invitations: Arc<dyn InvitationRepository>,
    pub quotations: Arc<dyn QuotationRepository>,
    pub awards: Arc<dyn AwardRepository>,
}

impl RfqRepositories {
    pub fn sql(pool: DbPool) -> Self {
        Self {
            requests: Arc::new(SqlRequestRepository::new(pool.clone())),
            invitations: Arc::new(SqlInvitationRepository::new(pool.clone())),
            quotations: Arc::new(SqlQuotationRepository::new(pool.clone())),
            awards: Arc::new(SqlAwardRepository::new(pool)),
        }
    }

    pub fn in_memory(store: Arc<InMemoryRfqStore>) -> Self {
        Self {
            requests: store.clone(),
            invitations: store.clone(),
            quotations: store.clone(),
            awards: store,
        }
    }
}
