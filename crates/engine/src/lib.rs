//! RFQ services: invitations, quotations, ranking and awards, plus the
//! outbound dispatcher that delivers their notifications.

pub mod comparison;
pub mod dispatch;
pub mod gateways;
pub mod invitations;
pub mod quotations;
pub mod reselection;
pub mod selection;

pub use comparison::ComparisonService;
pub use dispatch::{Dispatcher, OutboundTask, Outbox, RetryPolicy};
pub use gateways::{
    email_gateway_from_config, LogEmailGateway, LogNotificationGateway, RecordingGateway,
    SqlNotificationGateway, WebhookEmailGateway,
};
pub use invitations::{InvitationStore, InviteSuppliers};
pub use quotations::{QuotationStore, SubmitQuotation};
pub use reselection::ReselectionCoordinator;
pub use selection::WinnerSelectionCoordinator;

use tender_core::ranking::RankingEngine;
use tender_db::RfqRepositories;

/// Every RFQ service wired to one repository set and one outbox.
pub struct RfqServices {
    pub invitations: InvitationStore,
    pub quotations: QuotationStore,
    pub selection: WinnerSelectionCoordinator,
    pub reselection: ReselectionCoordinator,
    pub comparison: ComparisonService,
}

impl RfqServices {
    pub fn new(repositories: RfqRepositories, outbox: Outbox, ranking: RankingEngine) -> Self {
        Self {
            invitations: InvitationStore::new(
                repositories.requests.clone(),
                repositories.invitations.clone(),
                outbox.clone(),
            ),
            quotations: QuotationStore::new(
                repositories.invitations.clone(),
                repositories.quotations.clone(),
                outbox.clone(),
            ),
            selection: WinnerSelectionCoordinator::new(
                repositories.requests.clone(),
                repositories.quotations.clone(),
                repositories.awards.clone(),
                outbox.clone(),
            ),
            reselection: ReselectionCoordinator::new(
                repositories.requests.clone(),
                repositories.quotations.clone(),
                repositories.awards.clone(),
                outbox,
            ),
            comparison: ComparisonService::new(
                repositories.requests,
                repositories.quotations,
                ranking,
            ),
        }
    }
}
