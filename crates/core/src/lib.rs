//! Domain model and pure decision logic for the request-for-quotation
//! lifecycle: invitations, quotations, ranking and award planning.

pub mod award;
pub mod calendar;
pub mod config;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod ranking;

pub use chrono;

pub use award::{AwardCommit, AwardCommitResult, AwardKind, AwardOutcome};
pub use calendar::add_business_days;
pub use domain::invitation::{Invitation, InvitationId, InvitationStatus};
pub use domain::quotation::{
    Currency, Quotation, QuotationId, QuotationStatus, QuotationTerms, QuotationUpdate,
};
pub use domain::request::{ProcurementRequest, RequestId, RequestStatus};
pub use domain::SupplierId;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use notify::{EmailGateway, GatewayError, Notification, NotificationGateway};
pub use ranking::{RankingEngine, RankingWeights};
